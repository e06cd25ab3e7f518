//! Self-update from the project's GitHub releases.

use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const GITHUB_API: &str = "https://api.github.com";
const REPO: &str = "wraient/flick";

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("release server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("no release asset for {0}")]
    NoAsset(String),
    #[error("failed to replace {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate(String),
    Updated { from: String, to: String },
}

pub struct Updater {
    client: Client,
    api_url: Url,
    current_version: String,
}

impl Updater {
    pub fn new() -> Result<Self, UpdateError> {
        Self::with_base_url(GITHUB_API, env!("CARGO_PKG_VERSION"))
    }

    /// Create an updater against a custom API (for testing)
    pub fn with_base_url(api_url: &str, current_version: &str) -> Result<Self, UpdateError> {
        let mut api_url = Url::parse(api_url)?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            api_url,
            current_version: current_version.to_string(),
        })
    }

    pub async fn latest_release(&self) -> Result<Release, UpdateError> {
        let url = self
            .api_url
            .join(&format!("repos/{}/releases/latest", REPO))?;
        debug!(%url, "checking latest release");

        let response = self
            .client
            .get(url)
            .header("User-Agent", "flick")
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpdateError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Download the newest release over `exe` unless it is already current.
    pub async fn update(&self, exe: &Path) -> Result<UpdateOutcome, UpdateError> {
        let release = self.latest_release().await?;
        let latest = release.tag_name.trim_start_matches('v').to_string();
        if latest == self.current_version.trim_start_matches('v') {
            info!(version = %latest, "already up to date");
            return Ok(UpdateOutcome::UpToDate(latest));
        }

        let asset = pick_asset(&release.assets, std::env::consts::OS, std::env::consts::ARCH)
            .ok_or_else(|| {
                UpdateError::NoAsset(format!(
                    "{}-{}",
                    std::env::consts::OS,
                    std::env::consts::ARCH
                ))
            })?;
        info!(asset = %asset.name, version = %latest, "downloading update");

        let response = self
            .client
            .get(&asset.browser_download_url)
            .header("User-Agent", "flick")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(UpdateError::Status(response.status()));
        }
        let bytes = response.bytes().await?;

        replace_executable(exe, &bytes)?;
        info!(path = %exe.display(), "binary replaced");

        Ok(UpdateOutcome::Updated {
            from: self.current_version.clone(),
            to: latest,
        })
    }
}

/// Prefer `flick-<os>-<arch>`, fall back to a bare `flick` binary.
pub fn pick_asset<'a>(assets: &'a [Asset], os: &str, arch: &str) -> Option<&'a Asset> {
    let platform = format!("flick-{}-{}", os, arch);
    let bare = if os == "windows" { "flick.exe" } else { "flick" };

    assets
        .iter()
        .find(|a| a.name == platform || a.name == format!("{}.exe", platform))
        .or_else(|| assets.iter().find(|a| a.name == bare))
}

/// Write `contents` beside `exe` and rename it into place.
pub fn replace_executable(exe: &Path, contents: &[u8]) -> Result<(), UpdateError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| UpdateError::Io { path, source }
    };

    let tmp = exe.with_extension("new");
    std::fs::write(&tmp, contents).map_err(io_err(&tmp))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
            .map_err(io_err(&tmp))?;
    }

    // a running binary cannot be overwritten on Windows, but it can be moved
    #[cfg(windows)]
    {
        let old = exe.with_extension("old");
        let _ = std::fs::remove_file(&old);
        std::fs::rename(exe, &old).map_err(io_err(exe))?;
    }

    std::fs::rename(&tmp, exe).map_err(io_err(exe))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://example.com/{}", name),
        }
    }

    #[test]
    fn test_pick_platform_asset() {
        let assets = vec![
            asset("flick"),
            asset("flick-linux-x86_64"),
            asset("flick-macos-aarch64"),
        ];
        assert_eq!(
            pick_asset(&assets, "linux", "x86_64").unwrap().name,
            "flick-linux-x86_64"
        );
        assert_eq!(
            pick_asset(&assets, "macos", "aarch64").unwrap().name,
            "flick-macos-aarch64"
        );
    }

    #[test]
    fn test_pick_asset_falls_back_to_bare_binary() {
        let assets = vec![asset("flick"), asset("flick.exe")];
        assert_eq!(pick_asset(&assets, "freebsd", "x86_64").unwrap().name, "flick");
        assert_eq!(
            pick_asset(&assets, "windows", "x86_64").unwrap().name,
            "flick.exe"
        );
        assert!(pick_asset(&[], "linux", "x86_64").is_none());
    }

    #[test]
    fn test_replace_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("flick");
        std::fs::write(&exe, b"old").unwrap();

        replace_executable(&exe, b"new build").unwrap();

        assert_eq!(std::fs::read(&exe).unwrap(), b"new build");
        assert!(!exe.with_extension("new").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&exe).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let updater = Updater::with_base_url("http://localhost:8080/github", "0.1.0").unwrap();
        let url = updater
            .api_url
            .join(&format!("repos/{}/releases/latest", REPO))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/github/repos/wraient/flick/releases/latest"
        );
    }
}
