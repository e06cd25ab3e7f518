//! Client for the remote directory catalog (a vadapav-style JSON API).

mod episode;

pub use episode::{
    Episode, episodes_from_files, is_video_file, next_episode, order_catalog, parse_episode_info,
    parse_season_dir,
};

use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::CatalogConfig;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("rate limit exceeded, resets at: {0}")]
    RateLimited(String),
    #[error("no playable episodes found in {0}")]
    NoEpisodes(String),
}

/// A file or folder entry of a remote directory
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub parent: String,
}

/// A remote directory and its entries
#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

impl Directory {
    pub fn has_parent(&self) -> bool {
        !self.parent.is_empty()
    }
}

/// A show with its ordered episode list
#[derive(Debug, Clone)]
pub struct ShowDetails {
    pub id: String,
    pub name: String,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    #[allow(dead_code)]
    message: String,
    data: T,
}

/// What the playback session needs from a catalog.
#[allow(async_fn_in_trait)]
pub trait EpisodeSource {
    /// Ordered episode list of a show.
    async fn list_episodes(&self, show_id: &str) -> Result<Vec<Episode>, CatalogError>;

    /// Playable URL of an episode.
    fn source_url(&self, episode_id: &str) -> String;
}

pub struct CatalogClient {
    client: Client,
    base_url: String,
    playback_url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self::with_base_url(&config.api_url, &config.playback_url)
    }

    /// Create a client with custom URLs (for testing)
    pub fn with_base_url(base_url: &str, playback_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            playback_url: playback_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a directory listing
    pub async fn get_directory(&self, dir_id: &str) -> Result<Directory, CatalogError> {
        let url = format!("{}/api/d/{}", self.base_url, urlencoding::encode(dir_id));
        debug!(dir_id, "fetching directory");
        self.fetch(&url).await
    }

    /// Search the catalog by name
    pub async fn search(&self, query: &str) -> Result<Vec<RemoteFile>, CatalogError> {
        let url = format!("{}/api/s/{}", self.base_url, urlencoding::encode(query));
        debug!(query, "searching catalog");
        self.fetch(&url).await
    }

    /// Fetch a show directory and collect its episodes, descending one level
    /// into season folders.
    pub async fn get_show(&self, show_id: &str) -> Result<ShowDetails, CatalogError> {
        let root = self.get_directory(show_id).await?;
        let mut episodes = episodes_from_files(&root.files, 1);

        for sub in root.files.iter().filter(|f| f.dir) {
            let season = parse_season_dir(&sub.name).unwrap_or(1);
            let dir = self.get_directory(&sub.id).await?;
            episodes.extend(episodes_from_files(&dir.files, season));
        }

        let episodes = order_catalog(episodes);
        if episodes.is_empty() {
            return Err(CatalogError::NoEpisodes(root.name));
        }
        debug!(show_id, episodes = episodes.len(), "show catalog built");

        Ok(ShowDetails {
            id: root.id,
            name: root.name,
            episodes,
        })
    }

    pub async fn show_name(&self, show_id: &str) -> Result<String, CatalogError> {
        Ok(self.get_directory(show_id).await?.name)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let response = self.client.get(url).send().await?;
        check_rate_limit(&response)?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status()));
        }

        let body = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)?;
        Ok(parsed.data)
    }
}

fn check_rate_limit(response: &Response) -> Result<(), CatalogError> {
    let headers = response.headers();
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());

    if remaining == Some("0") {
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        return Err(CatalogError::RateLimited(reset));
    }
    Ok(())
}

impl EpisodeSource for CatalogClient {
    async fn list_episodes(&self, show_id: &str) -> Result<Vec<Episode>, CatalogError> {
        Ok(self.get_show(show_id).await?.episodes)
    }

    fn source_url(&self, episode_id: &str) -> String {
        format!("{}/{}", self.playback_url, episode_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_deserialize() {
        let body = r#"{
            "message": "ok",
            "data": {
                "id": "d1",
                "name": "Some Show",
                "parent": "root",
                "dir": true,
                "mtime": "2024-01-01T00:00:00Z",
                "files": [
                    {"id": "f1", "name": "Some.Show.S01E01.mkv", "dir": false, "parent": "d1"},
                    {"id": "f2", "name": "Season 2", "dir": true, "parent": "d1"}
                ]
            }
        }"#;

        let parsed: ApiResponse<Directory> = serde_json::from_str(body).unwrap();
        let dir = parsed.data;
        assert_eq!(dir.name, "Some Show");
        assert!(dir.has_parent());
        assert_eq!(dir.files.len(), 2);
        assert!(dir.files[1].dir);
    }

    #[test]
    fn test_root_directory_has_no_parent() {
        let body = r#"{"data": {"id": "root", "name": "/", "files": []}}"#;
        let parsed: ApiResponse<Directory> = serde_json::from_str(body).unwrap();
        assert!(!parsed.data.has_parent());
    }

    #[test]
    fn test_source_url() {
        let client = CatalogClient::with_base_url("https://api.test/", "https://cdn.test/f/");
        assert_eq!(client.source_url("abc"), "https://cdn.test/f/abc");
    }
}
