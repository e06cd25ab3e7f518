use directories::ProjectDirs;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

use crate::session::{EarlyStop, SessionContext};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    NoConfigDir,
    #[error("config file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to write default config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            args: Vec::new(),
        }
    }
}

fn default_player_command() -> String {
    "mpv".to_string()
}

#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the watch-state table and the debug log.
    /// Supports a leading `~` and `$VAR` references.
    pub path: Option<String>,
}

impl StorageConfig {
    pub fn dir(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand_path(path),
            None => ProjectDirs::from("", "", "flick")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| std::env::temp_dir().join("flick")),
        }
    }

    pub fn database_file(&self) -> PathBuf {
        self.dir().join("shows.db")
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir().join("debug.log")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Percent of an episode that must be watched before it counts as finished
    #[serde(default = "default_percentage")]
    pub percentage_to_mark_complete: u8,
    /// Carry the player speed over to the next episode
    #[serde(default)]
    pub save_speed: bool,
    /// Ask before starting the next episode
    #[serde(default)]
    pub next_episode_prompt: bool,
    #[serde(default)]
    pub on_early_stop: EarlyStop,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            percentage_to_mark_complete: default_percentage(),
            save_speed: false,
            next_episode_prompt: false,
            on_early_stop: EarlyStop::default(),
        }
    }
}

fn default_percentage() -> u8 {
    90
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_playback_url")]
    pub playback_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            playback_url: default_playback_url(),
        }
    }
}

fn default_api_url() -> String {
    "https://vadapav.mov".to_string()
}

fn default_playback_url() -> String {
    "https://dl2.vadapav.mov/f".to_string()
}

impl Config {
    /// Load the config, writing the defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_create(&Self::config_path()?)
    }

    /// Runs before logging is set up, so first-run creation goes to stderr.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::NotFound(path)) => {
                let config = Config::default();
                config.save_to(&path)?;
                eprintln!("Wrote default config to {}", path.display());
                Ok(config)
            }
            other => other,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "flick")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "player.command cannot be empty".to_string(),
            ));
        }

        if !(1..=100).contains(&self.playback.percentage_to_mark_complete) {
            return Err(ConfigError::ValidationError(
                "playback.percentage_to_mark_complete must be between 1 and 100".to_string(),
            ));
        }

        for (name, url) in [
            ("catalog.api_url", &self.catalog.api_url),
            ("catalog.playback_url", &self.catalog.playback_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Build the per-run session settings.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            completion_threshold: f64::from(self.playback.percentage_to_mark_complete),
            save_speed: self.playback.save_speed,
            next_episode_prompt: self.playback.next_episode_prompt,
            on_early_stop: self.playback.on_early_stop,
            poll_interval: Duration::from_secs(1),
        }
    }
}

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Expand a leading `~` and `$VAR` / `${VAR}` references. Unknown variables
/// expand to an empty string.
pub fn expand_path(raw: &str) -> PathBuf {
    let home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
    let raw = match (raw.strip_prefix('~'), &home) {
        (Some(rest), Some(home)) => format!("{}{}", home.display(), rest),
        _ => raw.to_string(),
    };

    let expanded = ENV_VAR_RE.replace_all(&raw, |caps: &Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_default()
    });
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.player.command, "mpv");
        assert_eq!(config.playback.percentage_to_mark_complete, 90);
        assert_eq!(config.playback.on_early_stop, EarlyStop::EndSession);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
[playback]
percentage_to_mark_complete = 85
save_speed = true
on_early_stop = "exit-process"
"#,
        )
        .unwrap();

        assert_eq!(config.playback.percentage_to_mark_complete, 85);
        assert!(config.playback.save_speed);
        assert!(!config.playback.next_episode_prompt);
        assert_eq!(config.playback.on_early_stop, EarlyStop::ExitProcess);
        assert_eq!(config.player.command, "mpv");
        assert_eq!(config.catalog.api_url, "https://vadapav.mov");
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.playback.percentage_to_mark_complete = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.playback.percentage_to_mark_complete = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = Config::default();
        config.catalog.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_or_create_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flick").join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.playback.percentage_to_mark_complete, 90);

        std::fs::write(&path, "[player]\ncommand = \"vlc\"\n").unwrap();
        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.player.command, "vlc");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.player.args = vec!["--fs".to_string()];
        config.playback.next_episode_prompt = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.player.args, vec!["--fs".to_string()]);
        assert!(loaded.playback.next_episode_prompt);
    }

    #[cfg(unix)]
    #[test]
    fn test_expand_path_env_var() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            expand_path("$HOME/data"),
            PathBuf::from(format!("{}/data", home))
        );
        assert_eq!(
            expand_path("${HOME}/data"),
            PathBuf::from(format!("{}/data", home))
        );
        assert_eq!(
            expand_path("/srv/$FLICK_UNSET_STORAGE_VAR/data"),
            PathBuf::from("/srv//data")
        );
        assert_eq!(expand_path("/plain/path"), PathBuf::from("/plain/path"));
    }

    #[test]
    fn test_expand_path_tilde() {
        let home = directories::BaseDirs::new().unwrap().home_dir().to_path_buf();
        assert_eq!(
            expand_path("~/flick"),
            PathBuf::from(format!("{}/flick", home.display()))
        );
    }

    #[test]
    fn test_session_context_from_config() {
        let mut config = Config::default();
        config.playback.percentage_to_mark_complete = 75;
        config.playback.save_speed = true;

        let ctx = config.session_context();
        assert_eq!(ctx.completion_threshold, 75.0);
        assert!(ctx.save_speed);
        assert_eq!(ctx.poll_interval, Duration::from_secs(1));
    }
}
