use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use super::RemoteFile;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

static SXEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]*e(\d{1,3})").unwrap());
static X_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,3})\b").unwrap());
static FULL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)season[ ._-]*(\d{1,2}).*?episode[ ._-]*(\d{1,3})").unwrap());
static EPISODE_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\bepisode|\bep|\be)[ ._-]*(\d{1,3})\b").unwrap());
static SEASON_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:season|\bs)[ ._-]*(\d{1,2})\b").unwrap());

/// An episode of a show, as found in the remote directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub parent_id: String,
}

impl Episode {
    /// Format as "S01E02 - name"
    pub fn display_title(&self) -> String {
        format!("S{:02}E{:02} - {}", self.season, self.episode, self.name)
    }

    pub fn sort_key(&self) -> (u32, u32) {
        (self.season, self.episode)
    }
}

/// Check if a file is a video file based on extension
pub fn is_video_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    VIDEO_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Parse season and episode number from a filename.
///
/// Supports:
/// - S01E02, s1e2, S01.E02
/// - 1x02
/// - Season 1 Episode 2
/// - Episode 2 / Ep02 / E02, using `default_season` for the season
pub fn parse_episode_info(filename: &str, default_season: u32) -> Option<(u32, u32)> {
    for re in [&*SXEX_RE, &*X_RE, &*FULL_RE] {
        if let Some(caps) = re.captures(filename)
            && let (Ok(season), Ok(episode)) = (caps[1].parse(), caps[2].parse())
        {
            return Some((season, episode));
        }
    }

    EPISODE_ONLY_RE
        .captures(filename)
        .and_then(|caps| caps[1].parse().ok())
        .map(|episode| (default_season, episode))
}

/// Season number from a folder name such as "Season 2" or "S02".
pub fn parse_season_dir(name: &str) -> Option<u32> {
    SEASON_DIR_RE
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Turn a directory listing into episodes. Non-video entries and files without
/// an episode number are dropped.
pub fn episodes_from_files(files: &[RemoteFile], default_season: u32) -> Vec<Episode> {
    files
        .iter()
        .filter(|f| !f.dir && is_video_file(&f.name))
        .filter_map(|f| {
            let (season, episode) = parse_episode_info(&f.name, default_season)?;
            (season >= 1 && episode >= 1).then(|| Episode {
                id: f.id.clone(),
                season,
                episode,
                name: f.name.clone(),
                parent_id: f.parent.clone(),
            })
        })
        .collect()
}

/// Stable sort by (season, episode). Files sharing a slot (other releases of
/// the same episode) are all kept so any of them can be the current one.
pub fn order_catalog(episodes: Vec<Episode>) -> Vec<Episode> {
    episodes
        .into_iter()
        .sorted_by_key(Episode::sort_key)
        .collect()
}

/// The episode right after `current_id` in (season, episode) order. `None`
/// when `current_id` is the last entry or not in the catalog at all.
pub fn next_episode<'a>(catalog: &'a [Episode], current_id: &str) -> Option<&'a Episode> {
    let current = catalog.iter().find(|e| e.id == current_id)?;
    catalog
        .iter()
        .filter(|e| e.sort_key() > current.sort_key())
        .min_by_key(|e| e.sort_key())
}
