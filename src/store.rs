//! Durable watch state: one row per show with the current episode and the
//! playback position in whole seconds.
//!
//! The file is a small comma-delimited table with a `ShowID,EpisodeID,PlaybackTime`
//! header. Every mutation reads the whole table, changes it in memory and
//! rewrites it through a temp file + rename. Nothing guards against another
//! process writing the same file concurrently.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const HEADER: [&str; 3] = ["ShowID", "EpisodeID", "PlaybackTime"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access watch state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("show with ID {0} not found")]
    NotFound(String),
}

/// Progress record for one show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Show {
    /// Catalog directory ID of the show
    pub id: String,
    /// Catalog file ID of the episode being watched
    pub episode_id: String,
    /// Playback position in seconds
    pub playback_time: u64,
}

impl Show {
    pub fn new(id: impl Into<String>, episode_id: impl Into<String>, playback_time: u64) -> Self {
        Self {
            id: id.into(),
            episode_id: episode_id.into(),
            playback_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchStore {
    path: PathBuf,
}

impl WatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. A missing file is created empty; malformed
    /// rows are skipped.
    pub fn get_all(&self) -> Result<Vec<Show>, StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        if !self.path.exists() {
            std::fs::write(&self.path, "").map_err(|e| self.io_error(e))?;
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(parse_table(&contents))
    }

    pub fn find(&self, id: &str) -> Result<Option<Show>, StoreError> {
        Ok(self.get_all()?.into_iter().find(|s| s.id == id))
    }

    /// Replace the record with the same ID, or append a new one.
    pub fn upsert(&self, show: &Show) -> Result<(), StoreError> {
        let mut shows = self.get_all()?;
        match shows.iter_mut().find(|s| s.id == show.id) {
            Some(existing) => *existing = show.clone(),
            None => shows.push(show.clone()),
        }
        self.write_all(&shows)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let shows = self.get_all()?;
        let before = shows.len();
        let remaining: Vec<Show> = shows.into_iter().filter(|s| s.id != id).collect();
        if remaining.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.write_all(&remaining)
    }

    /// Remove every record whose ID is in `ids`. Unknown IDs are ignored.
    pub fn delete_many<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), StoreError> {
        let doomed: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let remaining: Vec<Show> = self
            .get_all()?
            .into_iter()
            .filter(|s| !doomed.contains(s.id.as_str()))
            .collect();
        self.write_all(&remaining)
    }

    /// Drop all rows but keep the header.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.write_all(&[])
    }

    fn write_all(&self, shows: &[Show]) -> Result<(), StoreError> {
        let mut out = String::new();
        push_row(&mut out, &HEADER);
        for show in shows {
            let time = show.playback_time.to_string();
            push_row(&mut out, &[&show.id, &show.episode_id, &time]);
        }

        let tmp = self.path.with_extension("db.tmp");
        std::fs::write(&tmp, out.as_bytes()).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(rows = shows.len(), "watch state written");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_table(contents: &str) -> Vec<Show> {
    let mut shows = Vec::new();

    for (idx, (line, fields)) in split_records(contents).into_iter().enumerate() {
        if idx == 0 && fields.first().map(String::as_str) == Some(HEADER[0]) {
            continue;
        }
        if fields.len() < 3 {
            warn!(line, row = %fields.join(","), "skipping malformed watch state row");
            continue;
        }

        let playback_time = fields[2].trim().parse().unwrap_or_else(|_| {
            warn!(line, value = %fields[2], "invalid playback time, using 0");
            0
        });

        shows.push(Show {
            id: fields[0].clone(),
            episode_id: fields[1].clone(),
            playback_time,
        });
    }

    shows
}

fn push_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Split the whole file into records, each tagged with the line it starts
/// on. Double-quoted fields may contain commas, `""` escapes and line breaks.
/// Blank lines are dropped.
fn split_records(contents: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if current.is_empty() => quoted = true,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            '\r' if !quoted && chars.peek() == Some(&'\n') => {}
            '\n' if !quoted => {
                fields.push(std::mem::take(&mut current));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            '\n' => {
                current.push(c);
                line += 1;
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        push_record(&mut records, record_line, fields);
    }

    records
}

fn push_record(records: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    let blank = fields.len() == 1 && fields[0].trim().is_empty();
    if !blank {
        records.push((line, fields));
    }
}
