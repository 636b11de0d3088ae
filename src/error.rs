//! Error types for slotcast.
//!
//! Only `ConfigurationMissing`, `NotFound`, `EmptyCatalog` and
//! `MalformedEntry` abort a run. The scheduling-time variants are built so
//! they can be logged with `%err` at the point where the engine recovers.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Required directories or files are absent at startup.
    #[error("Configuration missing: {}", .0.join(", "))]
    ConfigurationMissing(Vec<String>),

    /// A list file does not exist.
    #[error("List file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A list file parsed but holds no entries.
    #[error("List file {} has zero entries", .0.display())]
    EmptyCatalog(PathBuf),

    /// A list file line is not of the form `path : duration_ms`.
    #[error("Malformed entry in {} line {line}: '{text}'", .file.display())]
    MalformedEntry {
        file: PathBuf,
        line: usize,
        text: String,
    },

    /// A schedule slot could not be read; the slot airs as blank/linear.
    #[error("Schedule entry {slot} malformed: {reason}")]
    ScheduleEntryMalformed { slot: String, reason: String },

    /// The commercial pool fell below its low-water mark.
    #[error("Commercial pool depleted ({pool} left of {catalog})")]
    PoolExhausted { pool: usize, catalog: usize },

    /// Random selection found no unplayed episode.
    #[error("No unplayed episode for {series} after {attempts} draws")]
    SelectionExhausted { series: String, attempts: usize },

    /// A persisted file could not be written or renamed.
    #[error("Unable to write {}: {source}", .path.display())]
    PersistenceWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Other file I/O failures.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidSetting { key: String, value: String },

    #[error("Unknown playlist format '{0}'. Expected: m3u8, pls, xspf")]
    UnknownFormat(String),

    #[error("Unknown player '{0}'. Expected: mpv, vlc, none")]
    UnknownPlayer(String),

    #[error("{0} not found in PATH")]
    PlayerNotFound(String),

    #[error("Failed to start player: {0}")]
    PlayerLaunch(std::io::Error),

    #[error("Unable to serialize summary: {0}")]
    Summary(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must stop the run before any scheduling happens.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationMissing(_)
                | Error::NotFound(_)
                | Error::EmptyCatalog(_)
                | Error::MalformedEntry { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
