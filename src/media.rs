use serde::{Deserialize, Serialize};
use std::path::Path;

/// One video: where it lives and how long it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub path: String,
    pub duration_ms: u64,
}

impl MediaEntry {
    pub fn new(path: impl Into<String>, duration_ms: u64) -> Self {
        MediaEntry {
            path: path.into(),
            duration_ms,
        }
    }

    /// File name without directory or extension. This is the episode
    /// identifier used by the played-episode records.
    pub fn stem(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.clone())
    }

    pub fn minutes(&self) -> f64 {
        self.duration_ms as f64 / 1000.0 / 60.0
    }
}
