//! Media catalog: named lists of (file, duration) loaded from
//! `media/<name>.lst`.
//!
//! Each non-blank line has the form `path : duration_ms`. Paths may contain
//! colons (drive letters, URLs), so the line is split on the last ` : `.

use crate::error::{Error, Result};
use crate::media::MediaEntry;
use fastrand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

pub const LIST_EXTENSION: &str = "lst";

/// Ordered entries of one series or commercial pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaList {
    pub name: String,
    entries: Vec<MediaEntry>,
}

impl MediaList {
    pub fn new(name: impl Into<String>, entries: Vec<MediaEntry>) -> Self {
        MediaList {
            name: name.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    /// Remove and return the entry at `index`.
    pub fn take(&mut self, index: usize) -> Option<MediaEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Drop the first entry whose path equals `path`. Returns whether one
    /// was removed.
    pub fn remove_first(&mut self, path: &str) -> bool {
        match self.entries.iter().position(|e| e.path == path) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Unbiased in-place permutation of the whole list.
    pub fn shuffle(&mut self, rng: &mut Rng) {
        rng.shuffle(&mut self.entries);
    }
}

/// Parse list file text. `source` only labels errors.
pub fn parse_list(text: &str, source: &Path) -> Result<Vec<MediaEntry>> {
    let mut entries = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = || Error::MalformedEntry {
            file: source.to_path_buf(),
            line: i + 1,
            text: line.to_string(),
        };
        let (path, duration) = line.rsplit_once(" : ").ok_or_else(malformed)?;
        let path = path.trim();
        let duration_ms: u64 = duration.trim().parse().map_err(|_| malformed())?;
        if path.is_empty() || duration_ms == 0 {
            return Err(malformed());
        }
        entries.push(MediaEntry::new(path, duration_ms));
    }
    Ok(entries)
}

/// Directory of `.lst` files.
#[derive(Debug, Clone)]
pub struct MediaCatalog {
    media_dir: PathBuf,
}

impl MediaCatalog {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        MediaCatalog {
            media_dir: media_dir.into(),
        }
    }

    pub fn list_path(&self, name: &str) -> PathBuf {
        self.media_dir.join(format!("{}.{}", name, LIST_EXTENSION))
    }

    /// Load a named list, optionally shuffled.
    pub fn load(&self, name: &str, shuffle: Option<&mut Rng>) -> Result<MediaList> {
        let path = self.list_path(name);
        if !path.is_file() {
            return Err(Error::NotFound(path));
        }
        let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let entries = parse_list(&text, &path)?;
        if entries.is_empty() {
            return Err(Error::EmptyCatalog(path));
        }
        let mut list = MediaList::new(name, entries);
        if let Some(rng) = shuffle {
            list.shuffle(rng);
        }
        tracing::debug!(list = name, entries = list.len(), "loaded media list");
        Ok(list)
    }

    /// Names of every list file in the media directory, sorted.
    pub fn names(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.media_dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(LIST_EXTENSION))
            })
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        names.sort();
        names
    }
}
