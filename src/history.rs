//! Cross-run history: which random-mode episodes already aired per series,
//! and which commercials were used by earlier runs.

use crate::error::{Error, Result};
use crate::ini::{write_atomic, IniDocument};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const DATE_FORMAT: &str = "%Y%m%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Episodes of one series aired under random sequencing, keyed by basename,
/// with the date they aired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayedEpisodes {
    episodes: BTreeMap<String, String>,
}

impl PlayedEpisodes {
    pub fn new() -> Self {
        PlayedEpisodes::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.episodes.contains_key(name)
    }

    /// Mark an episode as aired. Returns false if it was already recorded.
    pub fn insert(&mut self, name: &str, date: NaiveDate) -> bool {
        if self.episodes.contains_key(name) {
            return false;
        }
        self.episodes.insert(name.to_string(), format_date(date));
        true
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.episodes.keys().map(String::as_str)
    }

    pub fn to_document(&self) -> IniDocument {
        let mut doc = IniDocument::new();
        for (name, date) in &self.episodes {
            doc.set(name, "lastdate", date);
        }
        doc
    }

    pub fn from_document(doc: &IniDocument) -> Self {
        let episodes = doc
            .sections()
            .map(|s| {
                let date = s.get("lastdate").unwrap_or("00000000").to_string();
                (s.name.clone(), date)
            })
            .collect();
        PlayedEpisodes { episodes }
    }
}

/// Storage for per-series `PlayedEpisodes`.
pub trait PlayedHistory {
    /// Load a series record. A series never played yields an empty record.
    fn load(&self, series: &str) -> Result<PlayedEpisodes>;
    fn save(&mut self, series: &str, played: &PlayedEpisodes) -> Result<()>;
    /// Move the record aside so the series starts fresh.
    fn archive(&mut self, series: &str) -> Result<()>;
}

/// One `<series>.ini` per series under `config/played/`; archived records
/// become `<series>.old`.
#[derive(Debug, Clone)]
pub struct PlayedDir {
    dir: PathBuf,
}

impl PlayedDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PlayedDir { dir: dir.into() }
    }

    pub fn record_path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{}.ini", series))
    }

    pub fn archive_path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{}.old", series))
    }

    /// Series with a live record, sorted.
    pub fn series(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "ini"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        names.sort();
        names
    }
}

impl PlayedHistory for PlayedDir {
    fn load(&self, series: &str) -> Result<PlayedEpisodes> {
        let doc = IniDocument::load(&self.record_path(series))?;
        Ok(PlayedEpisodes::from_document(&doc))
    }

    fn save(&mut self, series: &str, played: &PlayedEpisodes) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::PersistenceWriteFailure {
            path: self.dir.clone(),
            source,
        })?;
        played.to_document().save(&self.record_path(series))
    }

    fn archive(&mut self, series: &str) -> Result<()> {
        let src = self.record_path(series);
        if !src.exists() {
            return Ok(());
        }
        let dst = self.archive_path(series);
        fs::rename(&src, &dst).map_err(|source| Error::PersistenceWriteFailure {
            path: dst.clone(),
            source,
        })?;
        tracing::warn!(from = %src.display(), to = %dst.display(), "series reset");
        Ok(())
    }
}

/// In-memory history for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    records: HashMap<String, PlayedEpisodes>,
    archived: Vec<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        MemoryHistory::default()
    }

    pub fn with_record(mut self, series: &str, played: PlayedEpisodes) -> Self {
        self.records.insert(series.to_string(), played);
        self
    }

    pub fn archived(&self) -> &[String] {
        &self.archived
    }
}

impl PlayedHistory for MemoryHistory {
    fn load(&self, series: &str) -> Result<PlayedEpisodes> {
        Ok(self.records.get(series).cloned().unwrap_or_default())
    }

    fn save(&mut self, series: &str, played: &PlayedEpisodes) -> Result<()> {
        self.records.insert(series.to_string(), played.clone());
        Ok(())
    }

    fn archive(&mut self, series: &str) -> Result<()> {
        if self.records.remove(series).is_some() {
            self.archived.push(series.to_string());
        }
        Ok(())
    }
}

/// Commercials already aired, excluded from the next run's pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedList {
    items: Vec<String>,
}

impl UsedList {
    pub fn new() -> Self {
        UsedList::default()
    }

    pub fn from_lines(text: &str) -> Self {
        let items = text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .filter(|l| !l.trim().is_empty())
            .collect();
        UsedList { items }
    }

    /// Read `used.lst`. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(UsedList::new());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(UsedList::from_lines(&text))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), count = self.items.len(), "updating used list");
        let mut text = String::new();
        for item in &self.items {
            text.push_str(item);
            text.push('\n');
        }
        write_atomic(path, &text)
    }

    pub fn push(&mut self, path: &str) {
        self.items.push(path.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn played_insert_is_once_per_name() {
        let mut played = PlayedEpisodes::new();
        assert!(played.insert("S01E01", day(18)));
        assert!(!played.insert("S01E01", day(19)));
        assert_eq!(played.to_document().get("S01E01", "lastdate"), Some("20261018"));
        assert_eq!(played.len(), 1);
    }

    #[test]
    fn played_document_roundtrip_keeps_dates() {
        let mut played = PlayedEpisodes::new();
        played.insert("pilot", day(1));
        played.insert("finale", day(2));
        let doc = played.to_document();
        assert_eq!(doc.get("pilot", "lastdate"), Some("20261001"));
        assert_eq!(PlayedEpisodes::from_document(&doc), played);
    }

    #[test]
    fn played_dir_save_load_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = PlayedDir::new(dir.path().join("played"));
        assert!(history.load("Movies").unwrap().is_empty());

        let mut played = PlayedEpisodes::new();
        played.insert("Metropolis", day(19));
        history.save("Movies", &played).unwrap();
        assert!(history.load("Movies").unwrap().contains("Metropolis"));

        assert_eq!(history.series(), vec!["Movies"]);

        history.archive("Movies").unwrap();
        assert!(history.series().is_empty());
        assert!(!history.record_path("Movies").exists());
        assert!(history.archive_path("Movies").exists());
        assert!(history.load("Movies").unwrap().is_empty());
    }

    #[test]
    fn archive_without_record_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = PlayedDir::new(dir.path());
        history.archive("Nothing").unwrap();
        assert!(!history.archive_path("Nothing").exists());
    }

    #[test]
    fn memory_history_tracks_archives() {
        let mut played = PlayedEpisodes::new();
        played.insert("a", day(1));
        let mut history = MemoryHistory::new().with_record("Movies", played);
        history.archive("Movies").unwrap();
        history.archive("Movies").unwrap();
        assert_eq!(history.archived(), &["Movies".to_string()]);
        assert!(history.load("Movies").unwrap().is_empty());
    }

    #[test]
    fn used_list_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used.lst");
        assert!(UsedList::load(&path).unwrap().is_empty());

        let mut used = UsedList::new();
        used.push("/ads/a.mp4");
        used.push("/ads/b.mp4");
        used.save(&path).unwrap();

        let loaded = UsedList::load(&path).unwrap();
        assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["/ads/a.mp4", "/ads/b.mp4"]);
    }

    #[test]
    fn used_list_ignores_blank_lines() {
        let used = UsedList::from_lines("a\r\n\nb\n");
        assert_eq!(used.len(), 2);
    }
}
