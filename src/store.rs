//! Key-value persistence behind the global settings and series state.
//!
//! The engine only talks to `SettingsStore`; `IniFileStore` backs it with
//! `config/settings.ini`, `MemoryStore` keeps everything in memory for tests
//! and dry runs.

use crate::error::Result;
use crate::ini::IniDocument;
use std::path::{Path, PathBuf};

pub trait SettingsStore {
    fn get(&self, section: &str, key: &str) -> Option<String>;
    fn set(&mut self, section: &str, key: &str, value: &str);
    fn has_section(&self, section: &str) -> bool;
    fn add_section(&mut self, section: &str);
    fn sections(&self) -> Vec<String>;
    /// Flush pending changes to durable storage.
    fn write(&mut self) -> Result<()>;

    fn get_or(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key)
            .unwrap_or_else(|| default.to_string())
    }
}

/// `settings.ini` on disk. Changes stay in memory until `write`.
#[derive(Debug)]
pub struct IniFileStore {
    path: PathBuf,
    doc: IniDocument,
}

impl IniFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(IniFileStore {
            path: path.to_path_buf(),
            doc: IniDocument::load(path)?,
        })
    }
}

impl SettingsStore for IniFileStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.doc.get(section, key).map(str::to_string)
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.doc.set(section, key, value);
    }

    fn has_section(&self, section: &str) -> bool {
        self.doc.has_section(section)
    }

    fn add_section(&mut self, section: &str) {
        self.doc.ensure_section(section);
    }

    fn sections(&self) -> Vec<String> {
        self.doc.section_names()
    }

    fn write(&mut self) -> Result<()> {
        tracing::info!(path = %self.path.display(), "updating settings");
        self.doc.save(&self.path)
    }
}

/// In-memory store. Counts writes so callers can check persistence happened.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    doc: IniDocument,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.doc.get(section, key).map(str::to_string)
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.doc.set(section, key, value);
    }

    fn has_section(&self, section: &str) -> bool {
        self.doc.has_section(section)
    }

    fn add_section(&mut self, section: &str) {
        self.doc.ensure_section(section);
    }

    fn sections(&self) -> Vec<String> {
        self.doc.section_names()
    }

    fn write(&mut self) -> Result<()> {
        self.writes += 1;
        Ok(())
    }
}
