//! Minimal `.ini` document model used by the settings, schedule and
//! played-episode files.
//!
//! Sections and keys keep their file order so a document written back
//! reads the same way it was authored. Keys are lowercased on the way in;
//! section names are kept as-is because they carry series names.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Section {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let key = key.to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key, value.to_string())),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn new() -> Self {
        IniDocument::default()
    }

    /// Parse document text. Lines outside any section and lines without a
    /// separator are skipped; their line numbers are returned so callers can
    /// decide whether to warn.
    pub fn parse(text: &str) -> (Self, Vec<usize>) {
        let mut doc = IniDocument::new();
        let mut skipped = Vec::new();
        let mut current: Option<usize> = None;

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                current = Some(doc.ensure_section(name));
                continue;
            }
            let split = line
                .find(['=', ':'])
                .map(|pos| (line[..pos].trim(), line[pos + 1..].trim()));
            match (current, split) {
                (Some(idx), Some((key, value))) if !key.is_empty() => {
                    doc.sections[idx].set(key, value);
                }
                _ => skipped.push(i + 1),
            }
        }
        (doc, skipped)
    }

    /// Read and parse a file. A missing file yields an empty document.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(IniDocument::new());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let (doc, skipped) = IniDocument::parse(&text);
        if !skipped.is_empty() {
            tracing::warn!(
                path = %path.display(),
                lines = ?skipped,
                "ignored malformed .ini lines"
            );
        }
        Ok(doc)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("[{}]\n", section.name));
            for (key, value) in section.entries() {
                out.push_str(&format!("{} = {}\n", key, value));
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    /// Add a section if absent. Returns its position.
    pub fn ensure_section(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let idx = self.ensure_section(section);
        self.sections[idx].set(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Write `contents` next to `path` and rename it into place, so readers
/// never see a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "slotcast".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents).map_err(|source| Error::PersistenceWriteFailure {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| Error::PersistenceWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}
