use crate::media::MediaEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an entry is doing in the day's program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "series")]
pub enum EntryKind {
    Program(String),
    Commercial,
    Bumper,
    ResetBumper,
    Fill,
    News,
    Weather,
}

impl EntryKind {
    pub fn is_program(&self) -> bool {
        matches!(self, EntryKind::Program(_))
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Program(series) => write!(f, "{}", series),
            EntryKind::Commercial => write!(f, "commercial"),
            EntryKind::Bumper => write!(f, "bumper"),
            EntryKind::ResetBumper => write!(f, "reset bumper"),
            EntryKind::Fill => write!(f, "fill"),
            EntryKind::News => write!(f, "news"),
            EntryKind::Weather => write!(f, "weather"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub path: String,
    pub duration_ms: u64,
    /// Milliseconds since midnight at which this entry starts.
    pub start_ms: u64,
    #[serde(flatten)]
    pub kind: EntryKind,
}

impl PlaylistEntry {
    pub fn media(&self) -> MediaEntry {
        MediaEntry::new(self.path.clone(), self.duration_ms)
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// `HH:MM:SS` for a millisecond offset from midnight. Hours keep counting
/// past 24 for programs that overrun the day.
pub fn format_timestamp(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// The day's ordered program. `total_ms` always equals the sum of every
/// appended duration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MasterPlaylist {
    entries: Vec<PlaylistEntry>,
    total_ms: u64,
}

impl MasterPlaylist {
    pub fn new() -> Self {
        MasterPlaylist::default()
    }

    /// Append an entry, logging its air time.
    pub fn append(&mut self, media: &MediaEntry, kind: EntryKind) {
        let start_ms = self.total_ms;
        let line = format!(
            "{} [{}]: {} : {:.3} minutes",
            format_timestamp(start_ms),
            kind,
            media.stem(),
            media.minutes()
        );
        if kind.is_program() {
            tracing::info!("{}", line);
        } else {
            tracing::debug!("{}", line);
        }
        self.entries.push(PlaylistEntry {
            path: media.path.clone(),
            duration_ms: media.duration_ms,
            start_ms,
            kind,
        });
        self.total_ms += media.duration_ms;
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn count_of(&self, pred: impl Fn(&EntryKind) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.kind)).count()
    }

    /// Entry airing at `offset_ms` since midnight, and how far into it.
    /// `None` once the offset is past the end of the playlist.
    pub fn locate(&self, offset_ms: u64) -> Option<(usize, u64)> {
        self.entries
            .iter()
            .position(|e| offset_ms < e.end_ms())
            .map(|i| (i, offset_ms.saturating_sub(self.entries[i].start_ms)))
    }
}
