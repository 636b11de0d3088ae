use crate::error::{Error, Result};
use crate::ini::IniDocument;
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Number of half-hour slots in a day.
pub const SLOTS_PER_DAY: usize = 48;

/// Length of one slot in minutes.
pub const SLOT_MINUTES: u32 = 30;

/// Series name used for slots with nothing scheduled.
pub const BLANK_SERIES: &str = "blank";

/// Schedule spellings that all mean "nothing scheduled".
const BLANK_NAMES: &[&str] = &["", "blank", "none", "empty"];

/// Schedule file stems, Monday first.
pub const DAY_FILES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// How the next episode of a series is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Next episode in list order.
    Linear,
    /// Any episode not yet aired.
    Random,
    /// The n-th episode aired today for a series already started by an
    /// earlier linear or random slot. Always at least 2.
    Numeric(u32),
}

impl SequenceMode {
    /// Build a numeric mode, raising values below 2 to 2.
    pub fn numeric(n: u32) -> Self {
        SequenceMode::Numeric(n.max(2))
    }

    /// Parse a mode from a schedule value (case-insensitive).
    pub fn from_str_loose(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "linear" => Ok(SequenceMode::Linear),
            "random" => Ok(SequenceMode::Random),
            _ if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s
                .parse::<u32>()
                .map(SequenceMode::numeric)
                .map_err(|_| format!("Sequence number '{}' out of range", s)),
            _ => Err(format!(
                "Unknown sequence '{}'. Expected: linear, random, or a number",
                s
            )),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SequenceMode::Numeric(_))
    }
}

impl fmt::Display for SequenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceMode::Linear => write!(f, "linear"),
            SequenceMode::Random => write!(f, "random"),
            SequenceMode::Numeric(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for SequenceMode {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// One resolved half-hour slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDescriptor {
    /// `HHMM`
    pub label: String,
    /// Minutes since midnight.
    pub start_minute: u32,
    pub series: String,
    pub mode: SequenceMode,
}

impl SlotDescriptor {
    pub fn new(index: usize, series: &str, mode: SequenceMode) -> Self {
        SlotDescriptor {
            label: slot_label(index),
            start_minute: index as u32 * SLOT_MINUTES,
            series: series.to_string(),
            mode,
        }
    }

    pub fn blank(index: usize) -> Self {
        SlotDescriptor::new(index, BLANK_SERIES, SequenceMode::Linear)
    }

    pub fn is_blank(&self) -> bool {
        self.series == BLANK_SERIES
    }

    /// Milliseconds since midnight at which the next slot begins.
    pub fn end_ms(&self) -> u64 {
        (self.start_minute + SLOT_MINUTES) as u64 * 60_000
    }

    /// Slot starting on the hour (`HH00`).
    pub fn is_top_of_hour(&self) -> bool {
        self.start_minute % 60 == 0
    }
}

/// `HHMM` label of slot `index` (0..48).
pub fn slot_label(index: usize) -> String {
    let minutes = index as u32 * SLOT_MINUTES;
    format!("{:02}{:02}", minutes / 60, minutes % 60)
}

/// All 48 labels of a day, `0000` through `2330`.
pub fn slot_labels() -> Vec<String> {
    (0..SLOTS_PER_DAY).map(slot_label).collect()
}

/// Schedule file stem for a date (`mon` .. `sun`).
pub fn day_file(date: NaiveDate) -> &'static str {
    DAY_FILES[date.weekday().num_days_from_monday() as usize]
}

/// Normalise a schedule series name; every blank spelling becomes `blank`.
pub fn normalize_series(name: &str) -> String {
    let trimmed = name.trim();
    if BLANK_NAMES.contains(&trimmed.to_lowercase().as_str()) {
        BLANK_SERIES.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One day-of-week schedule file.
#[derive(Debug, Clone, Default)]
pub struct DaySchedule {
    doc: IniDocument,
}

impl DaySchedule {
    pub fn from_document(doc: IniDocument) -> Self {
        DaySchedule { doc }
    }

    pub fn parse(text: &str) -> Self {
        DaySchedule {
            doc: IniDocument::parse(text).0,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigurationMissing(vec![path.display().to_string()]));
        }
        Ok(DaySchedule {
            doc: IniDocument::load(path)?,
        })
    }

    /// Resolve slot `index` strictly, reporting why an entry is unusable.
    pub fn try_slot(&self, index: usize) -> Result<SlotDescriptor> {
        let label = slot_label(index);
        let malformed = |reason: String| Error::ScheduleEntryMalformed {
            slot: label.clone(),
            reason,
        };
        let series = self
            .doc
            .get(&label, "series")
            .ok_or_else(|| malformed("missing series".to_string()))?;
        let seq = self
            .doc
            .get(&label, "seq")
            .ok_or_else(|| malformed("missing seq".to_string()))?;
        let mode = SequenceMode::from_str_loose(seq).map_err(malformed)?;
        Ok(SlotDescriptor::new(index, &normalize_series(series), mode))
    }

    /// Resolve slot `index`. Unusable entries air as blank/linear.
    pub fn slot(&self, index: usize) -> SlotDescriptor {
        match self.try_slot(index) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(%err, "error getting schedule entry, slot set to blank");
                SlotDescriptor::blank(index)
            }
        }
    }

    /// All 48 slots of the day in order.
    pub fn slots(&self) -> Vec<SlotDescriptor> {
        (0..SLOTS_PER_DAY).map(|i| self.slot(i)).collect()
    }

    /// Distinct non-blank series referenced by usable slots, in first-use order.
    pub fn series_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for index in 0..SLOTS_PER_DAY {
            if let Ok(slot) = self.try_slot(index) {
                if !slot.is_blank() && !names.contains(&slot.series) {
                    names.push(slot.series);
                }
            }
        }
        names
    }
}

/// Contents of a freshly created schedule file: every slot blank/linear.
pub fn default_schedule_text() -> String {
    slot_labels()
        .iter()
        .map(|label| format!("[{}]\nseries = blank\nseq = linear\n\n", label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_labels_cover_the_day() {
        let labels = slot_labels();
        assert_eq!(labels.len(), 48);
        assert_eq!(labels[0], "0000");
        assert_eq!(labels[1], "0030");
        assert_eq!(labels[37], "1830");
        assert_eq!(labels[47], "2330");
    }

    #[test]
    fn sequence_mode_from_str() {
        assert_eq!(SequenceMode::from_str_loose("linear").unwrap(), SequenceMode::Linear);
        assert_eq!(SequenceMode::from_str_loose("RANDOM").unwrap(), SequenceMode::Random);
        assert_eq!(SequenceMode::from_str_loose("3").unwrap(), SequenceMode::Numeric(3));
        assert!(SequenceMode::from_str_loose("shuffle").is_err());
        assert!(SequenceMode::from_str_loose("").is_err());
        assert!(SequenceMode::from_str_loose("-1").is_err());
    }

    #[test]
    fn numeric_below_two_is_raised() {
        assert_eq!(SequenceMode::from_str_loose("0").unwrap(), SequenceMode::Numeric(2));
        assert_eq!(SequenceMode::from_str_loose("1").unwrap(), SequenceMode::Numeric(2));
        assert_eq!(SequenceMode::numeric(1), SequenceMode::Numeric(2));
    }

    #[test]
    fn sequence_mode_display() {
        assert_eq!(SequenceMode::Linear.to_string(), "linear");
        assert_eq!(SequenceMode::Numeric(4).to_string(), "4");
        assert_eq!(serde_json::to_string(&SequenceMode::Random).unwrap(), "\"random\"");
    }

    #[test]
    fn day_file_matches_weekday() {
        // 2026-10-19 is a Monday
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(day_file(monday), "mon");
        assert_eq!(day_file(monday + chrono::Days::new(6)), "sun");
    }

    #[test]
    fn blank_spellings_normalize() {
        assert_eq!(normalize_series("None"), "blank");
        assert_eq!(normalize_series("  "), "blank");
        assert_eq!(normalize_series("EMPTY"), "blank");
        assert_eq!(normalize_series("NewsHour"), "NewsHour");
    }

    #[test]
    fn resolves_slot_with_timing() {
        let sched = DaySchedule::parse("[1830]\nseries = NewsHour\nseq = linear\n");
        let slot = sched.slot(37);
        assert_eq!(slot.label, "1830");
        assert_eq!(slot.start_minute, 1110);
        assert_eq!(slot.series, "NewsHour");
        assert_eq!(slot.mode, SequenceMode::Linear);
        assert_eq!(slot.end_ms(), 1140 * 60_000);
        assert!(!slot.is_top_of_hour());
    }

    #[test]
    fn missing_or_bad_entries_become_blank_linear() {
        let sched = DaySchedule::parse(
            "[0000]\nseries = Cartoons\n\n[0030]\nseries = Cartoons\nseq = sometimes\n",
        );
        assert!(sched.try_slot(0).is_err());
        assert!(sched.try_slot(1).is_err());
        assert!(sched.try_slot(2).is_err());
        for i in 0..3 {
            let slot = sched.slot(i);
            assert!(slot.is_blank());
            assert_eq!(slot.mode, SequenceMode::Linear);
        }
    }

    #[test]
    fn series_names_skip_blank_and_duplicates() {
        let sched = DaySchedule::parse(
            "[0000]\nseries = A\nseq = linear\n[0030]\nseries = none\nseq = linear\n\
             [0100]\nseries = B\nseq = random\n[0130]\nseries = A\nseq = 2\n",
        );
        assert_eq!(sched.series_names(), vec!["A", "B"]);
    }

    #[test]
    fn default_schedule_is_all_blank() {
        let sched = DaySchedule::parse(&default_schedule_text());
        let slots = sched.slots();
        assert_eq!(slots.len(), SLOTS_PER_DAY);
        assert!(slots.iter().all(|s| s.is_blank() && s.mode == SequenceMode::Linear));
        assert!(sched.try_slot(47).is_ok());
    }

    #[test]
    fn load_missing_schedule_is_configuration_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaySchedule::load(&dir.path().join("mon.ini")).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }
}
