//! Episode selection per series.
//!
//! Every linear or random slot moves the series' `SeriesState` section in
//! the settings store; random slots also mark the episode in the series'
//! `PlayedEpisodes` record. A series is in one of four phases:
//!
//! - `Uninitialized`: never aired.
//! - `LinearTracked`: has a last played index and date.
//! - `RandomTracked`: has a position and a played-episode record.
//! - `NumericSkipPending`: a numeric slot left a skip count for the next
//!   linear slot.
//!
//! Nothing is written to disk until `persist`, including the archiving of
//! exhausted played records.

use crate::catalog::MediaList;
use crate::error::{Error, Result};
use crate::history::{format_date, parse_date, PlayedEpisodes, PlayedHistory};
use crate::schedule::{SequenceMode, SlotDescriptor};
use crate::store::SettingsStore;
use chrono::NaiveDate;
use fastrand::Rng;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Draws allowed per list entry before a randomized loop gives up.
pub const RETRY_FACTOR: usize = 10;

/// Retry budget of randomized loops over `len` candidates: `10 × len + 1`.
pub fn retry_budget(len: usize) -> usize {
    len * RETRY_FACTOR + 1
}

const KEY_LAST_PLAYED: &str = "lastplayed";
const KEY_LAST_DATE: &str = "lastdate";
const KEY_SKIP: &str = "skip";
const NO_DATE: &str = "00000000";

/// Persisted per-series position for linear and numeric sequencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesState {
    pub series: String,
    pub last_played_index: usize,
    pub last_played_date: Option<NaiveDate>,
    pub skip_count: u32,
}

impl SeriesState {
    pub fn new(series: &str) -> Self {
        SeriesState {
            series: series.to_string(),
            last_played_index: 0,
            last_played_date: None,
            skip_count: 0,
        }
    }

    /// Read a series section. `None` if the series was never tracked.
    /// Unreadable numbers fall back to zero.
    pub fn load(store: &dyn SettingsStore, series: &str) -> Option<Self> {
        if !store.has_section(series) {
            return None;
        }
        let number = |key: &str| -> u64 {
            store
                .get(series, key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0)
        };
        Some(SeriesState {
            series: series.to_string(),
            last_played_index: number(KEY_LAST_PLAYED) as usize,
            last_played_date: store.get(series, KEY_LAST_DATE).and_then(|d| parse_date(&d)),
            skip_count: number(KEY_SKIP) as u32,
        })
    }

    pub fn save(&self, store: &mut dyn SettingsStore) {
        let date = self
            .last_played_date
            .map(format_date)
            .unwrap_or_else(|| NO_DATE.to_string());
        store.set(&self.series, KEY_LAST_PLAYED, &self.last_played_index.to_string());
        store.set(&self.series, KEY_LAST_DATE, &date);
        store.set(&self.series, KEY_SKIP, &self.skip_count.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesPhase {
    Uninitialized,
    LinearTracked,
    RandomTracked,
    NumericSkipPending,
}

/// Outcome of `next_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// The series wrapped back to its start.
    pub rolled_over: bool,
    /// Today's earlier choice was reused.
    pub reused: bool,
}

impl Selection {
    fn fresh(index: usize) -> Self {
        Selection {
            index,
            rolled_over: false,
            reused: false,
        }
    }
}

pub struct EpisodeSelector {
    store: Box<dyn SettingsStore>,
    history: Box<dyn PlayedHistory>,
    /// Section of the settings store that holds channel settings; a series
    /// with this name would clobber it.
    reserved: String,
    today: NaiveDate,
    rng: Rng,
    played: HashMap<String, PlayedEpisodes>,
    dirty: BTreeSet<String>,
    /// Exhausted records to move aside before the fresh ones are saved.
    to_archive: BTreeSet<String>,
}

impl EpisodeSelector {
    pub fn new(
        store: Box<dyn SettingsStore>,
        history: Box<dyn PlayedHistory>,
        reserved: &str,
        today: NaiveDate,
        rng: Rng,
    ) -> Self {
        EpisodeSelector {
            store,
            history,
            reserved: reserved.to_string(),
            today,
            rng,
            played: HashMap::new(),
            dirty: BTreeSet::new(),
            to_archive: BTreeSet::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Move the session to another day (multi-day simulations).
    #[cfg(test)]
    pub(crate) fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    fn is_reserved(&self, series: &str) -> bool {
        series.eq_ignore_ascii_case(&self.reserved)
    }

    pub fn series_state(&self, series: &str) -> Option<SeriesState> {
        if self.is_reserved(series) {
            return None;
        }
        SeriesState::load(self.store.as_ref(), series)
    }

    /// Played-episode record of a series, loaded on first use.
    pub fn played(&mut self, series: &str) -> &PlayedEpisodes {
        self.ensure_played(series);
        &self.played[series]
    }

    pub fn phase(&mut self, series: &str) -> SeriesPhase {
        match self.series_state(series) {
            Some(state) if state.skip_count > 0 => SeriesPhase::NumericSkipPending,
            _ if !self.played(series).is_empty() => SeriesPhase::RandomTracked,
            Some(_) => SeriesPhase::LinearTracked,
            None => SeriesPhase::Uninitialized,
        }
    }

    /// Series whose played record will be archived by the next `persist`.
    pub fn pending_archives(&self) -> impl Iterator<Item = &str> {
        self.to_archive.iter().map(String::as_str)
    }

    fn ensure_played(&mut self, series: &str) {
        if self.played.contains_key(series) {
            return;
        }
        let record = match self.history.load(series) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, series, "played history unreadable, starting empty");
                PlayedEpisodes::new()
            }
        };
        self.played.insert(series.to_string(), record);
    }

    /// Pick the episode index for `slot` from `list`.
    pub fn next_index(&mut self, slot: &SlotDescriptor, list: &MediaList) -> Selection {
        let len = list.len().max(1);
        let series = slot.series.as_str();
        let phase = self.phase(series);
        debug!(series, ?phase, mode = %slot.mode, "selecting episode");

        let Some(state) = self.series_state(series) else {
            return match slot.mode {
                SequenceMode::Linear => Selection::fresh(0),
                SequenceMode::Numeric(n) => {
                    warn!(series, seq = n, "numeric seq before any linear/random slot");
                    let offset = (n.max(2) - 2) as usize;
                    let rolled_over = offset >= len;
                    if rolled_over {
                        info!(series, "series rolled over");
                    }
                    Selection {
                        index: offset % len,
                        rolled_over,
                        reused: false,
                    }
                }
                SequenceMode::Random => Selection::fresh(self.pick_random(series, list)),
            };
        };

        if state.last_played_date == Some(self.today) && !slot.mode.is_numeric() {
            let rolled_over = state.last_played_index >= len;
            let index = if rolled_over { 0 } else { state.last_played_index };
            debug!(series, index, "already selected today, reusing");
            return Selection {
                index,
                rolled_over,
                reused: true,
            };
        }

        match slot.mode {
            SequenceMode::Linear => {
                let step = if state.skip_count == 0 {
                    1
                } else {
                    state.skip_count as usize
                };
                let mut index = state.last_played_index + step;
                let rolled_over = index >= len;
                if rolled_over {
                    index = 0;
                    info!(series, "series rolled over");
                }
                Selection {
                    index,
                    rolled_over,
                    reused: false,
                }
            }
            SequenceMode::Numeric(n) => {
                let mut index = state.last_played_index + (n.max(2) - 1) as usize;
                let rolled_over = index >= len;
                if rolled_over {
                    index = (index - len) % len;
                    info!(series, "series rolled over");
                }
                Selection {
                    index,
                    rolled_over,
                    reused: false,
                }
            }
            SequenceMode::Random => Selection::fresh(self.pick_random(series, list)),
        }
    }

    /// Uniform draw among episodes not yet in the played record, with a
    /// bounded number of redraws. When every episode has aired, the series
    /// starts over with an empty record; the old one is archived on `persist`.
    fn pick_random(&mut self, series: &str, list: &MediaList) -> usize {
        let len = list.len();
        if len == 0 {
            return 0;
        }
        self.ensure_played(series);
        let played = &self.played[series];
        let rng = &mut self.rng;
        let is_played = |i: usize| list.get(i).is_some_and(|e| played.contains(&e.stem()));

        let mut index = rng.usize(..len);
        if !is_played(index) {
            return index;
        }
        let budget = retry_budget(len);
        for _ in 0..budget {
            index = rng.usize(..len);
            if !is_played(index) {
                return index;
            }
        }

        let unplayed: Vec<usize> = (0..len).filter(|&i| !is_played(i)).collect();
        if !unplayed.is_empty() {
            debug!(series, remaining = unplayed.len(), "random draws missed, picking from unplayed");
            return unplayed[rng.usize(..unplayed.len())];
        }

        let err = Error::SelectionExhausted {
            series: series.to_string(),
            attempts: budget + 1,
        };
        warn!(%err, "unable to find unplayed episode, series reset");
        self.to_archive.insert(series.to_string());
        self.played.insert(series.to_string(), PlayedEpisodes::new());
        self.dirty.insert(series.to_string());
        index
    }

    /// Commit a selection: linear and random slots move the last played
    /// position, numeric slots leave a skip count, random slots also mark the
    /// episode played.
    pub fn update(&mut self, slot: &SlotDescriptor, list: &MediaList, index: usize) {
        let series = slot.series.as_str();
        if self.is_reserved(series) {
            warn!(series, "series name is reserved, changes will not be tracked");
            return;
        }
        if let SequenceMode::Numeric(n) = slot.mode {
            self.store.add_section(series);
            self.store.set(series, KEY_SKIP, &n.max(2).to_string());
            return;
        }

        let mut state =
            SeriesState::load(self.store.as_ref(), series).unwrap_or_else(|| SeriesState::new(series));
        state.last_played_index = index;
        state.last_played_date = Some(self.today);
        state.skip_count = 0;
        state.save(self.store.as_mut());

        if slot.mode != SequenceMode::Random {
            return;
        }
        let Some(entry) = list.get(index) else {
            warn!(series, index, "selected index outside list, nothing marked");
            return;
        };
        let name = entry.stem();
        let today = self.today;
        self.ensure_played(series);
        if let Some(record) = self.played.get_mut(series) {
            if record.insert(&name, today) {
                debug!(series, episode = %name, "marking played episode");
                self.dirty.insert(series.to_string());
            }
        }
    }

    /// Archive exhausted played records, then write settings and every
    /// changed played record. A played record that cannot be archived or
    /// written is logged and skipped; a settings failure is returned.
    pub fn persist(&mut self) -> Result<()> {
        for series in std::mem::take(&mut self.to_archive) {
            if let Err(err) = self.history.archive(&series) {
                warn!(%err, series = %series, "unable to archive played history");
            }
        }
        for series in std::mem::take(&mut self.dirty) {
            if let Some(record) = self.played.get(&series) {
                if let Err(err) = self.history.save(&series, record) {
                    warn!(%err, series = %series, "played history not saved");
                }
            }
        }
        self.store.write()
    }
}
