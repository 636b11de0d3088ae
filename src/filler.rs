//! Commercial fill: randomized accept/reject packing of commercials into a
//! time budget, with pool reload when the working pool runs low.

use crate::catalog::MediaList;
use crate::error::Error;
use crate::history::UsedList;
use crate::playlist::{EntryKind, MasterPlaylist};
use crate::selector::retry_budget;
use fastrand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

/// Pool size below which the pool is rebuilt from the full catalog.
pub const LOW_WATER_MARK: usize = 10;

/// Tolerance for the break after a program.
pub const SLOT_BREAK_TOLERANCE_MS: u64 = 5_000;

/// Tolerance for blank slots filled around the fill video.
pub const BLANK_SLOT_TOLERANCE_MS: u64 = 10_000;

/// Result of one `fill` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillOutcome {
    pub target_ms: u64,
    pub filled_ms: u64,
    /// Undershoot left for the next slot to absorb.
    pub leftover_ms: u64,
    pub accepted: usize,
    pub reloaded: bool,
}

pub struct CommercialFiller {
    catalog: MediaList,
    pool: MediaList,
    used: UsedList,
    rng: Rng,
    reset_pending: bool,
    reloads: usize,
    max_drift_ms: u64,
}

impl CommercialFiller {
    /// Build the working pool: the catalog reshuffled, minus everything the
    /// used list says aired in earlier runs.
    pub fn new(catalog: MediaList, used: UsedList, mut rng: Rng) -> Self {
        let mut pool = catalog.clone();
        pool.shuffle(&mut rng);
        let mut excluded = 0;
        for path in used.iter() {
            if pool.remove_first(path) {
                excluded += 1;
            }
        }
        debug!(
            catalog = catalog.len(),
            pool = pool.len(),
            excluded,
            "commercial pool loaded"
        );
        CommercialFiller {
            catalog,
            pool,
            used,
            rng,
            reset_pending: false,
            reloads: 0,
            max_drift_ms: 0,
        }
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    pub fn used(&self) -> &UsedList {
        &self.used
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    /// Largest leftover of any fill so far.
    pub fn max_drift_ms(&self) -> u64 {
        self.max_drift_ms
    }

    /// True once after each reload; the next bumper should be the reset one.
    pub fn take_reset_pending(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }

    fn reload(&mut self) {
        let err = Error::PoolExhausted {
            pool: self.pool.len(),
            catalog: self.catalog.len(),
        };
        warn!(%err, "commercial pool depleted, reloading");
        self.pool = self.catalog.clone();
        self.pool.shuffle(&mut self.rng);
        self.used.clear();
        self.reset_pending = true;
        self.reloads += 1;
    }

    /// Append commercials to `playlist` until the remaining target is within
    /// `tolerance_ms` or the retry budget runs out. Never overshoots.
    pub fn fill(&mut self, target_ms: u64, tolerance_ms: u64, playlist: &mut MasterPlaylist) -> FillOutcome {
        let mut outcome = FillOutcome {
            target_ms,
            ..FillOutcome::default()
        };
        let mut remaining = target_ms;
        let mut limit = retry_budget(self.pool.len());
        debug!(pool = self.pool.len(), target_ms, "commercial fill");

        while limit > 0 && remaining > tolerance_ms {
            if self.pool.len() < LOW_WATER_MARK && self.catalog.len() > self.pool.len() {
                self.reload();
                limit = retry_budget(self.pool.len());
                outcome.reloaded = true;
            }
            if self.pool.is_empty() {
                break;
            }
            let index = self.rng.usize(..self.pool.len());
            let fits = self
                .pool
                .get(index)
                .is_some_and(|c| c.duration_ms <= remaining);
            if !fits {
                limit -= 1;
                continue;
            }
            if let Some(commercial) = self.pool.take(index) {
                playlist.append(&commercial, EntryKind::Commercial);
                self.used.push(&commercial.path);
                remaining -= commercial.duration_ms;
                outcome.filled_ms += commercial.duration_ms;
                outcome.accepted += 1;
            }
        }

        outcome.leftover_ms = remaining;
        self.max_drift_ms = self.max_drift_ms.max(remaining);
        debug!(
            "filled: {:.3}m leftover: {:.3}s",
            outcome.filled_ms as f64 / 60_000.0,
            remaining as f64 / 1000.0
        );
        outcome
    }
}
