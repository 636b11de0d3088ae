use crate::catalog::{MediaCatalog, MediaList};
use crate::config::{ChannelSettings, SupportKind, CHANNEL_SECTION};
use crate::error::Result;
use crate::filler::{CommercialFiller, FillOutcome, BLANK_SLOT_TOLERANCE_MS, SLOT_BREAK_TOLERANCE_MS};
use crate::history::{PlayedDir, UsedList};
use crate::paths::ChannelPaths;
use crate::playlist::{format_timestamp, EntryKind, MasterPlaylist};
use crate::schedule::{day_file, DaySchedule, SequenceMode, SlotDescriptor, SLOTS_PER_DAY};
use crate::selector::{EpisodeSelector, SeriesState};
use crate::store::{IniFileStore, SettingsStore};
use chrono::NaiveDate;
use fastrand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeReport {
    pub index: usize,
    pub path: String,
    pub duration_ms: u64,
    pub rolled_over: bool,
    pub reused: bool,
}

/// What happened in one half-hour slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub label: String,
    pub series: String,
    pub mode: SequenceMode,
    /// Playlist clock when the slot started, ms since midnight.
    pub start_ms: u64,
    /// A previous program ran past this slot's end.
    pub skipped: bool,
    pub reset_bumper: bool,
    pub episode: Option<EpisodeReport>,
    pub fill: Option<FillOutcome>,
}

impl SlotReport {
    fn new(slot: &SlotDescriptor, start_ms: u64) -> Self {
        SlotReport {
            label: slot.label.clone(),
            series: slot.series.clone(),
            mode: slot.mode,
            start_ms,
            skipped: false,
            reset_bumper: false,
            episode: None,
            fill: None,
        }
    }

    /// Undershoot carried into the next slot.
    pub fn drift_ms(&self) -> u64 {
        self.fill.map(|f| f.leftover_ms).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub schedule: String,
    pub entries: usize,
    pub programs: usize,
    pub commercials: usize,
    pub total_ms: u64,
    /// Largest leftover of any single fill.
    pub max_drift_ms: u64,
    pub pool_reloads: usize,
    /// Commercials left unused in the pool at the end of the day.
    pub pool_left: usize,
    pub catalog_size: usize,
    pub slots: Vec<SlotReport>,
}

/// One scheduling session: everything needed to build a day, owned for
/// the length of the run.
pub struct Engine {
    root: PathBuf,
    settings: ChannelSettings,
    schedule: DaySchedule,
    lists: HashMap<String, MediaList>,
    selector: EpisodeSelector,
    filler: CommercialFiller,
    playlist: MasterPlaylist,
    used_file: Option<PathBuf>,
    reports: Vec<SlotReport>,
}

impl Engine {
    /// Open the channel at `paths` for `today`: settings, schedule, every list
    /// the schedule needs, and the commercial pool. All configuration errors
    /// surface here, before any slot is scheduled.
    pub fn open(paths: &ChannelPaths, today: NaiveDate, seed: Option<u64>, check_support: bool) -> Result<Self> {
        if !paths.root().is_dir() {
            warn!(root = %paths.root().display(), "channel directory does not exist, creating it");
            paths.create_default_tree()?;
        }

        let mut store = IniFileStore::open(&paths.settings_file())?;
        let settings = ChannelSettings::load(&mut store);

        let schedule_path = paths.schedule_file(day_file(today));
        let schedule = DaySchedule::load(&schedule_path);
        let series = schedule
            .as_ref()
            .map(DaySchedule::series_names)
            .unwrap_or_default();
        paths.preflight(&settings, &series, check_support)?;
        let schedule = schedule?;
        info!(schedule = %schedule_path.display(), %today, "building day");

        let catalog = paths.catalog();
        let lists = load_lists(&catalog, &series)?;
        let commercials = catalog.load(&settings.commercials, None)?;
        let used = UsedList::load(&paths.used_file())?;

        let mut rng = match seed {
            Some(seed) => Rng::with_seed(seed),
            None => Rng::new(),
        };
        let selector = EpisodeSelector::new(
            Box::new(store),
            Box::new(PlayedDir::new(paths.played_dir())),
            CHANNEL_SECTION,
            today,
            rng.fork(),
        );
        let filler = CommercialFiller::new(commercials, used, rng.fork());

        Ok(Engine::new(paths.root(), settings, schedule, lists, selector, filler)
            .with_used_file(paths.used_file()))
    }

    /// Assemble a session from parts already loaded.
    pub fn new(
        root: &Path,
        settings: ChannelSettings,
        schedule: DaySchedule,
        lists: HashMap<String, MediaList>,
        selector: EpisodeSelector,
        filler: CommercialFiller,
    ) -> Self {
        Engine {
            root: root.to_path_buf(),
            settings,
            schedule,
            lists,
            selector,
            filler,
            playlist: MasterPlaylist::new(),
            used_file: None,
            reports: Vec::new(),
        }
    }

    /// Where `persist` writes the used-commercial list.
    pub fn with_used_file(mut self, path: PathBuf) -> Self {
        self.used_file = Some(path);
        self
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub fn playlist(&self) -> &MasterPlaylist {
        &self.playlist
    }

    pub fn selector(&self) -> &EpisodeSelector {
        &self.selector
    }

    pub fn filler(&self) -> &CommercialFiller {
        &self.filler
    }

    pub fn reports(&self) -> &[SlotReport] {
        &self.reports
    }

    fn append_support(&mut self, kind: SupportKind) {
        let media = self.settings.media(kind, &self.root);
        self.playlist.append(&media, kind.entry_kind());
    }

    /// Walk all 48 slots in order.
    pub fn build_day(&mut self) -> DaySummary {
        for index in 0..SLOTS_PER_DAY {
            let slot = self.schedule.slot(index);
            let report = self.run_slot(&slot);
            self.reports.push(report);
        }
        let summary = self.summary();
        info!(
            entries = summary.entries,
            total = %format_timestamp(summary.total_ms),
            max_drift_s = summary.max_drift_ms as f64 / 1000.0,
            reloads = summary.pool_reloads,
            pool_left = summary.pool_left,
            "day complete"
        );
        summary
    }

    /// Bumper, then the episode (or the fill video for a blank slot), then an
    /// optional interstitial, then commercials up to the next slot boundary.
    pub fn run_slot(&mut self, slot: &SlotDescriptor) -> SlotReport {
        let start_ms = self.playlist.total_ms();
        let mut report = SlotReport::new(slot, start_ms);
        let slot_end = slot.end_ms();
        if start_ms >= slot_end {
            info!(slot = %slot.label, series = %slot.series, "previous program overran slot, skipping");
            report.skipped = true;
            return report;
        }

        report.reset_bumper = self.filler.take_reset_pending();
        if report.reset_bumper {
            self.append_support(SupportKind::Reset);
        } else {
            self.append_support(SupportKind::Bumper);
        }

        let content = if slot.is_blank() {
            None
        } else {
            match self.lists.get(&slot.series) {
                Some(list) => Some(list),
                None => {
                    warn!(slot = %slot.label, series = %slot.series, "no list loaded for series, airing as blank");
                    None
                }
            }
        };

        let tolerance = match content {
            None => {
                self.append_support(SupportKind::Fill);
                BLANK_SLOT_TOLERANCE_MS
            }
            Some(list) => {
                let pick = self.selector.next_index(slot, list);
                if let Some(entry) = list.get(pick.index) {
                    self.playlist.append(entry, EntryKind::Program(slot.series.clone()));
                    report.episode = Some(EpisodeReport {
                        index: pick.index,
                        path: entry.path.clone(),
                        duration_ms: entry.duration_ms,
                        rolled_over: pick.rolled_over,
                        reused: pick.reused,
                    });
                }
                self.selector.update(slot, list, pick.index);

                if self.settings.interstitials {
                    let kind = if slot.is_top_of_hour() {
                        SupportKind::News
                    } else {
                        SupportKind::Weather
                    };
                    let media = self.settings.media(kind, &self.root);
                    self.playlist.append(&media, kind.entry_kind());
                }
                SLOT_BREAK_TOLERANCE_MS
            }
        };

        let target = slot_end.saturating_sub(self.playlist.total_ms());
        report.fill = Some(self.filler.fill(target, tolerance, &mut self.playlist));
        debug!(slot = %slot.label, target_ms = target, drift_ms = report.drift_ms(), "slot filled");
        report
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.selector.today(),
            schedule: day_file(self.selector.today()).to_string(),
            entries: self.playlist.len(),
            programs: self.playlist.count_of(EntryKind::is_program),
            commercials: self.playlist.count_of(|k| *k == EntryKind::Commercial),
            total_ms: self.playlist.total_ms(),
            max_drift_ms: self.filler.max_drift_ms(),
            pool_reloads: self.filler.reloads(),
            pool_left: self.filler.pool_len(),
            catalog_size: self.filler.catalog_len(),
            slots: self.reports.clone(),
        }
    }

    /// Write series state, played records and the used list. Only a
    /// settings failure is returned; history files are best effort.
    pub fn persist(&mut self) -> Result<()> {
        if let Some(path) = &self.used_file {
            if let Err(err) = self.filler.used().save(path) {
                warn!(%err, "used commercial list not saved");
            }
        }
        self.selector.persist()
    }
}

/// Load every series list the day needs. Missing or empty lists are fatal.
fn load_lists(catalog: &MediaCatalog, series: &[String]) -> Result<HashMap<String, MediaList>> {
    let mut lists = HashMap::new();
    for name in series {
        let list = catalog.load(name, None)?;
        lists.insert(name.clone(), list);
    }
    Ok(lists)
}

/// Print-friendly snapshot of every tracked series in a settings store.
pub fn series_states(store: &dyn SettingsStore) -> Vec<SeriesState> {
    store
        .sections()
        .iter()
        .filter(|s| !s.eq_ignore_ascii_case(CHANNEL_SECTION))
        .filter_map(|s| SeriesState::load(store, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use crate::media::MediaEntry;
    use crate::store::MemoryStore;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn list(name: &str, n: usize, ms: u64) -> MediaList {
        let entries = (1..=n)
            .map(|i| MediaEntry::new(format!("/tv/{}/ep{}.mp4", name, i), ms))
            .collect();
        MediaList::new(name, entries)
    }

    fn commercials(n: usize) -> MediaList {
        let entries = (0..n)
            .map(|i| MediaEntry::new(format!("/ads/ad{:03}.mp4", i), 15_000 + (i as u64 % 4) * 15_000))
            .collect();
        MediaList::new("Commercials", entries)
    }

    fn engine(schedule: &str, lists: Vec<MediaList>, settings: ChannelSettings) -> Engine {
        let schedule = DaySchedule::parse(schedule);
        let lists = lists.into_iter().map(|l| (l.name.clone(), l)).collect();
        let selector = EpisodeSelector::new(
            Box::new(MemoryStore::new()),
            Box::new(MemoryHistory::new()),
            CHANNEL_SECTION,
            day(),
            Rng::with_seed(11),
        );
        let filler = CommercialFiller::new(commercials(200), UsedList::new(), Rng::with_seed(12));
        Engine::new(Path::new("/srv/tv"), settings, schedule, lists, selector, filler)
    }

    #[test]
    fn blank_day_is_bumper_fill_and_commercials() {
        let mut engine = engine("", vec![], ChannelSettings::default());
        let summary = engine.build_day();
        assert_eq!(summary.slots.len(), 48);
        assert_eq!(summary.programs, 0);
        let pl = engine.playlist();
        assert_eq!(pl.count_of(|k| *k == EntryKind::Fill), 48);
        assert_eq!(pl.entries()[0].kind, EntryKind::Bumper);
        assert_eq!(pl.entries()[0].path, "/srv/tv/bumper.mp4");
        assert_eq!(pl.entries()[1].kind, EntryKind::Fill);
        assert!(pl.total_ms() <= 48 * 30 * 60_000);
        assert!(summary.slots.iter().all(|s| !s.skipped && s.fill.is_some()));
        assert_eq!(summary.catalog_size, 200);
        assert_eq!(summary.pool_reloads, 0);
        assert_eq!(summary.pool_left, 200 - summary.commercials);
    }

    #[test]
    fn news_slot_airs_first_episode_and_tracks_state() {
        let sched = "[1830]\nseries = NewsHour\nseq = linear\n";
        let mut engine = engine(sched, vec![list("NewsHour", 3, 600_000)], ChannelSettings::default());
        let summary = engine.build_day();
        let report = &summary.slots[37];
        assert_eq!(report.label, "1830");
        let episode = report.episode.as_ref().unwrap();
        assert_eq!(episode.index, 0);
        assert_eq!(episode.path, "/tv/NewsHour/ep1.mp4");

        let state = engine.selector().series_state("NewsHour").unwrap();
        assert_eq!(state.last_played_index, 0);
        assert_eq!(state.last_played_date, Some(day()));
        assert_eq!(summary.programs, 1);
    }

    #[test]
    fn each_slot_ends_near_its_boundary() {
        let sched = "[0000]\nseries = Show\nseq = linear\n[0030]\nseries = Show\nseq = 2\n";
        let mut engine = engine(sched, vec![list("Show", 10, 1_320_000)], ChannelSettings::default());
        engine.build_day();
        let reports = engine.reports().to_vec();
        for (i, pair) in reports.windows(2).enumerate() {
            let (this, next) = (&pair[0], &pair[1]);
            let boundary = (i as u64 + 1) * 1_800_000;
            assert!(!next.skipped);
            assert!(next.start_ms <= boundary);
            // the next slot starts exactly where this slot's leftover begins
            assert_eq!(boundary - next.start_ms, this.drift_ms());
        }
        assert_eq!(reports[1].episode.as_ref().unwrap().index, 1);
    }

    #[test]
    fn long_program_skips_overrun_slot() {
        // a 66 minute movie at midnight runs past the end of 0030
        let sched = "[0000]\nseries = Movies\nseq = linear\n";
        let mut engine = engine(sched, vec![list("Movies", 2, 4_000_000)], ChannelSettings::default());
        let summary = engine.build_day();
        assert!(!summary.slots[0].skipped);
        assert_eq!(summary.slots[0].drift_ms(), 0);
        assert!(summary.slots[1].skipped);
        assert!(!summary.slots[2].skipped);
        assert_eq!(summary.slots[2].start_ms, 4_005_000);
    }

    #[test]
    fn interstitials_alternate_news_and_weather() {
        let sched = "[0000]\nseries = Show\nseq = linear\n[0030]\nseries = Show\nseq = 2\n";
        let settings = ChannelSettings {
            interstitials: true,
            ..ChannelSettings::default()
        };
        let mut engine = engine(sched, vec![list("Show", 4, 1_200_000)], settings);
        engine.build_day();
        let kinds: Vec<&EntryKind> = engine
            .playlist()
            .entries()
            .iter()
            .map(|e| &e.kind)
            .filter(|k| matches!(k, EntryKind::News | EntryKind::Weather))
            .collect();
        assert_eq!(kinds, vec![&EntryKind::News, &EntryKind::Weather]);
    }

    #[test]
    fn reset_bumper_follows_pool_reload() {
        let schedule = DaySchedule::parse("");
        let selector = EpisodeSelector::new(
            Box::new(MemoryStore::new()),
            Box::new(MemoryHistory::new()),
            CHANNEL_SECTION,
            day(),
            Rng::with_seed(1),
        );
        // a small pool forces reloads during the day
        let filler = CommercialFiller::new(commercials(12), UsedList::new(), Rng::with_seed(2));
        let mut engine = Engine::new(
            Path::new("/srv/tv"),
            ChannelSettings::default(),
            schedule,
            HashMap::new(),
            selector,
            filler,
        );
        let summary = engine.build_day();
        assert!(summary.pool_reloads > 0);
        let resets = engine.playlist().count_of(|k| *k == EntryKind::ResetBumper);
        assert!(resets > 0);
        assert!(summary.slots.iter().any(|s| s.reset_bumper));
        assert_eq!(
            resets,
            summary.slots.iter().filter(|s| s.reset_bumper).count()
        );
    }

    #[test]
    fn slot_with_unknown_series_airs_blank() {
        let sched = "[0000]\nseries = Ghost\nseq = linear\n";
        let mut engine = engine(sched, vec![], ChannelSettings::default());
        let report = engine.run_slot(&DaySchedule::parse(sched).slot(0));
        assert!(report.episode.is_none());
        assert_eq!(engine.playlist().entries()[1].kind, EntryKind::Fill);
    }

    #[test]
    fn series_states_skip_channel_section() {
        let mut store = MemoryStore::new();
        ChannelSettings::default().store(&mut store);
        store.set("News", "lastplayed", "4");
        store.set("News", "lastdate", "20261018");
        let states = series_states(&store);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].series, "News");
        assert_eq!(states[0].last_played_index, 4);
    }
}
