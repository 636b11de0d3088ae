//! Channel-wide settings, kept in the `[CHANNEL]` section of
//! `config/settings.ini` next to the per-series state.

use crate::error::Error;
use crate::media::MediaEntry;
use crate::playlist::EntryKind;
use crate::store::SettingsStore;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

pub const CHANNEL_SECTION: &str = "CHANNEL";

const KEY_COMMERCIALS: &str = "commercials";
const KEY_INTERSTITIALS: &str = "interstitials";
const DEFAULT_COMMERCIALS: &str = "Commercials";

/// The short videos the channel airs between programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportKind {
    Bumper,
    Reset,
    Fill,
    News,
    Weather,
}

impl SupportKind {
    pub const ALL: [SupportKind; 5] = [
        SupportKind::Bumper,
        SupportKind::Reset,
        SupportKind::Fill,
        SupportKind::News,
        SupportKind::Weather,
    ];

    fn key(self) -> &'static str {
        match self {
            SupportKind::Bumper => "bumper_video",
            SupportKind::Reset => "reset_video",
            SupportKind::Fill => "fill_video",
            SupportKind::News => "news_video",
            SupportKind::Weather => "weather_video",
        }
    }

    fn default_video(self) -> SupportVideo {
        let (file, duration_ms) = match self {
            SupportKind::Bumper => ("bumper.mp4", 5_000),
            SupportKind::Reset => ("reset.mp4", 5_000),
            // 29.5 minutes: a blank slot minus its bumper
            SupportKind::Fill => ("fill.mp4", 1_770_000),
            SupportKind::News => ("news.mp4", 25_000),
            SupportKind::Weather => ("weather.mp4", 25_000),
        };
        SupportVideo {
            file: file.to_string(),
            duration_ms,
        }
    }

    pub fn entry_kind(self) -> EntryKind {
        match self {
            SupportKind::Bumper => EntryKind::Bumper,
            SupportKind::Reset => EntryKind::ResetBumper,
            SupportKind::Fill => EntryKind::Fill,
            SupportKind::News => EntryKind::News,
            SupportKind::Weather => EntryKind::Weather,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportVideo {
    /// File name relative to the channel directory (or absolute).
    pub file: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSettings {
    /// Name of the commercial list in `media/`.
    pub commercials: String,
    pub bumper: SupportVideo,
    pub reset: SupportVideo,
    pub fill: SupportVideo,
    pub news: SupportVideo,
    pub weather: SupportVideo,
    /// Air news/weather after each program.
    pub interstitials: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        ChannelSettings {
            commercials: DEFAULT_COMMERCIALS.to_string(),
            bumper: SupportKind::Bumper.default_video(),
            reset: SupportKind::Reset.default_video(),
            fill: SupportKind::Fill.default_video(),
            news: SupportKind::News.default_video(),
            weather: SupportKind::Weather.default_video(),
            interstitials: false,
        }
    }
}

impl ChannelSettings {
    /// Read the channel section. When it is absent the defaults are written
    /// into the store (persisted with the next `write`).
    pub fn load(store: &mut dyn SettingsStore) -> Self {
        let defaults = ChannelSettings::default();
        if !store.has_section(CHANNEL_SECTION) {
            info!("no channel settings, using defaults");
            defaults.store(store);
            return defaults;
        }

        let video = |kind: SupportKind| -> SupportVideo {
            let default = kind.default_video();
            let file = store.get_or(CHANNEL_SECTION, kind.key(), &default.file);
            let ms_key = format!("{}_ms", kind.key());
            let duration_ms = match store.get(CHANNEL_SECTION, &ms_key) {
                None => default.duration_ms,
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(ms) if ms > 0 => ms,
                    _ => {
                        let err = Error::InvalidSetting {
                            key: ms_key.clone(),
                            value: raw,
                        };
                        warn!(%err, default = default.duration_ms, "using default");
                        default.duration_ms
                    }
                },
            };
            SupportVideo { file, duration_ms }
        };

        let interstitials = match store.get(CHANNEL_SECTION, KEY_INTERSTITIALS) {
            None => defaults.interstitials,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                let err = Error::InvalidSetting {
                    key: KEY_INTERSTITIALS.to_string(),
                    value: raw,
                };
                warn!(%err, "using default");
                defaults.interstitials
            }),
        };

        ChannelSettings {
            commercials: store.get_or(CHANNEL_SECTION, KEY_COMMERCIALS, DEFAULT_COMMERCIALS),
            bumper: video(SupportKind::Bumper),
            reset: video(SupportKind::Reset),
            fill: video(SupportKind::Fill),
            news: video(SupportKind::News),
            weather: video(SupportKind::Weather),
            interstitials,
        }
    }

    /// Write every setting into the channel section.
    pub fn store(&self, store: &mut dyn SettingsStore) {
        store.add_section(CHANNEL_SECTION);
        store.set(CHANNEL_SECTION, KEY_COMMERCIALS, &self.commercials);
        for kind in SupportKind::ALL {
            let video = self.video(kind);
            store.set(CHANNEL_SECTION, kind.key(), &video.file);
            store.set(
                CHANNEL_SECTION,
                &format!("{}_ms", kind.key()),
                &video.duration_ms.to_string(),
            );
        }
        store.set(CHANNEL_SECTION, KEY_INTERSTITIALS, &self.interstitials.to_string());
    }

    pub fn video(&self, kind: SupportKind) -> &SupportVideo {
        match kind {
            SupportKind::Bumper => &self.bumper,
            SupportKind::Reset => &self.reset,
            SupportKind::Fill => &self.fill,
            SupportKind::News => &self.news,
            SupportKind::Weather => &self.weather,
        }
    }

    /// Playable entry for a support video, resolved against the channel root.
    pub fn media(&self, kind: SupportKind, root: &Path) -> MediaEntry {
        let video = self.video(kind);
        let path = root.join(&video.file);
        MediaEntry::new(path.to_string_lossy(), video.duration_ms)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn missing_section_writes_defaults() {
        let mut store = MemoryStore::new();
        let settings = ChannelSettings::load(&mut store);
        assert_eq!(settings, ChannelSettings::default());
        assert_eq!(store.get(CHANNEL_SECTION, "fill_video_ms").as_deref(), Some("1770000"));
        assert_eq!(store.get(CHANNEL_SECTION, "commercials").as_deref(), Some("Commercials"));
        assert_eq!(store.get(CHANNEL_SECTION, "interstitials").as_deref(), Some("false"));
    }

    #[test]
    fn reads_overrides_and_keeps_defaults_for_missing_keys() {
        let mut store = MemoryStore::new();
        store.set(CHANNEL_SECTION, "commercials", "Ads");
        store.set(CHANNEL_SECTION, "bumper_video", "ident.mkv");
        store.set(CHANNEL_SECTION, "bumper_video_ms", "7000");
        store.set(CHANNEL_SECTION, "interstitials", "yes");
        let settings = ChannelSettings::load(&mut store);
        assert_eq!(settings.commercials, "Ads");
        assert_eq!(settings.bumper.file, "ident.mkv");
        assert_eq!(settings.bumper.duration_ms, 7_000);
        assert_eq!(settings.weather, SupportKind::Weather.default_video());
        assert!(settings.interstitials);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(CHANNEL_SECTION, "fill_video_ms", "long");
        store.set(CHANNEL_SECTION, "news_video_ms", "0");
        store.set(CHANNEL_SECTION, "interstitials", "maybe");
        let settings = ChannelSettings::load(&mut store);
        assert_eq!(settings.fill.duration_ms, 1_770_000);
        assert_eq!(settings.news.duration_ms, 25_000);
        assert!(!settings.interstitials);
    }

    #[test]
    fn media_resolves_against_root() {
        let settings = ChannelSettings::default();
        let entry = settings.media(SupportKind::Reset, Path::new("/srv/channel"));
        assert_eq!(entry.path, "/srv/channel/reset.mp4");
        assert_eq!(entry.duration_ms, 5_000);
        assert_eq!(SupportKind::Reset.entry_kind(), EntryKind::ResetBumper);
    }
}
