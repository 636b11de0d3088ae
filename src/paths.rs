//! Channel directory layout.
//!
//! ```text
//! <root>/
//!   config/settings.ini   channel settings + series state
//!   config/used.lst       commercials aired by earlier runs
//!   config/played/        random-mode history, one file per series
//!   sched/mon.ini ..      one schedule per weekday
//!   media/<name>.lst      list files
//!   log/slotcast.log
//!   bumper.mp4 ..         support videos
//! ```

use crate::catalog::{MediaCatalog, LIST_EXTENSION};
use crate::config::{ChannelSettings, SupportKind};
use crate::error::{Error, Result};
use crate::ini::write_atomic;
use crate::schedule::{default_schedule_text, DAY_FILES};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const APP_DIR: &str = ".slotcast";
pub const SUBDIRS: [&str; 4] = ["config", "sched", "media", "log"];
pub const LOG_FILE: &str = "slotcast.log";

/// `~/.slotcast`
pub fn default_root() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::ConfigurationMissing(vec!["home directory".to_string()]))?;
    Ok(home.join(APP_DIR))
}

#[derive(Debug, Clone)]
pub struct ChannelPaths {
    root: PathBuf,
}

impl ChannelPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ChannelPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn sched_dir(&self) -> PathBuf {
        self.root.join("sched")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(LOG_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir().join("settings.ini")
    }

    pub fn used_file(&self) -> PathBuf {
        self.config_dir().join("used.lst")
    }

    pub fn played_dir(&self) -> PathBuf {
        self.config_dir().join("played")
    }

    /// `sched/<day>.ini`
    pub fn schedule_file(&self, day: &str) -> PathBuf {
        self.sched_dir().join(format!("{}.ini", day))
    }

    pub fn catalog(&self) -> MediaCatalog {
        MediaCatalog::new(self.media_dir())
    }

    /// Create the directory tree and all-blank schedule files. Existing
    /// schedules are left alone. Returns whether anything was created.
    pub fn create_default_tree(&self) -> Result<bool> {
        let mut created = false;
        for sub in SUBDIRS {
            let dir = self.root.join(sub);
            if !dir.is_dir() {
                fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
                created = true;
            }
        }
        let text = default_schedule_text();
        for day in DAY_FILES {
            let path = self.schedule_file(day);
            if !path.exists() {
                write_atomic(&path, &text)?;
                created = true;
            }
        }
        if created {
            info!(root = %self.root.display(), "created channel directory");
        }
        Ok(created)
    }

    /// Check everything a run needs before scheduling starts. Every missing
    /// item is logged, then all of them are reported in one error.
    pub fn preflight(
        &self,
        settings: &ChannelSettings,
        series: &[String],
        check_support: bool,
    ) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();

        for sub in SUBDIRS {
            let dir = self.root.join(sub);
            if !dir.is_dir() {
                missing.push(dir.display().to_string());
            }
        }
        for day in DAY_FILES {
            let path = self.schedule_file(day);
            if !path.is_file() {
                missing.push(path.display().to_string());
            }
        }

        let catalog = self.catalog();
        if self.media_dir().is_dir() && catalog.names().is_empty() {
            missing.push(format!(
                "{}/*.{}",
                self.media_dir().display(),
                LIST_EXTENSION
            ));
        }
        let mut lists: Vec<&str> = vec![settings.commercials.as_str()];
        lists.extend(series.iter().map(String::as_str));
        for name in lists {
            let path = catalog.list_path(name);
            if !path.is_file() && !missing.contains(&path.display().to_string()) {
                missing.push(path.display().to_string());
            }
        }

        if check_support {
            for kind in SupportKind::ALL {
                let path = self.root.join(&settings.video(kind).file);
                if !path.is_file() {
                    missing.push(path.display().to_string());
                }
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        for item in &missing {
            warn!(item = %item, "missing");
        }
        Err(Error::ConfigurationMissing(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_channel(dir: &Path) -> ChannelPaths {
        let paths = ChannelPaths::new(dir.join("channel"));
        paths.create_default_tree().unwrap();
        fs::write(paths.catalog().list_path("Commercials"), "ad.mp4 : 30000\n").unwrap();
        fs::write(paths.catalog().list_path("News"), "ep1.mp4 : 600000\n").unwrap();
        paths
    }

    #[test]
    fn default_tree_has_dirs_and_schedules() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ChannelPaths::new(dir.path().join("channel"));
        assert!(paths.create_default_tree().unwrap());
        for sub in SUBDIRS {
            assert!(paths.root().join(sub).is_dir());
        }
        for day in DAY_FILES {
            assert!(paths.schedule_file(day).is_file());
        }
        // second run creates nothing
        assert!(!paths.create_default_tree().unwrap());
    }

    #[test]
    fn default_tree_keeps_existing_schedules() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ChannelPaths::new(dir.path());
        fs::create_dir_all(paths.sched_dir()).unwrap();
        fs::write(paths.schedule_file("mon"), "[0000]\nseries = News\nseq = linear\n").unwrap();
        paths.create_default_tree().unwrap();
        let text = fs::read_to_string(paths.schedule_file("mon")).unwrap();
        assert!(text.contains("News"));
    }

    #[test]
    fn fresh_tree_fails_preflight_for_lists() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ChannelPaths::new(dir.path());
        paths.create_default_tree().unwrap();
        let err = paths
            .preflight(&ChannelSettings::default(), &[], false)
            .unwrap_err();
        match err {
            Error::ConfigurationMissing(items) => {
                assert!(items.iter().any(|i| i.ends_with("*.lst")));
                assert!(items.iter().any(|i| i.ends_with("Commercials.lst")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn preflight_reports_missing_series_lists() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ready_channel(dir.path());
        let settings = ChannelSettings::default();
        assert!(paths.preflight(&settings, &["News".to_string()], false).is_ok());

        let err = paths
            .preflight(&settings, &["News".to_string(), "Movies".to_string()], false)
            .unwrap_err();
        match err {
            Error::ConfigurationMissing(items) => {
                assert_eq!(items.len(), 1);
                assert!(items[0].ends_with("Movies.lst"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn preflight_checks_support_videos_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ready_channel(dir.path());
        let settings = ChannelSettings::default();
        let err = paths.preflight(&settings, &[], true).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(ref items) if items.len() == 5));

        for kind in SupportKind::ALL {
            fs::write(paths.root().join(&settings.video(kind).file), b"").unwrap();
        }
        assert!(paths.preflight(&settings, &[], true).is_ok());
    }

    #[test]
    fn layout_paths() {
        let paths = ChannelPaths::new("/srv/tv");
        assert_eq!(paths.settings_file(), PathBuf::from("/srv/tv/config/settings.ini"));
        assert_eq!(paths.used_file(), PathBuf::from("/srv/tv/config/used.lst"));
        assert_eq!(paths.schedule_file("sat"), PathBuf::from("/srv/tv/sched/sat.ini"));
        assert_eq!(paths.log_file(), PathBuf::from("/srv/tv/log/slotcast.log"));
    }
}
