use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Timelike};
use clap::{Parser, Subcommand};
use slotcast::config::ChannelSettings;
use slotcast::engine::{series_states, Engine};
use slotcast::export::{write_playlist, write_summary, PlaylistFormat};
use slotcast::history::{PlayedDir, PlayedHistory};
use slotcast::paths::{default_root, ChannelPaths};
use slotcast::player::{self, LaunchOptions, PlayerKind};
use slotcast::playlist::format_timestamp;
use slotcast::schedule::{day_file, DaySchedule};
use slotcast::store::{IniFileStore, SettingsStore};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "slotcast", about = "Day-long video channel scheduler", version)]
struct Cli {
    /// Channel directory (default: ~/.slotcast)
    #[arg(long, global = true, env = "SLOTCAST_HOME")]
    home: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the channel directory with blank schedules and default settings
    Init,
    /// Build today's playlist, save history and start a player
    Build {
        /// Playlist format: m3u8, pls, xspf
        #[arg(short, long, default_value = "m3u8")]
        format: String,
        /// Playlist file to write (default: <home>/slotcast.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Build for this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Seed for reproducible episode and commercial picks
        #[arg(long)]
        seed: Option<u64>,
        /// Also write a JSON summary of the day
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Player to start afterwards: mpv, vlc, none
        #[arg(short, long, default_value = "none")]
        player: String,
        /// Stream over RTP multicast instead of playing locally (vlc)
        #[arg(long)]
        stream: bool,
        /// Do not require the bumper/fill/news/weather videos to exist
        #[arg(long)]
        skip_support_check: bool,
        /// Build and write the playlist without saving any history
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the resolved slots of a day's schedule
    Slots {
        /// Day to show (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show tracked series positions and random-play history
    State,
}

fn init_logging(level: &str, log_file: Option<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = log_file
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| eprintln!("Warning: cannot open log file {}: {}", path.display(), e))
                .ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.home {
        Some(home) => home,
        None => default_root().context("unable to locate channel directory")?,
    };
    let paths = ChannelPaths::new(root);

    let log_file = paths
        .root()
        .is_dir()
        .then(|| paths.log_dir())
        .filter(|dir| fs::create_dir_all(dir).is_ok())
        .map(|_| paths.log_file());
    init_logging(&cli.log_level, log_file);

    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init => {
            paths.create_default_tree()?;
            let mut store = IniFileStore::open(&paths.settings_file())?;
            ChannelSettings::load(&mut store);
            store.write()?;
            println!("Channel directory ready: {}", paths.root().display());
            println!(
                "Add list files to {} (at least {}.lst) and edit the schedules in {}",
                paths.media_dir().display(),
                ChannelSettings::default().commercials,
                paths.sched_dir().display()
            );
        }
        Commands::Build {
            format,
            output,
            date,
            seed,
            summary,
            player,
            stream,
            skip_support_check,
            dry_run,
        } => {
            let format = PlaylistFormat::from_str_loose(&format)?;
            let player_kind = PlayerKind::from_str_loose(&player)?;
            let day = date.unwrap_or(today);

            let mut engine = match Engine::open(&paths, day, seed, !skip_support_check) {
                Ok(engine) => engine,
                Err(err) => {
                    error!(%err, fatal = err.is_fatal(), "unable to open channel");
                    return Err(err).context("unable to start scheduling");
                }
            };
            let day_summary = engine.build_day();

            let output = output
                .unwrap_or_else(|| paths.root().join(format!("slotcast.{}", format.extension())));
            write_playlist(&output, engine.playlist(), format)
                .with_context(|| format!("unable to write {}", output.display()))?;
            if let Some(path) = &summary {
                write_summary(path, &day_summary, engine.playlist())?;
            }

            if dry_run {
                info!("dry run, history not saved");
            } else {
                engine.persist().context("unable to save channel state")?;
            }

            println!(
                "{}: {} entries, {} programs, {} commercials, runtime {}, max drift {:.1}s",
                day,
                day_summary.entries,
                day_summary.programs,
                day_summary.commercials,
                format_timestamp(day_summary.total_ms),
                day_summary.max_drift_ms as f64 / 1000.0
            );
            println!("Playlist: {}", output.display());

            if player_kind != PlayerKind::None {
                // join the day at the entry airing right now
                let (start_index, start_offset_ms) = if day == today {
                    let offset_ms = Local::now().num_seconds_from_midnight() as u64 * 1000;
                    match engine.playlist().locate(offset_ms) {
                        Some((index, into_ms)) => {
                            info!(index, into_s = into_ms / 1000, "joining in progress");
                            (index, into_ms)
                        }
                        None => {
                            warn!("playlist ends before now, starting from the top");
                            (0, 0)
                        }
                    }
                } else {
                    (0, 0)
                };
                let opts = LaunchOptions {
                    start_index,
                    stream,
                    start_offset_ms,
                };
                player::launch(player_kind, &output, &opts)?;
            }
        }
        Commands::Slots { date } => {
            let day = date.unwrap_or(today);
            let file = paths.schedule_file(day_file(day));
            let schedule = DaySchedule::load(&file)?;
            println!("{} ({})", day, file.display());
            for slot in schedule.slots() {
                if slot.is_blank() {
                    println!("  {}  -", slot.label);
                } else {
                    println!("  {}  {} [{}]", slot.label, slot.series, slot.mode);
                }
            }
        }
        Commands::State => {
            let store = IniFileStore::open(&paths.settings_file())?;
            let states = series_states(&store);
            if states.is_empty() {
                println!("No tracked series.");
            }
            for state in states {
                let date = state
                    .last_played_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "never".to_string());
                print!(
                    "{}: last index {} on {}",
                    state.series, state.last_played_index, date
                );
                if state.skip_count > 0 {
                    print!(", skip {}", state.skip_count);
                }
                println!();
            }

            let played = PlayedDir::new(paths.played_dir());
            for series in played.series() {
                let record = played.load(&series)?;
                println!("{}: {} episode(s) aired in random order", series, record.len());
            }
        }
    }

    Ok(())
}
