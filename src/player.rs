use crate::error::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Multicast RTP chain used by `vlc --stream`.
pub const VLC_STREAM_CHAIN: &str = "#transcode{vcodec=mp4v,acodec=mpga,vb=800,ab=128,deinterlace}\
                                    :rtp{mux=ts,dst=239.255.0.0,sdp=sap,name=slotcast}";

/// External media player that plays the finished playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Mpv,
    Vlc,
    None,
}

impl PlayerKind {
    pub fn from_str_loose(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mpv" => Ok(PlayerKind::Mpv),
            "vlc" | "cvlc" => Ok(PlayerKind::Vlc),
            "none" | "" => Ok(PlayerKind::None),
            _ => Err(Error::UnknownPlayer(s.to_string())),
        }
    }

    /// Executable names to look for, preferred first. `cvlc` is VLC
    /// without its interface.
    pub fn binaries(&self) -> &'static [&'static str] {
        match self {
            PlayerKind::Mpv => &["mpv"],
            PlayerKind::Vlc => &["cvlc", "vlc"],
            PlayerKind::None => &[],
        }
    }
}

impl fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerKind::Mpv => write!(f, "mpv"),
            PlayerKind::Vlc => write!(f, "vlc"),
            PlayerKind::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Playlist entry to start with (the one airing now).
    pub start_index: usize,
    /// Stream over RTP multicast instead of playing fullscreen (VLC only).
    pub stream: bool,
    /// Position inside the first entry to resume from, ms.
    pub start_offset_ms: u64,
}

/// Build the player command line. `None` for `PlayerKind::None`.
pub fn command(kind: PlayerKind, program: &Path, playlist: &Path, opts: &LaunchOptions) -> Option<Command> {
    let mut cmd = Command::new(program);
    match kind {
        PlayerKind::None => return None,
        PlayerKind::Mpv => {
            if opts.stream {
                tracing::warn!("mpv cannot stream, playing locally");
            }
            cmd.arg("--fullscreen")
                .arg("--ontop")
                .arg("--no-sub-auto")
                .arg("--no-sub-visibility")
                .arg(format!("--playlist-start={}", opts.start_index));
            // --start applies to every file unless reset after the first.
            if opts.start_offset_ms > 0 {
                cmd.arg(format!("--start=+{}", opts.start_offset_ms / 1000))
                    .arg("--reset-on-next-file=start");
            }
            cmd.arg(format!("--playlist={}", playlist.display()));
        }
        PlayerKind::Vlc => {
            if opts.start_index > 0 {
                tracing::info!(index = opts.start_index, "vlc always starts at the top of the playlist");
            }
            if opts.start_offset_ms > 0 {
                tracing::debug!(offset_ms = opts.start_offset_ms, "vlc start offset ignored");
            }
            if !opts.stream {
                cmd.arg("--fullscreen").arg("--no-video-title-show");
            }
            cmd.arg("--play-and-exit")
                .arg("--verbose")
                .arg("0")
                .arg("--quiet-synchro")
                .arg(playlist);
            if opts.stream {
                cmd.arg("--sout").arg(VLC_STREAM_CHAIN);
            }
        }
    }
    Some(cmd)
}

/// First of `names` found in `PATH`.
pub fn find_in_path(names: &[&str], path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    env::split_paths(&path_var)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Start the player and return without waiting. Returns the child pid, or
/// `None` when no player was requested.
pub fn launch(kind: PlayerKind, playlist: &Path, opts: &LaunchOptions) -> Result<Option<u32>> {
    if kind == PlayerKind::None {
        return Ok(None);
    }
    let program = find_in_path(kind.binaries(), env::var_os("PATH"))
        .ok_or_else(|| Error::PlayerNotFound(kind.to_string()))?;
    let Some(mut cmd) = command(kind, &program, playlist, opts) else {
        return Ok(None);
    };
    tracing::info!(player = %program.display(), playlist = %playlist.display(), "starting player");
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(Error::PlayerLaunch)?;
    Ok(Some(child.id()))
}
