//! Playlist files for the player (M3U8, PLS, XSPF) and a JSON summary of the
//! built day.

use crate::engine::DaySummary;
use crate::error::{Error, Result};
use crate::ini::write_atomic;
use crate::playlist::MasterPlaylist;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistFormat {
    M3u8,
    Pls,
    Xspf,
}

impl PlaylistFormat {
    pub fn from_str_loose(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m3u8" | "m3u" => Ok(PlaylistFormat::M3u8),
            "pls" => Ok(PlaylistFormat::Pls),
            "xspf" => Ok(PlaylistFormat::Xspf),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            PlaylistFormat::M3u8 => "m3u8",
            PlaylistFormat::Pls => "pls",
            PlaylistFormat::Xspf => "xspf",
        }
    }
}

impl fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

pub fn render(playlist: &MasterPlaylist, format: PlaylistFormat) -> String {
    match format {
        PlaylistFormat::M3u8 => render_m3u8(playlist),
        PlaylistFormat::Pls => render_pls(playlist),
        PlaylistFormat::Xspf => render_xspf(playlist),
    }
}

fn render_m3u8(playlist: &MasterPlaylist) -> String {
    let mut lines = vec!["#EXTM3U".to_string()];
    for entry in playlist.entries() {
        let media = entry.media();
        lines.push(format!("#EXTINF:{}, {}", entry.duration_ms / 1000, media.stem()));
        lines.push(entry.path.clone());
    }
    lines.join("\n") + "\n"
}

fn render_pls(playlist: &MasterPlaylist) -> String {
    let mut lines = vec!["[playlist]".to_string()];
    for (i, entry) in playlist.entries().iter().enumerate() {
        let n = i + 1;
        lines.push(format!("File{}={}", n, entry.path));
        lines.push(format!("Title{}={}", n, entry.media().stem()));
        lines.push(format!("Length{}={}", n, entry.duration_ms / 1000));
    }
    lines.push(format!("NumberOfEntries={}", playlist.len()));
    lines.push("Version=2".to_string());
    lines.join("\n") + "\n"
}

const VLC_EXTENSION: &str = "http://www.videolan.org/vlc/playlist/0";

fn render_xspf(playlist: &MasterPlaylist) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<playlist xmlns=\"http://xspf.org/ns/0/\" \
         xmlns:vlc=\"http://www.videolan.org/vlc/playlist/ns/0/\" version=\"1\">\n",
    );
    xml.push_str("\t<title>Playlist</title>\n");
    xml.push_str("\t<trackList>\n");
    for (i, entry) in playlist.entries().iter().enumerate() {
        xml.push_str("\t\t<track>\n");
        xml.push_str(&format!("\t\t\t<location>{}</location>\n", xml_escape(&location(&entry.path))));
        xml.push_str(&format!("\t\t\t<title>{}</title>\n", xml_escape(&entry.media().stem())));
        xml.push_str(&format!("\t\t\t<duration>{}</duration>\n", entry.duration_ms));
        xml.push_str(&format!("\t\t\t<extension application=\"{}\">\n", VLC_EXTENSION));
        xml.push_str(&format!("\t\t\t\t<vlc:id>{}</vlc:id>\n", i));
        xml.push_str("\t\t\t</extension>\n");
        xml.push_str("\t\t</track>\n");
    }
    xml.push_str("\t</trackList>\n");
    xml.push_str(&format!("\t<extension application=\"{}\">\n", VLC_EXTENSION));
    for i in 0..playlist.len() {
        xml.push_str(&format!("\t\t<vlc:item tid=\"{}\"/>\n", i));
    }
    xml.push_str("\t</extension>\n");
    xml.push_str("</playlist>\n");
    xml
}

/// `file://` URL for absolute paths; anything else (relative paths, URLs
/// already) is passed through.
fn location(path: &str) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => path.to_string(),
    }
}

/// Escape XML special characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn write_playlist(path: &Path, playlist: &MasterPlaylist, format: PlaylistFormat) -> Result<()> {
    tracing::info!(path = %path.display(), %format, entries = playlist.len(), "writing playlist");
    write_atomic(path, &render(playlist, format))
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    summary: &'a DaySummary,
    playlist: &'a MasterPlaylist,
}

/// Pretty JSON of the day summary with the full playlist.
pub fn render_summary(summary: &DaySummary, playlist: &MasterPlaylist) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SummaryDocument { summary, playlist })?)
}

pub fn write_summary(path: &Path, summary: &DaySummary, playlist: &MasterPlaylist) -> Result<()> {
    let json = render_summary(summary, playlist)?;
    tracing::info!(path = %path.display(), "writing day summary");
    write_atomic(path, &(json + "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaEntry;
    use crate::playlist::EntryKind;

    fn sample() -> MasterPlaylist {
        let mut pl = MasterPlaylist::new();
        pl.append(&MediaEntry::new("/srv/tv/bumper.mp4", 5_000), EntryKind::Bumper);
        pl.append(
            &MediaEntry::new("/tv/Tom & Jerry/S01E01.mkv", 1_320_500),
            EntryKind::Program("Cartoons".into()),
        );
        pl
    }

    #[test]
    fn format_from_str() {
        assert_eq!(PlaylistFormat::from_str_loose("M3U8").unwrap(), PlaylistFormat::M3u8);
        assert_eq!(PlaylistFormat::from_str_loose("pls").unwrap(), PlaylistFormat::Pls);
        assert_eq!(PlaylistFormat::from_str_loose(" xspf ").unwrap(), PlaylistFormat::Xspf);
        assert!(matches!(
            PlaylistFormat::from_str_loose("asx"),
            Err(Error::UnknownFormat(_))
        ));
        assert_eq!(PlaylistFormat::Xspf.to_string(), "xspf");
    }

    #[test]
    fn m3u8_has_extinf_with_seconds_and_stem() {
        let text = render(&sample(), PlaylistFormat::M3u8);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXTINF:5, bumper");
        assert_eq!(lines[2], "/srv/tv/bumper.mp4");
        assert_eq!(lines[3], "#EXTINF:1320, S01E01");
        assert_eq!(lines[4], "/tv/Tom & Jerry/S01E01.mkv");
    }

    #[test]
    fn pls_numbers_entries_from_one() {
        let text = render(&sample(), PlaylistFormat::Pls);
        assert!(text.starts_with("[playlist]\n"));
        assert!(text.contains("File1=/srv/tv/bumper.mp4\n"));
        assert!(text.contains("Title2=S01E01\n"));
        assert!(text.contains("Length2=1320\n"));
        assert!(text.contains("NumberOfEntries=2\n"));
        assert!(text.ends_with("Version=2\n"));
    }

    #[test]
    fn xspf_uses_file_urls_and_vlc_ids() {
        let text = render(&sample(), PlaylistFormat::Xspf);
        assert!(text.contains("<location>file:///srv/tv/bumper.mp4</location>"));
        assert!(text.contains("<location>file:///tv/Tom%20&amp;%20Jerry/S01E01.mkv</location>"));
        assert!(text.contains("<duration>1320500</duration>"));
        assert!(text.contains("<vlc:id>1</vlc:id>"));
        assert!(text.contains("<vlc:item tid=\"1\"/>"));
        assert!(!text.contains("tid=\"2\""));
    }

    #[test]
    fn relative_paths_pass_through() {
        assert_eq!(location("media/a.mp4"), "media/a.mp4");
        assert_eq!(xml_escape("a<b>&'\""), "a&lt;b&gt;&amp;&apos;&quot;");
    }

    #[test]
    fn write_playlist_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("today.m3u8");
        write_playlist(&path, &sample(), PlaylistFormat::M3u8).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#EXTM3U\n"));
    }
}
