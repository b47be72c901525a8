//! Download command synthesis for a captured video manifest
//!
//! The host page blocks direct video downloads, so the manifest URL is handed to an
//! external tool instead. Every (track, tool) pair maps to a fixed flag string and
//! output extension; nothing here touches the network.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which streams the external tool should keep
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackSelection {
    /// Video and audio, stream-copied into an MP4
    VideoAudio,
    /// Audio only, stream-copied into M4A
    AudioM4a,
    /// Audio only, encoded as MP3
    AudioMp3,
    /// Audio only, encoded as WAV
    AudioWav,
    /// Video only, no audio
    VideoOnly,
}

/// External download tool
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolChoice {
    /// ffmpeg, single connection
    Ffmpeg,
    /// yt-dlp, 16 parallel fragment downloads
    #[value(name = "yt-dlp")]
    #[serde(rename = "yt-dlp")]
    YtDlp,
}

/// Flags and output extension for one table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFlags {
    pub flags: &'static str,
    pub extension: &'static str,
}

impl TrackSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSelection::VideoAudio => "video-audio",
            TrackSelection::AudioM4a => "audio-m4a",
            TrackSelection::AudioMp3 => "audio-mp3",
            TrackSelection::AudioWav => "audio-wav",
            TrackSelection::VideoOnly => "video-only",
        }
    }
}

impl FromStr for TrackSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video-audio" => Ok(TrackSelection::VideoAudio),
            "audio-m4a" => Ok(TrackSelection::AudioM4a),
            "audio-mp3" => Ok(TrackSelection::AudioMp3),
            "audio-wav" => Ok(TrackSelection::AudioWav),
            "video-only" => Ok(TrackSelection::VideoOnly),
            other => Err(format!("unknown track selection: {}", other)),
        }
    }
}

impl ToolChoice {
    pub fn binary(&self) -> &'static str {
        match self {
            ToolChoice::Ffmpeg => "ffmpeg",
            ToolChoice::YtDlp => "yt-dlp",
        }
    }

    /// Resolve a tool name; anything unrecognised falls back to ffmpeg
    pub fn from_name(name: &str) -> Self {
        match name {
            "yt-dlp" => ToolChoice::YtDlp,
            _ => ToolChoice::Ffmpeg,
        }
    }
}

impl std::fmt::Display for TrackSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

/// Look up the flags for a track under a tool.
///
/// Returns `None` for a combination the tool cannot produce; every cell is
/// currently filled.
pub fn track_flags(track: TrackSelection, tool: ToolChoice) -> Option<TrackFlags> {
    use ToolChoice::*;
    use TrackSelection::*;

    let (flags, extension) = match (tool, track) {
        (Ffmpeg, VideoAudio) => ("-map 0:v:0 -map 0:a:0 -c copy", ".mp4"),
        (Ffmpeg, AudioM4a) => ("-map 0:a:0 -vn -c:a copy", ".m4a"),
        (Ffmpeg, AudioMp3) => ("-map 0:a:0 -vn", ".mp3"),
        (Ffmpeg, AudioWav) => ("-map 0:a:0 -vn", ".wav"),
        (Ffmpeg, VideoOnly) => ("-map 0:v:0 -an -c:v copy", ".mp4"),
        (YtDlp, VideoAudio) => ("-N 16", ".mp4"),
        (YtDlp, AudioM4a) => ("-N 16 -x --audio-format m4a", ".m4a"),
        (YtDlp, AudioMp3) => ("-N 16 -x --audio-format mp3", ".mp3"),
        (YtDlp, AudioWav) => ("-N 16 -x --audio-format wav", ".wav"),
        (YtDlp, VideoOnly) => ("-N 16 --no-audio", ".mp4"),
    };

    Some(TrackFlags { flags, extension })
}

/// Sanitize a filename for the command line: anything but ASCII letters,
/// digits, `_`, `-` and whitespace becomes `_`. Case is preserved.
pub fn sanitize_command_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the shell command for downloading `manifest_url` with `tool`.
///
/// The URL and filename are embedded in double quotes without escaping.
/// An empty string means the selection is not supported.
pub fn build_command(manifest_url: &str, filename: &str, track: TrackSelection, tool: ToolChoice) -> String {
    let Some(TrackFlags { flags, extension }) = track_flags(track, tool) else {
        return String::new();
    };
    let safe_filename = sanitize_command_filename(filename);

    match tool {
        ToolChoice::Ffmpeg => format!(
            "ffmpeg -i \"{}\" {} \"{}{}\"",
            manifest_url, flags, safe_filename, extension
        ),
        ToolChoice::YtDlp => format!(
            "yt-dlp {} -o \"{}{}\" \"{}\"",
            flags, safe_filename, extension, manifest_url
        ),
    }
}

/// String-keyed entry point: an unknown track yields an empty command,
/// an unknown tool falls back to ffmpeg.
pub fn build_command_by_name(manifest_url: &str, filename: &str, track: &str, tool: &str) -> String {
    match track.parse::<TrackSelection>() {
        Ok(track) => build_command(manifest_url, filename, track, ToolChoice::from_name(tool)),
        Err(e) => {
            tracing::debug!("No command for selection: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://eu-prod.asyncgw.teams.microsoft.com/v1/videomanifest?provider=spo&part=index&format=dash";

    #[test]
    fn test_ffmpeg_video_audio() {
        let cmd = build_command_by_name(URL, "My Video!", "video-audio", "ffmpeg");
        assert_eq!(
            cmd,
            format!("ffmpeg -i \"{}\" -map 0:v:0 -map 0:a:0 -c copy \"My Video_.mp4\"", URL)
        );
    }

    #[test]
    fn test_yt_dlp_mp3() {
        let cmd = build_command_by_name(URL, "x", "audio-mp3", "yt-dlp");
        assert!(cmd.starts_with("yt-dlp -N 16 -x --audio-format mp3 -o \"x.mp3\""));
        assert!(cmd.ends_with(&format!("\"{}\"", URL)));
    }

    #[test]
    fn test_unknown_track_is_empty() {
        assert_eq!(build_command_by_name(URL, "x", "nonexistent-track", "ffmpeg"), "");
        assert_eq!(build_command_by_name(URL, "x", "nonexistent-track", "yt-dlp"), "");
    }

    #[test]
    fn test_unknown_tool_falls_back_to_ffmpeg() {
        let cmd = build_command_by_name(URL, "x", "video-only", "wget");
        assert_eq!(cmd, format!("ffmpeg -i \"{}\" -map 0:v:0 -an -c:v copy \"x.mp4\"", URL));
    }

    #[test]
    fn test_every_cell_is_filled() {
        for tool in ToolChoice::value_variants() {
            for track in TrackSelection::value_variants() {
                let cmd = build_command(URL, "f", *track, *tool);
                assert!(cmd.starts_with(tool.binary()), "{track} / {tool}");
                assert!(cmd.contains(URL));
            }
        }
    }

    #[test]
    fn test_sanitize_command_filename() {
        assert_eq!(sanitize_command_filename("Q3 All-Hands_v2.final"), "Q3 All-Hands_v2_final");
        assert_eq!(sanitize_command_filename("a\"b"), "a_b");
        assert_eq!(sanitize_command_filename("My Video!"), "My Video_");
        assert_eq!(sanitize_command_filename("tab\there"), "tab\there");
    }

    #[test]
    fn test_track_round_trips_through_name() {
        for track in TrackSelection::value_variants() {
            assert_eq!(track.as_str().parse::<TrackSelection>().unwrap(), *track);
        }
    }
}
