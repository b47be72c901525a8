//! Transcript Grabber - recover meeting transcripts and video manifests from captured traffic
//!
//! This library watches the HTTP exchanges of a SharePoint/Stream media page, picks out the
//! temporary transcript download URL and the DASH video manifest URL, converts the transcript
//! into JSON, WebVTT or speaker-grouped text, and builds ffmpeg/yt-dlp commands for the video.

pub mod cli;
pub mod command;
pub mod config;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod relay;
pub mod timestamp;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands};
pub use command::{build_command, ToolChoice, TrackSelection};
pub use config::Config;
pub use observer::{ObservedResponse, ObserverEvent, ObservingClient, PageMessage};
pub use output::{Artifact, OutputFormat};
pub use pipeline::{DocumentFetcher, Pipeline};
pub use relay::{ExtractionStore, Relay};
pub use transcript::{TranscriptDocument, TranscriptEntry};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types surfaced to the user of a grab action
#[derive(thiserror::Error, Debug)]
pub enum GrabberError {
    #[error("Transcript URL not captured yet. Wait for the page to load the transcript, or capture the traffic again.")]
    TranscriptNotCaptured,

    #[error("Video manifest URL not captured yet. Start playback once, or capture the traffic again.")]
    ManifestNotCaptured,

    #[error("Error downloading transcript: HTTP {status}")]
    FetchFailed { status: u16 },

    #[error("Malformed transcript document: {0}")]
    MalformedDocument(String),

    #[error("Capture file could not be read: {0}")]
    InvalidCapture(String),
}
