use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::command::{ToolChoice, TrackSelection};
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "tgrab",
    about = "Transcript Grabber - Recover meeting transcripts and video download commands from SharePoint/Stream traffic",
    version,
    long_about = "Recovers the temporary transcript URL and the DASH video manifest URL from a SharePoint/Stream media page's traffic (captured as HAR), converts transcripts to JSON, WebVTT or speaker-grouped text, and builds ffmpeg/yt-dlp commands for the video."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a transcript JSON document already on disk
    Convert {
        /// Transcript JSON as served with format=json
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        output: TranscriptOutputArgs,
    },

    /// Fetch a transcript from its temporary download URL and convert it
    Fetch {
        /// Temporary download URL of the transcript
        #[arg(value_name = "TEMP_URL")]
        url: String,

        #[command(flatten)]
        output: TranscriptOutputArgs,
    },

    /// Replay captured page traffic and report the recovered URLs
    Scan {
        /// HAR export of the media page's network traffic
        #[arg(value_name = "HAR_FILE")]
        capture: PathBuf,

        /// JSON dump of the page's g_fileInfo object, used when no manifest request was captured
        #[arg(long, value_name = "FILE")]
        page_state: Option<PathBuf>,

        /// Also download the detected transcript
        #[arg(long)]
        download: bool,

        #[command(flatten)]
        output: TranscriptOutputArgs,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Build the ffmpeg/yt-dlp command for a video manifest URL
    Command {
        /// Video manifest URL
        #[arg(value_name = "MANIFEST_URL")]
        url: String,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct TranscriptOutputArgs {
    /// Output format (defaults to the configured format)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Base filename; suffix and extension are added per format
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Directory to write the transcript to (defaults to the configured directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the transcript instead of writing a file
    #[arg(long)]
    pub stdout: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct VideoArgs {
    /// Streams to keep (defaults to the configured track)
    #[arg(short, long, value_enum)]
    pub track: Option<TrackSelection>,

    /// Download tool (defaults to the configured tool)
    #[arg(long, value_enum)]
    pub tool: Option<ToolChoice>,

    /// Output filename without extension
    #[arg(long, value_name = "NAME", default_value = "video")]
    pub video_name: String,
}
