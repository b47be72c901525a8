use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::command::{ToolChoice, TrackSelection};
use crate::output::OutputFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript download settings
    pub transcript: TranscriptConfig,

    /// Video command settings
    pub video: VideoConfig,

    /// Network settings
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Format used when none is given on the command line
    pub default_format: OutputFormat,

    /// Directory transcripts are written to
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Track selection used when none is given
    pub default_track: TrackSelection,

    /// External download tool used when none is given
    pub default_tool: ToolChoice,

    /// Wait after page load before the last manifest lookup, in milliseconds
    pub lookup_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// User agent sent with transcript fetches
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcript: TranscriptConfig {
                default_format: OutputFormat::Vtt,
                output_dir: None,
            },
            video: VideoConfig {
                default_track: TrackSelection::VideoAudio,
                default_tool: ToolChoice::Ffmpeg,
                lookup_delay_ms: 1000,
            },
            network: NetworkConfig {
                user_agent: format!("transcript-grabber/{}", env!("CARGO_PKG_VERSION")),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-grabber").join("config.yaml"))
    }

    fn validate(&self) -> Result<()> {
        if self.network.user_agent.trim().is_empty() {
            anyhow::bail!("network.user_agent must not be empty");
        }
        if self.video.lookup_delay_ms > 60_000 {
            anyhow::bail!("video.lookup_delay_ms must be at most 60000");
        }
        Ok(())
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.video.lookup_delay_ms)
    }

    /// Directory for written transcripts, defaulting to the working directory
    pub fn output_dir(&self) -> PathBuf {
        self.transcript
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Default Format: {}", self.transcript.default_format);
        println!("  Output Directory: {}", self.output_dir().display());
        println!("  Default Track: {}", self.video.default_track);
        println!("  Default Tool: {}", self.video.default_tool);
        println!("  Lookup Delay: {}ms", self.video.lookup_delay_ms);
        println!("  User Agent: {}", self.network.user_agent);
        if let Ok(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
    }
}
