use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::transcript::FetchedTranscript;

pub mod formatters;

pub use formatters::*;

/// Transcript output formats offered to the user
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Raw JSON exactly as served, with full metadata
    Json,
    /// WebVTT subtitle track with speaker voice tags
    Vtt,
    /// Plain text, consecutive lines of a speaker merged into one paragraph
    #[value(name = "grouped", alias = "vtt-grouped")]
    #[serde(alias = "vtt-grouped")]
    Grouped,
}

impl OutputFormat {
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputFormat::Json | OutputFormat::Vtt => "_transcript",
            OutputFormat::Grouped => "_transcript_grouped",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => ".json",
            OutputFormat::Vtt => ".vtt",
            OutputFormat::Grouped => ".txt",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Vtt => write!(f, "vtt"),
            OutputFormat::Grouped => write!(f, "grouped"),
        }
    }
}

/// Bytes handed to whatever saves or displays the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: String,
    pub mime_type: &'static str,
    pub filename: String,
}

/// MIME type for an artifact filename, keyed by its extension
pub fn mime_type_for(filename: &str) -> &'static str {
    match filename.rfind('.').map(|dot| &filename[dot..]) {
        Some(".json") => "application/json",
        Some(".vtt") => "text/vtt",
        _ => "text/plain",
    }
}

/// Sanitize a user-chosen transcript name: anything but ASCII letters,
/// digits and whitespace becomes `_`, then the result is lowercased.
pub fn sanitize_transcript_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

/// Render a fetched transcript in the chosen format
pub fn render_artifact(transcript: &FetchedTranscript, format: OutputFormat, name: &str) -> Artifact {
    let bytes = match format {
        OutputFormat::Json => transcript.raw.clone(),
        OutputFormat::Vtt => format_as_vtt(&transcript.document),
        OutputFormat::Grouped => format_as_grouped(&transcript.document),
    };

    let filename = format!(
        "{}{}{}",
        sanitize_transcript_name(name),
        format.suffix(),
        format.extension()
    );

    Artifact {
        mime_type: mime_type_for(&filename),
        bytes,
        filename,
    }
}

/// Save an artifact into `dir` under its own filename
pub async fn save_to_dir(artifact: &Artifact, dir: &Path) -> Result<PathBuf> {
    fs_err::create_dir_all(dir)?;
    let path = dir.join(&artifact.filename);

    fs_err::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", artifact.filename))?;

    tracing::debug!("Wrote {} ({}, {} bytes)", path.display(), artifact.mime_type, artifact.bytes.len());
    Ok(path)
}

/// Write an artifact to stdout exactly as rendered, with no trailing newline added
pub fn print_to_console(artifact: &Artifact) -> Result<()> {
    write_artifact(artifact, &mut std::io::stdout().lock())
}

pub fn write_artifact(artifact: &Artifact, out: &mut impl std::io::Write) -> Result<()> {
    out.write_all(artifact.bytes.as_bytes())?;
    out.flush()?;
    Ok(())
}
