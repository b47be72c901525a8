use anyhow::Context;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::command::{build_command, ToolChoice, TrackSelection};
use crate::observer::ObservingClient;
use crate::output::{render_artifact, Artifact, OutputFormat};
use crate::relay::ExtractionStore;
use crate::transcript::FetchedTranscript;
use crate::{GrabberError, Result};

/// Retrieves the structured transcript document behind a temporary URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url` and return the body; a non-success status is an error
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl DocumentFetcher for ObservingClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .get(url)
            .await
            .with_context(|| format!("Failed to fetch transcript from {}", url))?;

        if !response.is_success() {
            return Err(GrabberError::FetchFailed {
                status: response.status.as_u16(),
            }
            .into());
        }

        Ok(response.text()?)
    }
}

/// Ask for the structured (non-VTT) representation of a transcript
pub fn document_url(temporary_url: &str) -> String {
    let separator = if temporary_url.contains('?') { '&' } else { '?' };
    format!("{}{}format=json", temporary_url, separator)
}

/// User-triggered actions over the recovered URLs
pub struct Pipeline<F> {
    fetcher: F,
    show_progress: bool,
}

impl<F: DocumentFetcher> Pipeline<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch and parse the transcript document behind a temporary URL
    pub async fn fetch_transcript(&self, temporary_url: &str) -> Result<FetchedTranscript> {
        let url = document_url(temporary_url);
        tracing::debug!("Fetching JSON from: {}", url);

        let progress = self.spinner("Fetching transcript...");
        let fetched = self.fetcher.fetch_text(&url).await;
        match &fetched {
            Ok(_) => progress.finish_with_message("Transcript fetched"),
            Err(_) => progress.finish_with_message("Transcript fetch failed"),
        }

        let transcript = FetchedTranscript::parse(fetched?)?;
        tracing::info!("Transcript fetched: {} entries", transcript.document.entries.len());
        Ok(transcript)
    }

    /// Download the latest detected transcript in `format`.
    ///
    /// Fails without side effects when nothing was detected yet or the fetch fails.
    pub async fn download_transcript(
        &self,
        store: &ExtractionStore,
        format: OutputFormat,
        name: &str,
    ) -> Result<Artifact> {
        let source = store.transcript().ok_or(GrabberError::TranscriptNotCaptured)?;
        let transcript = self.fetch_transcript(&source.temporary_download_url).await?;
        Ok(render_artifact(&transcript, format, name))
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            progress.set_style(style);
        }
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    }
}

/// Build the download command for the latest detected manifest
pub fn video_command(
    store: &ExtractionStore,
    name: &str,
    track: TrackSelection,
    tool: ToolChoice,
) -> Result<String> {
    let manifest_url = store.manifest_url().ok_or(GrabberError::ManifestNotCaptured)?;
    Ok(build_command(manifest_url, name, track, tool))
}
