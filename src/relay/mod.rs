use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::observer::{ObserverEvent, PageMessage, OBSERVER_ORIGIN};

/// Where the transcript can be downloaded from, as last detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptSource {
    pub temporary_download_url: String,
    pub display_name: Option<String>,
    pub language_tag: Option<String>,
}

/// A detected value and when it was seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detected<T> {
    pub value: T,
    pub detected_at: DateTime<Utc>,
}

impl<T> Detected<T> {
    fn now(value: T) -> Self {
        Self {
            value,
            detected_at: Utc::now(),
        }
    }
}

/// Latest recovered values, one slot each.
///
/// Setting a slot overwrites whatever was there; there is no history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStore {
    transcript: Option<Detected<TranscriptSource>>,
    manifest_url: Option<Detected<String>>,
}

impl ExtractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> Option<&TranscriptSource> {
        self.transcript.as_ref().map(|d| &d.value)
    }

    pub fn set_transcript(&mut self, source: TranscriptSource) {
        self.transcript = Some(Detected::now(source));
    }

    pub fn manifest_url(&self) -> Option<&str> {
        self.manifest_url.as_ref().map(|d| d.value.as_str())
    }

    pub fn set_manifest_url(&mut self, url: impl Into<String>) {
        self.manifest_url = Some(Detected::now(url.into()));
    }

    pub fn transcript_detected_at(&self) -> Option<DateTime<Utc>> {
        self.transcript.as_ref().map(|d| d.detected_at)
    }

    pub fn manifest_detected_at(&self) -> Option<DateTime<Utc>> {
        self.manifest_url.as_ref().map(|d| d.detected_at)
    }

    /// Apply one observer event
    pub fn apply(&mut self, event: ObserverEvent) {
        match event {
            ObserverEvent::TranscriptMetadata {
                temporary_download_url,
                display_name,
                language_tag,
            } => self.set_transcript(TranscriptSource {
                temporary_download_url,
                display_name,
                language_tag,
            }),
            ObserverEvent::VideoManifestUrl { manifest_url } => self.set_manifest_url(manifest_url),
        }
    }
}

/// Sole subscriber of the page channel; keeps the store current
pub struct Relay {
    expected_origin: String,
    store: ExtractionStore,
}

impl Relay {
    pub fn new() -> Self {
        Self::with_origin(OBSERVER_ORIGIN)
    }

    pub fn with_origin(origin: &str) -> Self {
        Self {
            expected_origin: origin.to_string(),
            store: ExtractionStore::new(),
        }
    }

    pub fn store(&self) -> &ExtractionStore {
        &self.store
    }

    /// Decode and apply one page message.
    ///
    /// Messages from other origins or with an unknown `kind` are ignored;
    /// returns whether the store changed.
    pub fn handle(&mut self, message: PageMessage) -> bool {
        if message.origin != self.expected_origin {
            tracing::debug!("Ignoring page message from {}", message.origin);
            return false;
        }

        match serde_json::from_value::<ObserverEvent>(message.data) {
            Ok(event) => {
                tracing::debug!("Relaying {:?}", event);
                self.store.apply(event);
                true
            }
            Err(e) => {
                tracing::debug!("Ignoring unrecognised page message: {}", e);
                false
            }
        }
    }

    /// Drain the channel until every sender is gone, then hand back the store
    pub async fn run(mut self, mut rx: broadcast::Receiver<PageMessage>) -> ExtractionStore {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    self.handle(message);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Relay lagged behind, {} page messages dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.store
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::EventEmitter;
    use serde_json::json;

    fn message(origin: &str, data: serde_json::Value) -> PageMessage {
        PageMessage {
            origin: origin.to_string(),
            data,
        }
    }

    #[test]
    fn test_handle_known_events() {
        let mut relay = Relay::new();

        assert!(relay.handle(message(
            OBSERVER_ORIGIN,
            json!({"kind": "transcript-metadata", "temporaryDownloadUrl": "https://t/1", "displayName": "T", "languageTag": "en-US"})
        )));
        assert!(relay.handle(message(
            OBSERVER_ORIGIN,
            json!({"kind": "video-manifest-url", "manifestUrl": "https://m/1"})
        )));

        let store = relay.store();
        assert_eq!(store.transcript().unwrap().temporary_download_url, "https://t/1");
        assert_eq!(store.transcript().unwrap().language_tag.as_deref(), Some("en-US"));
        assert_eq!(store.manifest_url(), Some("https://m/1"));
        assert!(store.manifest_detected_at().is_some());
    }

    #[test]
    fn test_ignores_foreign_origin_and_unknown_kind() {
        let mut relay = Relay::new();

        assert!(!relay.handle(message(
            "some-other-script",
            json!({"kind": "video-manifest-url", "manifestUrl": "https://evil/1"})
        )));
        assert!(!relay.handle(message(OBSERVER_ORIGIN, json!({"kind": "TRANSCRIPT_CONTENT", "url": "x"}))));
        assert!(!relay.handle(message(OBSERVER_ORIGIN, json!({"kind": "video-manifest-url"}))));
        assert!(!relay.handle(message(OBSERVER_ORIGIN, json!("hello"))));

        assert!(relay.store().manifest_url().is_none());
        assert!(relay.store().transcript().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = ExtractionStore::new();
        store.set_manifest_url("https://m/1");
        store.set_manifest_url("https://m/2");
        assert_eq!(store.manifest_url(), Some("https://m/2"));
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let (tx, rx) = broadcast::channel(16);
        let relay = tokio::spawn(Relay::new().run(rx));

        let emitter = EventEmitter::new(tx.clone());
        emitter.emit(&ObserverEvent::VideoManifestUrl {
            manifest_url: "https://m/1".to_string(),
        });
        emitter.emit(&ObserverEvent::VideoManifestUrl {
            manifest_url: "https://m/2".to_string(),
        });
        drop(emitter);
        drop(tx);

        let store = tokio_test::assert_ok!(relay.await);
        assert_eq!(store.manifest_url(), Some("https://m/2"));
    }
}
