//! Passive observation of page traffic
//!
//! Every exchange passes through untouched; a copy of the response is inspected
//! afterwards on a detached task. Two predicates pick out the transcript metadata
//! listing and the video manifest request, and matches are posted to the
//! page-local broadcast channel as [`PageMessage`]s.

use bytes::Bytes;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tokio::sync::broadcast;

use crate::GrabberError;

pub mod fallback;
pub mod har;

/// Origin stamped on every message this observer posts
pub const OBSERVER_ORIGIN: &str = "transcript-grabber/observer";

/// Manifest URLs are cut right after this marker
pub const MANIFEST_MARKER: &str = "index&format=dash";

const TRANSCRIPT_PATH_MARKERS: [&str; 4] = ["_api/v2.1/drives", "items/", "media", "transcripts"];
const TRANSCRIPT_CONTENT_MARKER: &str = "/content";
const MANIFEST_PATH_MARKER: &str = "videomanifest";

/// Events recovered from observed traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ObserverEvent {
    #[serde(rename_all = "camelCase")]
    TranscriptMetadata {
        temporary_download_url: String,
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        language_tag: Option<String>,
    },

    #[serde(rename = "video-manifest-url", rename_all = "camelCase")]
    VideoManifestUrl { manifest_url: String },
}

/// A message on the page-local channel. Anything on the page may post one,
/// so receivers check `origin` and decode `data` themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMessage {
    pub origin: String,
    pub data: Value,
}

/// Posts observer events to the page channel
#[derive(Debug, Clone)]
pub struct EventEmitter {
    origin: String,
    tx: broadcast::Sender<PageMessage>,
}

impl EventEmitter {
    pub fn new(tx: broadcast::Sender<PageMessage>) -> Self {
        Self::with_origin(tx, OBSERVER_ORIGIN)
    }

    pub fn with_origin(tx: broadcast::Sender<PageMessage>, origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            tx,
        }
    }

    /// Fire and forget; a channel nobody listens to is not an error
    pub fn emit(&self, event: &ObserverEvent) {
        let data = match serde_json::to_value(event) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Could not encode observer event: {}", e);
                return;
            }
        };

        let message = PageMessage {
            origin: self.origin.clone(),
            data,
        };
        if self.tx.send(message).is_err() {
            tracing::debug!("No subscriber for observer event");
        }
    }
}

fn personal_site_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"https://[^/]*-my\.sharepoint\.com/personal/").expect("personal site pattern is valid")
    })
}

/// Predicate A: the media transcripts listing of a personal OneDrive/SharePoint site,
/// but not the raw content endpoint underneath it.
pub fn is_transcript_metadata_url(url: &str) -> bool {
    personal_site_pattern().is_match(url)
        && TRANSCRIPT_PATH_MARKERS.iter().all(|marker| url.contains(marker))
        && !url.contains(TRANSCRIPT_CONTENT_MARKER)
}

/// Predicate B: the video manifest request
pub fn is_video_manifest_url(url: &str) -> bool {
    url.contains(MANIFEST_PATH_MARKER)
}

/// Drop everything after the first `index&format=dash` marker
pub fn truncate_manifest_url(url: &str) -> &str {
    match url.find(MANIFEST_MARKER) {
        Some(start) => &url[..start + MANIFEST_MARKER.len()],
        None => url,
    }
}

#[derive(Debug, Deserialize)]
struct MetadataListing {
    media: Option<MediaSection>,
}

#[derive(Debug, Deserialize)]
struct MediaSection {
    #[serde(default)]
    transcripts: Vec<TranscriptDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptDescriptor {
    temporary_download_url: Option<String>,
    display_name: Option<String>,
    language_tag: Option<String>,
}

/// Pull the first transcript descriptor out of a metadata listing body.
///
/// `Ok(None)` means the body parsed but lists no usable transcript.
pub fn parse_transcript_metadata(body: &[u8]) -> serde_json::Result<Option<ObserverEvent>> {
    let listing: MetadataListing = serde_json::from_slice(body)?;

    let event = listing
        .media
        .and_then(|media| media.transcripts.into_iter().next())
        .and_then(|first| {
            Some(ObserverEvent::TranscriptMetadata {
                temporary_download_url: first.temporary_download_url?,
                display_name: first.display_name,
                language_tag: first.language_tag,
            })
        });

    Ok(event)
}

/// Run both predicates over one exchange
pub fn inspect_exchange(url: &str, body: &[u8]) -> Vec<ObserverEvent> {
    let mut events = Vec::new();

    if is_transcript_metadata_url(url) {
        match parse_transcript_metadata(body) {
            Ok(Some(event)) => {
                tracing::info!("Detected transcript metadata");
                events.push(event);
            }
            Ok(None) => tracing::debug!("Transcript listing without transcripts: {}", url),
            Err(e) => tracing::warn!("Error parsing transcript metadata: {}", e),
        }
    }

    if is_video_manifest_url(url) {
        let manifest_url = truncate_manifest_url(url).to_string();
        tracing::info!("Detected videomanifest URL: {}", manifest_url);
        events.push(ObserverEvent::VideoManifestUrl { manifest_url });
    }

    events
}

/// Inspect an exchange and post whatever it yields; returns the number of events
pub fn observe(url: &str, body: &[u8], emitter: &EventEmitter) -> usize {
    let events = inspect_exchange(url, body);
    for event in &events {
        emitter.emit(event);
    }
    events.len()
}

/// A fully buffered response. Cloning shares the body, so the observer's copy
/// never consumes what the caller reads.
#[derive(Debug, Clone)]
pub struct ObservedResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ObservedResponse {
    async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let url = response.url().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Self {
            url,
            status,
            headers,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text; a payload that is not valid UTF-8 is rejected, not repaired
    pub fn text(&self) -> std::result::Result<String, GrabberError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| GrabberError::MalformedDocument(format!("body is not UTF-8: {}", e)))
    }
}

/// HTTP client whose traffic is observed on the way back to the caller
#[derive(Debug, Clone)]
pub struct ObservingClient {
    client: Client,
    emitter: EventEmitter,
}

impl ObservingClient {
    pub fn new(client: Client, emitter: EventEmitter) -> Self {
        Self { client, emitter }
    }

    pub async fn get(&self, url: &str) -> reqwest::Result<ObservedResponse> {
        let request = self.client.get(url).build()?;
        self.execute(request).await
    }

    /// Perform the exchange, then inspect a copy on a detached task.
    ///
    /// The response is returned as soon as it is read; inspection failures
    /// stay inside the spawned task.
    pub async fn execute(&self, request: Request) -> reqwest::Result<ObservedResponse> {
        let request_url = request.url().to_string();
        let response = self.client.execute(request).await?;
        let observed = ObservedResponse::read(response).await?;

        let copy = observed.body.clone();
        let emitter = self.emitter.clone();
        tokio::spawn(async move {
            observe(&request_url, &copy, &emitter);
        });

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_URL: &str = "https://contoso-my.sharepoint.com/personal/ada_contoso_com/_api/v2.1/drives/b!x/items/01AB/media/transcripts";

    fn listing_body() -> &'static str {
        r#"{"media":{"transcripts":[
            {"id":"t1","temporaryDownloadUrl":"https://euc.svc.ms/transcripts/t1/streamContent?token=abc","displayName":"Meeting transcript","languageTag":"en-US"},
            {"id":"t2","temporaryDownloadUrl":"https://euc.svc.ms/transcripts/t2","displayName":"Other","languageTag":"de-DE"}
        ]}}"#
    }

    #[test]
    fn test_transcript_predicate() {
        assert!(is_transcript_metadata_url(LISTING_URL));
        assert!(is_transcript_metadata_url(&format!("{}?select=id", LISTING_URL)));
        assert!(!is_transcript_metadata_url(&format!("{}/t1/content", LISTING_URL)));
        assert!(!is_transcript_metadata_url(
            "https://contoso.sharepoint.com/sites/team/_api/v2.1/drives/b!x/items/01AB/media/transcripts"
        ));
        assert!(!is_transcript_metadata_url(
            "https://contoso-my.sharepoint.com/personal/ada/_api/v2.1/drives/b!x/items/01AB"
        ));
    }

    #[test]
    fn test_manifest_truncation() {
        let url = "https://eu.asyncgw.teams.microsoft.com/videomanifest?provider=spo&part=index&format=dash&extraJunk=1";
        assert_eq!(
            truncate_manifest_url(url),
            "https://eu.asyncgw.teams.microsoft.com/videomanifest?provider=spo&part=index&format=dash"
        );
        assert_eq!(truncate_manifest_url("https://x/videomanifest?a=1"), "https://x/videomanifest?a=1");
    }

    #[test]
    fn test_inspect_takes_first_transcript() {
        let events = inspect_exchange(LISTING_URL, listing_body().as_bytes());
        assert_eq!(
            events,
            vec![ObserverEvent::TranscriptMetadata {
                temporary_download_url: "https://euc.svc.ms/transcripts/t1/streamContent?token=abc".to_string(),
                display_name: Some("Meeting transcript".to_string()),
                language_tag: Some("en-US".to_string()),
            }]
        );
    }

    #[test]
    fn test_inspect_swallows_bad_bodies() {
        assert!(inspect_exchange(LISTING_URL, b"<html>nope</html>").is_empty());
        assert!(inspect_exchange(LISTING_URL, br#"{"media":{"transcripts":[]}}"#).is_empty());
        assert!(inspect_exchange(LISTING_URL, br#"{"value":[]}"#).is_empty());
        assert!(inspect_exchange(LISTING_URL, br#"{"media":{"transcripts":[{"displayName":"x"}]}}"#).is_empty());
    }

    #[test]
    fn test_unrelated_traffic_is_ignored() {
        assert!(inspect_exchange("https://example.com/app.js", b"console.log(1)").is_empty());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ObserverEvent::VideoManifestUrl {
            manifest_url: "https://x/videomanifest".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"kind": "video-manifest-url", "manifestUrl": "https://x/videomanifest"})
        );

        let decoded: ObserverEvent = serde_json::from_value(serde_json::json!({
            "kind": "transcript-metadata",
            "temporaryDownloadUrl": "https://t",
            "displayName": "T",
            "languageTag": "en-US"
        }))
        .unwrap();
        assert!(matches!(decoded, ObserverEvent::TranscriptMetadata { .. }));
    }

    #[test]
    fn test_observe_posts_to_channel() {
        let (tx, mut rx) = broadcast::channel(8);
        let emitter = EventEmitter::new(tx);

        let count = observe(LISTING_URL, listing_body().as_bytes(), &emitter);
        assert_eq!(count, 1);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.origin, OBSERVER_ORIGIN);
        assert_eq!(message.data["kind"], "transcript-metadata");
    }
    #[test]
    fn test_response_text_rejects_invalid_utf8() {
        let response = |body: Bytes| ObservedResponse {
            url: "https://t/1".to_string(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        };

        assert_eq!(response(Bytes::from_static("héllo".as_bytes())).text().unwrap(), "héllo");
        assert!(matches!(
            response(Bytes::from_static(&[b'{', 0xff, 0xfe, b'}'])).text(),
            Err(GrabberError::MalformedDocument(_))
        ));
    }
}
