use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GrabberError;

/// Speaker name used when an entry carries none
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Structured transcript as returned by the media API with `format=json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptDocument {
    /// Timed entries in the order they were received
    #[serde(default)]
    pub entries: Vec<TranscriptEntry>,
}

/// One timed, speaker-attributed line of the transcript
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    #[serde(default)]
    pub id: Option<EntryId>,

    /// Start of the entry as a clock string (`HH:MM:SS.fffffff`)
    #[serde(default)]
    pub start_offset: String,

    /// End of the entry as a clock string
    #[serde(default)]
    pub end_offset: String,

    #[serde(default)]
    pub speaker_display_name: Option<String>,

    #[serde(default)]
    pub text: Option<String>,
}

/// Entry identifier; the service has sent both numbers and strings here
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(u64),
    Text(String),
}

impl EntryId {
    fn is_blank(&self) -> bool {
        match self {
            EntryId::Number(n) => *n == 0,
            EntryId::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{}", n),
            EntryId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl TranscriptEntry {
    /// Cue identifier, falling back to the 1-based position of the entry
    pub fn cue_id(&self, position: usize) -> String {
        match &self.id {
            Some(id) if !id.is_blank() => id.to_string(),
            _ => position.to_string(),
        }
    }

    pub fn speaker(&self) -> &str {
        self.speaker_display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_SPEAKER)
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

impl TranscriptDocument {
    /// Parse the raw JSON payload fetched from the temporary download URL
    pub fn from_json(raw: &str) -> Result<Self, GrabberError> {
        serde_json::from_str(raw).map_err(|e| GrabberError::MalformedDocument(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fetched transcript: the payload exactly as received plus its parsed form
#[derive(Debug, Clone)]
pub struct FetchedTranscript {
    pub raw: String,
    pub document: TranscriptDocument,
}

impl FetchedTranscript {
    pub fn parse(raw: String) -> Result<Self, GrabberError> {
        let document = TranscriptDocument::from_json(&raw)?;
        Ok(Self { raw, document })
    }
}
