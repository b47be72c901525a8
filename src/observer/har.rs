//! Replay of recorded browser traffic (HAR 1.2) through the observer
//!
//! A "Save all as HAR" export from the browser's network panel carries every
//! exchange the page made, including the bodies, which is enough to run both
//! predicates offline.

use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;

use super::{observe, EventEmitter};
use crate::{GrabberError, Result};

#[derive(Debug, Deserialize)]
struct Har {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    #[serde(default)]
    response: HarResponse,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct HarResponse {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    content: HarContent,
}

#[derive(Debug, Default, Deserialize)]
struct HarContent {
    text: Option<String>,
    encoding: Option<String>,
}

/// One recorded request/response pair
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    pub url: String,
    pub status: u16,
    pub body: Bytes,
}

impl HarContent {
    fn into_body(self, url: &str) -> Bytes {
        let Some(text) = self.text else {
            return Bytes::new();
        };

        if self.encoding.as_deref() == Some("base64") {
            match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
                Ok(decoded) => return Bytes::from(decoded),
                Err(e) => {
                    tracing::warn!("Undecodable body for {}: {}", url, e);
                    return Bytes::new();
                }
            }
        }

        Bytes::from(text)
    }
}

/// Parse a HAR document into its exchanges, in recorded order
pub fn parse_capture(json: &str) -> std::result::Result<Vec<CapturedExchange>, GrabberError> {
    let har: Har = serde_json::from_str(json).map_err(|e| GrabberError::InvalidCapture(e.to_string()))?;

    Ok(har
        .log
        .entries
        .into_iter()
        .map(|entry| {
            let body = entry.response.content.into_body(&entry.request.url);
            CapturedExchange {
                url: entry.request.url,
                status: entry.response.status,
                body,
            }
        })
        .collect())
}

/// Load a HAR file from disk
pub fn load_capture(path: &Path) -> Result<Vec<CapturedExchange>> {
    let content = fs_err::read_to_string(path)?;
    let exchanges = parse_capture(&content)?;
    tracing::debug!("Loaded {} exchanges from {}", exchanges.len(), path.display());
    Ok(exchanges)
}

/// Feed recorded exchanges through the observer; returns the number of events posted
pub fn replay(exchanges: &[CapturedExchange], emitter: &EventEmitter) -> usize {
    exchanges
        .iter()
        .map(|exchange| observe(&exchange.url, &exchange.body, emitter))
        .sum()
}
