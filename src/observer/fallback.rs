//! Manifest discovery from page state
//!
//! Some pages never request the video manifest before the user acts. They do
//! expose a `g_fileInfo` object whose transform URL can be rewritten into the
//! manifest URL, so the lookup tries that a few times over the page lifecycle.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

use super::{EventEmitter, ObserverEvent};
use crate::Result;

const TRANSFORM_URL_KEYS: [&str; 2] = [".transformUrl", ".providerCdnTransformUrl"];
const TRANSFORM_SEGMENT: &str = "/transform/";
const MANIFEST_PATH: &str = "/transform/videomanifest";

/// Read access to the page's file-info object
#[cfg_attr(test, mockall::automock)]
pub trait PageState: Send + Sync {
    fn file_info(&self) -> Option<Value>;
}

/// Page state captured once, e.g. dumped from the browser console to a file
#[derive(Debug, Clone, Default)]
pub struct StaticPageState {
    file_info: Option<Value>,
}

impl StaticPageState {
    pub fn new(file_info: Option<Value>) -> Self {
        Self { file_info }
    }

    /// Load a JSON dump of `g_fileInfo`; a `{"g_fileInfo": {...}}` wrapper is accepted too
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)?;
        let mut value: Value = serde_json::from_str(&content)?;

        let file_info = match value.get_mut("g_fileInfo") {
            Some(inner) => inner.take(),
            None => value,
        };
        Ok(Self::new(Some(file_info)))
    }
}

impl PageState for StaticPageState {
    fn file_info(&self) -> Option<Value> {
        self.file_info.clone()
    }
}

/// Rewrite the file-info transform URL into a DASH manifest URL
pub fn manifest_from_file_info(file_info: &Value) -> Option<String> {
    let transform_url = TRANSFORM_URL_KEYS
        .iter()
        .filter_map(|key| file_info.get(*key).and_then(Value::as_str))
        .find(|url| !url.is_empty())?;

    let mut url = match Url::parse(transform_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Error constructing manifest URL from file info: {}", e);
            return None;
        }
    };

    let path = url.path().to_string();
    if let Some(start) = path.find(TRANSFORM_SEGMENT) {
        url.set_path(&format!("{}{}", &path[..start], MANIFEST_PATH));
    }
    set_query_param(&mut url, "part", "index");
    set_query_param(&mut url, "format", "dash");

    Some(url.to_string())
}

// Replace the first occurrence and drop the rest, or append when absent.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    let mut seen = false;
    pairs.retain_mut(|(k, v)| {
        if k != key {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        *v = value.to_string();
        true
    });
    if !seen {
        pairs.push((key.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Fires the two lifecycle moments the lookup waits for
#[derive(Debug)]
pub struct PageLifecycle {
    file_info_loaded: Option<oneshot::Sender<()>>,
    page_loaded: Option<oneshot::Sender<()>>,
}

/// Receiving half of [`PageLifecycle`]
#[derive(Debug)]
pub struct PageSignals {
    file_info_loaded: oneshot::Receiver<()>,
    page_loaded: oneshot::Receiver<()>,
}

impl PageLifecycle {
    pub fn channel() -> (Self, PageSignals) {
        let (hook_tx, hook_rx) = oneshot::channel();
        let (load_tx, load_rx) = oneshot::channel();

        let lifecycle = Self {
            file_info_loaded: Some(hook_tx),
            page_loaded: Some(load_tx),
        };
        let signals = PageSignals {
            file_info_loaded: hook_rx,
            page_loaded: load_rx,
        };
        (lifecycle, signals)
    }

    /// The page finished loading its file info (the `OnLoadVideoFileInfo` hook)
    pub fn file_info_loaded(&mut self) {
        if let Some(tx) = self.file_info_loaded.take() {
            let _ = tx.send(());
        }
    }

    /// The page's load event fired
    pub fn page_loaded(&mut self) {
        if let Some(tx) = self.page_loaded.take() {
            let _ = tx.send(());
        }
    }
}

/// Tries to derive the manifest URL: immediately, after the file-info hook,
/// and after a delay following page load. Stops after the first success.
#[derive(Debug, Clone)]
pub struct ManifestLookup {
    load_delay: Duration,
}

impl ManifestLookup {
    pub fn new(load_delay: Duration) -> Self {
        Self { load_delay }
    }

    pub async fn run(&self, state: &dyn PageState, signals: PageSignals, emitter: &EventEmitter) -> bool {
        if self.attempt(state, emitter, "immediate") {
            return true;
        }

        let PageSignals {
            file_info_loaded,
            page_loaded,
        } = signals;
        let delay = self.load_delay;

        let mut hook = Box::pin(async move { file_info_loaded.await.is_ok() });
        let mut load = Box::pin(async move {
            if page_loaded.await.is_err() {
                return false;
            }
            tokio::time::sleep(delay).await;
            true
        });

        let (mut hook_done, mut load_done) = (false, false);
        while !(hook_done && load_done) {
            tokio::select! {
                fired = &mut hook, if !hook_done => {
                    hook_done = true;
                    if fired && self.attempt(state, emitter, "file info hook") {
                        return true;
                    }
                }
                fired = &mut load, if !load_done => {
                    load_done = true;
                    if fired && self.attempt(state, emitter, "page load") {
                        return true;
                    }
                }
            }
        }

        tracing::debug!("No manifest URL derivable from page state");
        false
    }

    fn attempt(&self, state: &dyn PageState, emitter: &EventEmitter, stage: &str) -> bool {
        let Some(manifest_url) = state.file_info().as_ref().and_then(manifest_from_file_info) else {
            return false;
        };

        tracing::info!("Extracted videomanifest from file info ({}): {}", stage, manifest_url);
        emitter.emit(&ObserverEvent::VideoManifestUrl { manifest_url });
        true
    }
}

impl Default for ManifestLookup {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
