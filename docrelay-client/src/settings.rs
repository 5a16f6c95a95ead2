/// Per-call options and the settings derived from them
///
/// A [`CallConfig`] is passed explicitly to every write operation. Just
/// before a request is sent it is turned into [`ContextSettings`], which
/// also attaches the matching query parameters to the request.

use crate::transport::Request;
use docrelay_core::{Error, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// What to do when a created document's key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwriteMode {
    /// Keep the stored document, report success
    Ignore,
    /// Replace the stored document
    Replace,
    /// Merge the new document into the stored one
    Update,
    /// Fail with a conflict (server default)
    Conflict,
}

impl OverwriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteMode::Ignore => "ignore",
            OverwriteMode::Replace => "replace",
            OverwriteMode::Update => "update",
            OverwriteMode::Conflict => "conflict",
        }
    }
}

/// Receiver for an "old" or "new" envelope.
///
/// `slot` is 0 for single-document calls and the item index for batches.
pub trait EnvelopeSink: Send + Sync {
    fn store(&self, slot: usize, payload: Value) -> Result<()>;
}

/// Typed, cloneable receiver for returned document versions.
///
/// ```no_run
/// # use docrelay_client::{CallConfig, Client, ClientConfig, Sink};
/// # use serde_json::{json, Value};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::connect(ClientConfig::default())?;
/// let users = client.collection("users")?;
///
/// let created = Sink::<Value>::new();
/// let config = CallConfig::new().with_return_new(&created);
/// users.create_document(&json!({"name": "Ann"}), &config).await?;
///
/// println!("stored: {:?}", created.get());
/// # Ok(())
/// # }
/// ```
pub struct Sink<T> {
    slots: Arc<Mutex<BTreeMap<usize, T>>>,
}

impl<T> Sink<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Number of payloads received
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Remove and return the payload of a single-document call
    pub fn take(&self) -> Option<T> {
        self.take_at(0)
    }

    /// Remove and return the payload for batch item `index`
    pub fn take_at(&self, index: usize) -> Option<T> {
        self.slots.lock().remove(&index)
    }

    /// Remove and return everything received, keyed by item index
    pub fn drain(&self) -> BTreeMap<usize, T> {
        std::mem::take(&mut *self.slots.lock())
    }
}

impl<T: Clone> Sink<T> {
    /// Payload of a single-document call
    pub fn get(&self) -> Option<T> {
        self.get_at(0)
    }

    /// Payload for batch item `index`
    pub fn get_at(&self, index: usize) -> Option<T> {
        self.slots.lock().get(&index).cloned()
    }
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for Sink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("len", &self.len()).finish()
    }
}

impl<T: DeserializeOwned + Send + 'static> EnvelopeSink for Sink<T> {
    fn store(&self, slot: usize, payload: Value) -> Result<()> {
        let value: T = serde_json::from_value(payload)
            .map_err(|e| Error::decode(format!("cannot decode returned document: {}", e), None))?;
        self.slots.lock().insert(slot, value);
        Ok(())
    }
}

/// Cancels the calls it is attached to.
///
/// Cancelling aborts the request in flight with [`Error::Cancelled`]; batch
/// items that have not started yet are left unattempted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Options for a single call
#[derive(Clone, Default)]
pub struct CallConfig {
    silent: bool,
    return_old: Option<Arc<dyn EnvelopeSink>>,
    return_new: Option<Arc<dyn EnvelopeSink>>,
    wait_for_sync: bool,
    overwrite: Option<OverwriteMode>,
    cancel: Option<CancelHandle>,
}

impl CallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the new version of each written document to `sink`
    pub fn with_return_new<T: DeserializeOwned + Send + 'static>(mut self, sink: &Sink<T>) -> Self {
        self.return_new = Some(Arc::new(sink.clone()));
        self
    }

    /// Deliver the previous version of each written document to `sink`
    pub fn with_return_old<T: DeserializeOwned + Send + 'static>(mut self, sink: &Sink<T>) -> Self {
        self.return_old = Some(Arc::new(sink.clone()));
        self
    }

    /// Ask the server to omit metadata from responses
    pub fn with_silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Wait until the write has been synced to disk
    pub fn with_wait_for_sync(mut self) -> Self {
        self.wait_for_sync = true;
        self
    }

    pub fn with_overwrite(mut self, mode: OverwriteMode) -> Self {
        self.overwrite = Some(mode);
        self
    }

    pub fn with_cancellation(mut self, cancel: &CancelHandle) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    pub fn cancellation(&self) -> Option<&CancelHandle> {
        self.cancel.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelHandle::is_cancelled)
    }
}

impl fmt::Debug for CallConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallConfig")
            .field("silent", &self.silent)
            .field("return_old", &self.return_old.is_some())
            .field("return_new", &self.return_new.is_some())
            .field("wait_for_sync", &self.wait_for_sync)
            .field("overwrite", &self.overwrite)
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

/// Behavior flags for one operation, derived from a [`CallConfig`]
#[derive(Clone, Default)]
pub struct ContextSettings {
    pub silent: bool,
    pub return_old: Option<Arc<dyn EnvelopeSink>>,
    pub return_new: Option<Arc<dyn EnvelopeSink>>,
    pub wait_for_sync: bool,
    pub overwrite: Option<OverwriteMode>,
}

impl ContextSettings {
    /// Derive the settings for `request` and attach the matching query
    /// parameters to it.
    pub fn extract(config: &CallConfig, request: &mut Request) -> Self {
        if config.silent {
            request.set_query("silent", "true");
        }
        if config.return_old.is_some() {
            request.set_query("returnOld", "true");
        }
        if config.return_new.is_some() {
            request.set_query("returnNew", "true");
        }
        if config.wait_for_sync {
            request.set_query("waitForSync", "true");
        }
        if let Some(mode) = config.overwrite {
            request.set_query("overwriteMode", mode.as_str());
        }

        Self {
            silent: config.silent,
            return_old: config.return_old.clone(),
            return_new: config.return_new.clone(),
            wait_for_sync: config.wait_for_sync,
            overwrite: config.overwrite,
        }
    }

    /// The success status to expect: `primary` when a synced write was
    /// requested, `secondary` otherwise.
    pub fn ok_status(&self, primary: u16, secondary: u16) -> u16 {
        if self.wait_for_sync {
            primary
        } else {
            secondary
        }
    }
}

impl fmt::Debug for ContextSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSettings")
            .field("silent", &self.silent)
            .field("return_old", &self.return_old.is_some())
            .field("return_new", &self.return_new.is_some())
            .field("wait_for_sync", &self.wait_for_sync)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}
