/// Multi-document operations
///
/// A batch runs the single-document operation once per item, in index
/// order, and reports one [`ItemOutcome`] per input item. Structural
/// problems (not an array, key count mismatch, an invalid explicit key)
/// abort the whole call before any request is sent; everything else is
/// recorded at the failing item's index.

use crate::collection::{to_body, Collection, WriteOp};
use crate::settings::CallConfig;
use docrelay_core::document::kind_of;
use docrelay_core::{validate_key, DocumentMeta, Error, HasKey, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Result of one item of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The operation succeeded
    Done(DocumentMeta),
    /// The operation, or the preparation of its request, failed
    Failed(Error),
    /// The item was never sent because the call was cancelled first
    NotAttempted,
}

impl ItemOutcome {
    pub fn meta(&self) -> Option<&DocumentMeta> {
        match self {
            ItemOutcome::Done(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ItemOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ItemOutcome::Done(_))
    }
}

/// Result of a batch call
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// At least one item ran in silent mode, so no per-item data is reported
    Silent,
    /// One outcome per input item, in input order
    Items(Vec<ItemOutcome>),
}

impl BatchOutcome {
    pub fn is_silent(&self) -> bool {
        matches!(self, BatchOutcome::Silent)
    }

    /// Per-item outcomes; empty for a silent batch
    pub fn items(&self) -> &[ItemOutcome] {
        match self {
            BatchOutcome::Silent => &[],
            BatchOutcome::Items(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<ItemOutcome> {
        match self {
            BatchOutcome::Silent => Vec::new(),
            BatchOutcome::Items(items) => items,
        }
    }

    /// Metadata per item; the zero value where the item did not succeed
    pub fn metas(&self) -> Vec<DocumentMeta> {
        self.items()
            .iter()
            .map(|item| item.meta().cloned().unwrap_or_default())
            .collect()
    }

    /// Error per item; `None` where the item succeeded or was not attempted
    pub fn errors(&self) -> Vec<Option<&Error>> {
        self.items().iter().map(ItemOutcome::error).collect()
    }

    /// Number of failed items
    pub fn failure_count(&self) -> usize {
        self.items().iter().filter(|item| item.error().is_some()).count()
    }
}

/// One planned write: the key to address (if any) and the request body
struct Job {
    key: Result<Option<String>>,
    body: Option<Value>,
}

/// Serialize a documents argument and require it to be an array.
fn array_items<D: Serialize + ?Sized>(documents: &D, what: &str) -> Result<Vec<Value>> {
    match to_body(documents, what)? {
        Value::Array(items) => Ok(items),
        other => Err(Error::InvalidArgument(format!(
            "{} data must be of kind Array, got {}",
            what,
            kind_of(&other)
        ))),
    }
}

/// Check explicit keys before anything is sent.
fn check_keys<K: AsRef<str>>(keys: &[K], expected: usize) -> Result<()> {
    if keys.len() != expected {
        return Err(Error::InvalidArgument(format!(
            "expected {} keys, got {}",
            expected,
            keys.len()
        )));
    }
    keys.iter().try_for_each(|key| validate_key(key.as_ref()))
}

/// Pair each item with its key, explicit or taken from the item itself.
fn keyed_jobs<K: AsRef<str>>(keys: Option<&[K]>, items: Vec<Value>) -> Result<Vec<Job>> {
    match keys {
        Some(keys) => {
            check_keys(keys, items.len())?;
            Ok(keys
                .iter()
                .zip(items)
                .map(|(key, body)| Job {
                    key: Ok(Some(key.as_ref().to_string())),
                    body: Some(body),
                })
                .collect())
        }
        None => Ok(items
            .into_iter()
            .map(|body| Job {
                key: body.document_key().map(Some),
                body: Some(body),
            })
            .collect()),
    }
}

impl Collection {
    /// Create multiple documents.
    ///
    /// `documents` must serialize to an array. A `_key` in an item is used
    /// as its key; a duplicate key is reported as [`Error::Conflict`] at that
    /// item's index. Sinks passed with return-new receive item `i` at slot `i`.
    pub async fn create_documents<D: Serialize + ?Sized>(
        &self,
        documents: &D,
        config: &CallConfig,
    ) -> Result<BatchOutcome> {
        let jobs = array_items(documents, "documents")?
            .into_iter()
            .map(|body| Job {
                key: Ok(None),
                body: Some(body),
            })
            .collect();
        Ok(self.run_batch(WriteOp::Create, jobs, config).await)
    }

    /// Update multiple documents.
    ///
    /// With `keys`, item `i` updates the document under `keys[i]`; the
    /// lengths must match. Without, each item's own `_key` is used, and an
    /// item without one fails at its index while the rest proceed. Keys may
    /// be any string type; a bare `None` needs one named, as in
    /// `None::<&[&str]>`.
    pub async fn update_documents<K: AsRef<str>, D: Serialize + ?Sized>(
        &self,
        keys: Option<&[K]>,
        updates: &D,
        config: &CallConfig,
    ) -> Result<BatchOutcome> {
        let jobs = keyed_jobs(keys, array_items(updates, "updates")?)?;
        Ok(self.run_batch(WriteOp::Update, jobs, config).await)
    }

    /// Replace multiple documents. Keys follow the same rules as
    /// [`update_documents`](Self::update_documents).
    pub async fn replace_documents<K: AsRef<str>, D: Serialize + ?Sized>(
        &self,
        keys: Option<&[K]>,
        documents: &D,
        config: &CallConfig,
    ) -> Result<BatchOutcome> {
        let jobs = keyed_jobs(keys, array_items(documents, "documents")?)?;
        Ok(self.run_batch(WriteOp::Replace, jobs, config).await)
    }

    /// Remove the documents stored under `keys`.
    ///
    /// Every key is validated before the first request; a missing document
    /// is reported as [`Error::NotFound`] at its index.
    pub async fn remove_documents<K: AsRef<str>>(
        &self,
        keys: &[K],
        config: &CallConfig,
    ) -> Result<BatchOutcome> {
        keys.iter().try_for_each(|key| validate_key(key.as_ref()))?;
        let jobs = keys
            .iter()
            .map(|key| Job {
                key: Ok(Some(key.as_ref().to_string())),
                body: None,
            })
            .collect();
        Ok(self.run_batch(WriteOp::Remove, jobs, config).await)
    }

    /// Read the documents stored under `keys`, one result per key.
    pub async fn read_documents<T: DeserializeOwned>(
        &self,
        keys: &[impl AsRef<str>],
    ) -> Result<Vec<Result<(DocumentMeta, T)>>> {
        keys.iter().try_for_each(|key| validate_key(key.as_ref()))?;
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.read_document(key.as_ref()).await);
        }
        Ok(results)
    }

    async fn run_batch(&self, op: WriteOp, jobs: Vec<Job>, config: &CallConfig) -> BatchOutcome {
        let count = jobs.len();
        let mut items: Vec<ItemOutcome> = (0..count).map(|_| ItemOutcome::NotAttempted).collect();
        let mut silent = false;

        for (index, job) in jobs.into_iter().enumerate() {
            if config.is_cancelled() {
                break;
            }

            let key = match job.key {
                Ok(key) => key,
                Err(err) => {
                    items[index] = ItemOutcome::Failed(err);
                    continue;
                }
            };

            let (settings, result) = self
                .write_one(op, key.as_deref(), job.body, config, index)
                .await;
            if settings.as_ref().map_or(false, |cs| cs.silent) {
                silent = true;
                continue;
            }

            let cancelled = matches!(result, Err(Error::Cancelled));
            items[index] = match result {
                Ok(meta) => ItemOutcome::Done(meta),
                Err(err) => ItemOutcome::Failed(err),
            };
            if cancelled {
                break;
            }
        }

        if silent {
            debug!(collection = %self.name(), op = op.name(), count, "Silent batch finished");
            return BatchOutcome::Silent;
        }

        let outcome = BatchOutcome::Items(items);
        debug!(
            collection = %self.name(),
            op = op.name(),
            count,
            failed = outcome.failure_count(),
            "Batch finished"
        );
        outcome
    }
}
