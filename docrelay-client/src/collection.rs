/// Single-document operations
///
/// Every write follows the same exchange: validate the key, reject a null
/// payload, derive the call's settings, send, check the status against the
/// verb's accepted set, then decode the metadata and any requested
/// old/new envelopes.

use crate::settings::{CallConfig, ContextSettings};
use crate::transport::{Connection, Method, Request, Response, ENVELOPE_NEW, ENVELOPE_OLD};
use docrelay_core::{escape_key, validate_key, DocumentMeta, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Kind of collection a handle addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl CollectionKind {
    /// Name of the primary envelope in responses, also the API segment
    pub fn envelope(&self) -> &'static str {
        match self {
            CollectionKind::Document => "document",
            CollectionKind::Edge => "edge",
        }
    }
}

/// The write verbs, with their wire method and accepted statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Create,
    Update,
    Replace,
    Remove,
}

impl WriteOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Replace => "replace",
            WriteOp::Remove => "remove",
        }
    }

    fn method(self) -> Method {
        match self {
            WriteOp::Create => Method::Post,
            WriteOp::Update => Method::Patch,
            WriteOp::Replace => Method::Put,
            WriteOp::Remove => Method::Delete,
        }
    }

    fn accepted(self, settings: &ContextSettings) -> Vec<u16> {
        match self {
            WriteOp::Create | WriteOp::Replace => vec![settings.ok_status(201, 202)],
            WriteOp::Update => vec![200, 201, 202],
            WriteOp::Remove => vec![settings.ok_status(200, 202)],
        }
    }

    fn returns_old(self) -> bool {
        !matches!(self, WriteOp::Create)
    }

    fn returns_new(self) -> bool {
        !matches!(self, WriteOp::Remove)
    }

    fn payload_name(self) -> &'static str {
        match self {
            WriteOp::Update => "update",
            _ => "document",
        }
    }
}

/// Serialize a payload into a request body.
pub(crate) fn to_body<T: Serialize + ?Sized>(payload: &T, what: &str) -> Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| Error::InvalidArgument(format!("failed to serialize {}: {}", what, e)))
}

/// Handle to a document or edge collection
#[derive(Clone)]
pub struct Collection {
    name: String,
    kind: CollectionKind,
    conn: Arc<dyn Connection>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, kind: CollectionKind, conn: Arc<dyn Connection>) -> Self {
        Self {
            name: name.into(),
            kind,
            conn,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    fn rel_path(&self) -> String {
        format!("_api/{}/{}", self.kind.envelope(), self.name)
    }

    fn document_path(&self, key: &str) -> String {
        format!("{}/{}", self.rel_path(), escape_key(key))
    }

    /// Read the document stored under `key`.
    ///
    /// Returns its metadata and its content decoded as `T`. A missing
    /// document is [`Error::NotFound`].
    pub async fn read_document<T: DeserializeOwned>(&self, key: &str) -> Result<(DocumentMeta, T)> {
        validate_key(key)?;
        let request = self.conn.new_request(Method::Get, &self.document_path(key))?;
        let response = self.conn.execute(request).await?;
        response.check_status(&[200])?;

        let envelope = self.kind.envelope();
        let meta: DocumentMeta = response.parse_primary(envelope)?;
        let document: T = response
            .parse_primary(envelope)
            .map_err(|e| e.with_meta(meta.clone()))?;

        debug!(collection = %self.name, key, rev = %meta.rev, "Read document");
        Ok((meta, document))
    }

    /// Check whether a document is stored under `key`.
    pub async fn document_exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let request = self.conn.new_request(Method::Head, &self.document_path(key))?;
        let response = self.conn.execute(request).await?;
        match response.status() {
            404 => Ok(false),
            _ => response.check_status(&[200]).map(|_| true),
        }
    }

    /// Create a document.
    ///
    /// A `_key` in the document is used as the new key, otherwise the server
    /// picks one. A duplicate key is [`Error::Conflict`] unless an
    /// [`OverwriteMode`](crate::OverwriteMode) says otherwise. Supports
    /// return-new, silent and wait-for-sync.
    pub async fn create_document<T: Serialize + ?Sized>(
        &self,
        document: &T,
        config: &CallConfig,
    ) -> Result<DocumentMeta> {
        let body = to_body(document, "document")?;
        self.write_one(WriteOp::Create, None, Some(body), config, 0).await.1
    }

    /// Merge `update` into the document stored under `key`.
    ///
    /// Supports return-old, return-new, silent and wait-for-sync.
    pub async fn update_document<T: Serialize + ?Sized>(
        &self,
        key: &str,
        update: &T,
        config: &CallConfig,
    ) -> Result<DocumentMeta> {
        let body = to_body(update, "update")?;
        self.write_one(WriteOp::Update, Some(key), Some(body), config, 0).await.1
    }

    /// Replace the document stored under `key` with `document`.
    ///
    /// Supports return-old, return-new, silent and wait-for-sync.
    pub async fn replace_document<T: Serialize + ?Sized>(
        &self,
        key: &str,
        document: &T,
        config: &CallConfig,
    ) -> Result<DocumentMeta> {
        let body = to_body(document, "document")?;
        self.write_one(WriteOp::Replace, Some(key), Some(body), config, 0).await.1
    }

    /// Remove the document stored under `key`.
    ///
    /// Supports return-old, silent and wait-for-sync.
    pub async fn remove_document(&self, key: &str, config: &CallConfig) -> Result<DocumentMeta> {
        self.write_one(WriteOp::Remove, Some(key), None, config, 0).await.1
    }

    /// Run one write. Also hands back the settings the request went out
    /// with, or `None` when it failed before they were derived.
    pub(crate) async fn write_one(
        &self,
        op: WriteOp,
        key: Option<&str>,
        body: Option<Value>,
        config: &CallConfig,
        slot: usize,
    ) -> (Option<ContextSettings>, Result<DocumentMeta>) {
        let mut request = match self.prepare(op, key, body) {
            Ok(request) => request,
            Err(err) => return (None, Err(err)),
        };
        let settings = ContextSettings::extract(config, &mut request);
        let result = self.exchange(op, request, &settings, config, slot).await;

        if let Err(err) = &result {
            debug!(collection = %self.name, op = op.name(), key, "Write failed: {}", err);
        }
        (Some(settings), result)
    }

    fn prepare(&self, op: WriteOp, key: Option<&str>, body: Option<Value>) -> Result<Request> {
        if let Some(key) = key {
            validate_key(key)?;
        }
        if op != WriteOp::Remove && matches!(body, None | Some(Value::Null)) {
            return Err(Error::InvalidArgument(format!("{} nil", op.payload_name())));
        }

        let path = match key {
            Some(key) => self.document_path(key),
            None => self.rel_path(),
        };
        let mut request = self.conn.new_request(op.method(), &path)?;
        if let Some(body) = body {
            request.set_body(body);
        }
        Ok(request)
    }

    async fn exchange(
        &self,
        op: WriteOp,
        request: Request,
        settings: &ContextSettings,
        config: &CallConfig,
        slot: usize,
    ) -> Result<DocumentMeta> {
        let response = self.send(request, config).await?;
        response.check_status(&op.accepted(settings))?;

        if settings.silent {
            // Server sends no body
            return Ok(DocumentMeta::default());
        }

        let meta: DocumentMeta = response.parse_primary(self.kind.envelope())?;
        if op.returns_old() {
            if let Some(sink) = &settings.return_old {
                store_envelope(&response, ENVELOPE_OLD, sink.as_ref(), slot)
                    .map_err(|e| e.with_meta(meta.clone()))?;
            }
        }
        if op.returns_new() {
            if let Some(sink) = &settings.return_new {
                store_envelope(&response, ENVELOPE_NEW, sink.as_ref(), slot)
                    .map_err(|e| e.with_meta(meta.clone()))?;
            }
        }
        Ok(meta)
    }

    /// Send a request, giving up with [`Error::Cancelled`] if the call is
    /// cancelled first.
    pub(crate) async fn send(&self, request: Request, config: &CallConfig) -> Result<Response> {
        match config.cancellation() {
            Some(cancel) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tokio::select! {
                    response = self.conn.execute(request) => response,
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                }
            }
            None => self.conn.execute(request).await,
        }
    }
}

fn store_envelope(
    response: &Response,
    field: &str,
    sink: &dyn crate::settings::EnvelopeSink,
    slot: usize,
) -> Result<()> {
    let payload: Value = response.parse_body(field)?;
    sink.store(slot, payload)
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
