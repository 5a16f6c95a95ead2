//! Shared test helpers: a request-recording connection and an in-memory
//! document server to put behind it.

#![allow(dead_code)]

use async_trait::async_trait;
use docrelay_client::{Client, Connection, Method, Request, Response, Result};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

/// Connection that answers from a closure and records every request
pub struct StubConnection {
    requests: Mutex<Vec<Request>>,
    handler: Handler,
}

impl StubConnection {
    pub fn new(handler: impl Fn(&Request) -> Response + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Connection for StubConnection {
    async fn execute(&self, request: Request) -> Result<Response> {
        let response = (self.handler)(&request);
        self.requests.lock().push(request);
        Ok(response)
    }
}

/// Connection whose requests never complete
pub struct HangingConnection;

#[async_trait]
impl Connection for HangingConnection {
    async fn execute(&self, _request: Request) -> Result<Response> {
        std::future::pending().await
    }
}

/// Minimal document store speaking the document API of one collection
pub struct MemoryServer {
    collection: String,
    docs: Mutex<BTreeMap<String, Value>>,
    next_rev: AtomicU64,
    next_key: AtomicU64,
}

fn error_response(status: u16, error_num: u32, message: &str) -> Response {
    Response::json(
        status,
        &json!({"error": true, "code": status, "errorNum": error_num, "errorMessage": message}),
    )
}

impl MemoryServer {
    pub fn new(collection: &str) -> Arc<Self> {
        Arc::new(Self {
            collection: collection.to_string(),
            docs: Mutex::new(BTreeMap::new()),
            next_rev: AtomicU64::new(1),
            next_key: AtomicU64::new(1),
        })
    }

    /// Store a document directly, bypassing the API
    pub fn seed(&self, key: &str, fields: Value) {
        let doc = self.stamp(key, fields);
        self.docs.lock().insert(key.to_string(), doc);
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        self.docs.lock().get(key).cloned()
    }

    fn stamp(&self, key: &str, fields: Value) -> Value {
        let mut doc = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let rev = self.next_rev.fetch_add(1, Ordering::SeqCst);
        doc.insert("_key".into(), json!(key));
        doc.insert("_id".into(), json!(format!("{}/{}", self.collection, key)));
        doc.insert("_rev".into(), json!(format!("_r{}", rev)));
        Value::Object(doc)
    }

    fn meta_of(doc: &Value) -> Map<String, Value> {
        let mut meta = Map::new();
        for field in ["_key", "_id", "_rev"] {
            meta.insert(field.into(), doc[field].clone());
        }
        meta
    }

    fn write_response(
        req: &Request,
        status: u16,
        mut meta: Map<String, Value>,
        old: Option<Value>,
        new: Option<Value>,
    ) -> Response {
        if req.query_param("silent") == Some("true") {
            return Response::empty(status);
        }
        if req.query_param("returnOld") == Some("true") {
            if let Some(old) = old {
                meta.insert("old".into(), old);
            }
        }
        if req.query_param("returnNew") == Some("true") {
            if let Some(new) = new {
                meta.insert("new".into(), new);
            }
        }
        Response::json(status, &Value::Object(meta))
    }

    pub fn handle(&self, req: &Request) -> Response {
        let prefix = format!("_api/document/{}", self.collection);
        let rest = match req.path().strip_prefix(&prefix) {
            Some(rest) => rest.trim_start_matches('/'),
            None => return error_response(404, 1203, "collection not found"),
        };
        let synced = req.query_param("waitForSync") == Some("true");
        let key = rest.to_string();

        match (req.method(), key.is_empty()) {
            (Method::Post, true) => self.create(req, synced),
            (Method::Get, false) => match self.stored(&key) {
                Some(doc) => Response::json(200, &doc),
                None => error_response(404, 1202, "document not found"),
            },
            (Method::Head, false) => match self.stored(&key) {
                Some(_) => Response::empty(200),
                None => Response::empty(404),
            },
            (Method::Patch, false) => self.modify(req, &key, true, synced),
            (Method::Put, false) => self.modify(req, &key, false, synced),
            (Method::Delete, false) => self.remove(req, &key, synced),
            _ => error_response(405, 0, "method not supported"),
        }
    }

    fn create(&self, req: &Request, synced: bool) -> Response {
        let body = req.body().cloned().unwrap_or(Value::Null);
        let key = match body.get("_key").and_then(Value::as_str) {
            Some(key) => key.to_string(),
            None => format!("k{}", self.next_key.fetch_add(1, Ordering::SeqCst)),
        };
        let status = if synced { 201 } else { 202 };

        if let Some(existing) = self.stored(&key) {
            match req.query_param("overwriteMode") {
                Some("replace") => {}
                Some("ignore") => {
                    return Self::write_response(req, status, Self::meta_of(&existing), None, None)
                }
                _ => return error_response(409, 1210, "unique constraint violated"),
            }
        }

        let doc = self.stamp(&key, body);
        self.docs.lock().insert(key, doc.clone());
        Self::write_response(req, status, Self::meta_of(&doc), None, Some(doc))
    }

    fn modify(&self, req: &Request, key: &str, merge: bool, synced: bool) -> Response {
        let old = match self.stored(key) {
            Some(doc) => doc,
            None => return error_response(404, 1202, "document not found"),
        };
        let mut fields = if merge {
            old.as_object().cloned().unwrap_or_default()
        } else {
            Map::new()
        };
        if let Some(Value::Object(update)) = req.body() {
            for (name, value) in update {
                fields.insert(name.clone(), value.clone());
            }
        }

        let doc = self.stamp(key, Value::Object(fields));
        self.docs.lock().insert(key.to_string(), doc.clone());

        let mut meta = Self::meta_of(&doc);
        meta.insert("_oldRev".into(), old["_rev"].clone());
        let status = if synced { 201 } else { 202 };
        Self::write_response(req, status, meta, Some(old), Some(doc))
    }

    fn remove(&self, req: &Request, key: &str, synced: bool) -> Response {
        let old = match self.docs.lock().remove(key) {
            Some(doc) => doc,
            None => return error_response(404, 1202, "document not found"),
        };
        let status = if synced { 200 } else { 202 };
        Self::write_response(req, status, Self::meta_of(&old), Some(old), None)
    }
}

/// Client over a fresh memory server holding collection `users`
pub fn users_client() -> (Client, Arc<MemoryServer>, Arc<StubConnection>) {
    let server = MemoryServer::new("users");
    let backend = Arc::clone(&server);
    let conn = StubConnection::new(move |req| backend.handle(req));
    let client = Client::with_connection(conn.clone());
    (client, server, conn)
}
