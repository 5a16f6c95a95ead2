/// Transport boundary
///
/// Operators only build [`Request`]s and read [`Response`]s; moving bytes
/// is left to a [`Connection`] implementation.

use async_trait::async_trait;
use bytes::Bytes;
use docrelay_core::document::KEY_ATTRIBUTE;
use docrelay_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Envelope holding the previous version of a document
pub const ENVELOPE_OLD: &str = "old";

/// Envelope holding the new version of a document
pub const ENVELOPE_NEW: &str = "new";

/// HTTP verb of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether sending the request twice has the same effect as sending it once
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Method::Post | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Path relative to the database root, without a leading slash
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Set a query parameter, replacing an earlier value with the same name
    pub fn set_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.query.push((name, value)),
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }
}

/// A response as received from the server
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response carrying a JSON body
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Response without a body
    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Fail unless the status is one of `accepted`.
    ///
    /// 404, 409 and 412 map to their dedicated error kinds; any other
    /// status becomes [`Error::Response`] with the server's error details.
    pub fn check_status(&self, accepted: &[u16]) -> Result<()> {
        if accepted.contains(&self.status) {
            return Ok(());
        }

        let (error_num, message) = self.error_details();
        Err(match self.status {
            404 => Error::NotFound(message),
            409 => Error::Conflict(message),
            412 => Error::PreconditionFailed(message),
            status => Error::Response {
                status,
                error_num,
                message,
            },
        })
    }

    fn error_details(&self) -> (u32, String) {
        let parsed: Option<Value> = serde_json::from_slice(&self.body).ok();
        let error_num = parsed
            .as_ref()
            .and_then(|v| v.get("errorNum"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("errorMessage"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("unexpected status {}", self.status));
        (error_num, message)
    }

    fn json_body(&self) -> Result<Value> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::decode(format!("response body is not valid JSON: {}", e), None))
    }

    /// Decode the whole body.
    pub fn parse_root<T: DeserializeOwned>(&self) -> Result<T> {
        decode(self.json_body()?, "body")
    }

    /// Decode the envelope named `field`, which must be present.
    pub fn parse_body<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        let mut root = self.json_body()?;
        let envelope = root.get_mut(field).map(Value::take).ok_or_else(|| {
            Error::decode(format!("response has no '{}' envelope", field), None)
        })?;
        decode(envelope, field)
    }

    /// Decode the primary envelope named `field`.
    ///
    /// A body that carries `_key` at the top level is the document itself,
    /// even if it has an object attribute called `field`; only a body
    /// without one is unwrapped.
    pub fn parse_primary<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        let mut root = self.json_body()?;
        let nested = root.get(KEY_ATTRIBUTE).is_none()
            && root.get(field).map_or(false, Value::is_object);
        let envelope = if nested { root[field].take() } else { root };
        decode(envelope, field)
    }
}

fn decode<T: DeserializeOwned>(value: Value, field: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::decode(format!("cannot decode '{}' envelope: {}", field, e), None))
}

/// Sends requests to the server.
///
/// Implementations classify nothing: they return whatever status the server
/// answered with, and report only failures to get an answer at all
/// ([`Error::Connection`], [`Error::Timeout`]).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Create a request for `path`, relative to the database root.
    fn new_request(&self, method: Method, path: &str) -> Result<Request> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("request path is empty".to_string()));
        }
        Ok(Request::new(method, path.trim_start_matches('/')))
    }

    /// Send a request and wait for its response.
    async fn execute(&self, request: Request) -> Result<Response>;
}
