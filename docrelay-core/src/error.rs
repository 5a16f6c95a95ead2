use thiserror::Error;

use crate::types::DocumentMeta;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Unexpected response status {status} (errorNum {error_num}): {message}")]
    Response {
        status: u16,
        error_num: u32,
        message: String,
    },

    /// The response body did not have the expected shape. `meta` holds
    /// whatever document metadata was decoded before the failure.
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        meta: Option<Box<DocumentMeta>>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::InvalidKey(_) => "INVALID_KEY",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Error::Response { .. } => "RESPONSE_ERROR",
            Error::Decode { .. } => "DECODE_ERROR",
            Error::Connection(_) => "CONNECTION_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Cancelled => "CANCELLED",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the request never produced a server response.
    ///
    /// Only transport-level failures qualify. Anything the server answered,
    /// even with a 5xx status, is reported to the caller as-is. Whether a
    /// retryable failure is actually resent also depends on how far the
    /// request got and on its method; see the HTTP transport.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::Timeout(_) => true,

            Error::InvalidArgument(_) => false,
            Error::InvalidKey(_) => false,
            Error::NotFound(_) => false,
            Error::Conflict(_) => false,
            Error::PreconditionFailed(_) => false,
            Error::Response { .. } => false,
            Error::Decode { .. } => false,
            Error::Cancelled => false,
            Error::Internal(_) => false,
        }
    }

    /// Builds a decode error that remembers the metadata already parsed.
    pub fn decode(message: impl Into<String>, meta: Option<DocumentMeta>) -> Error {
        Error::Decode {
            message: message.into(),
            meta: meta.map(Box::new),
        }
    }

    /// Metadata recovered before a decode failure, if any.
    pub fn partial_meta(&self) -> Option<&DocumentMeta> {
        match self {
            Error::Decode { meta, .. } => meta.as_deref(),
            _ => None,
        }
    }

    /// Attaches document metadata to a decode error. Other kinds are
    /// returned unchanged.
    pub fn with_meta(self, partial: DocumentMeta) -> Error {
        match self {
            Error::Decode { message, .. } => Error::Decode {
                message,
                meta: Some(Box::new(partial)),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
