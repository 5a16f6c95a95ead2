/// DocRelay client library
///
/// Typed document, edge and index operations over a remote document
/// database, including multi-document batches with per-item results.

pub mod transport;
pub mod settings;
pub mod http;
pub mod collection;
pub mod batch;
pub mod index;
pub mod client;

// Re-export key types
pub use batch::{BatchOutcome, ItemOutcome};
pub use client::Client;
pub use collection::{Collection, CollectionKind};
pub use docrelay_core::{ClientConfig, DocumentMeta, Error, IndexDescriptor, IndexType, Result, RetryPolicy};
pub use http::HttpConnection;
pub use index::Index;
pub use settings::{CallConfig, CancelHandle, ContextSettings, EnvelopeSink, OverwriteMode, Sink};
pub use transport::{Connection, Method, Request, Response};
