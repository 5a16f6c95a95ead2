pub mod error;
pub mod types;
pub mod key;
pub mod document;
pub mod index;
pub mod config;
pub mod retry;

pub use error::{Error, Result};
pub use types::DocumentMeta;
pub use key::{escape_key, validate_key};
pub use document::HasKey;
pub use index::{IndexDescriptor, IndexType};
pub use config::ClientConfig;
pub use retry::RetryPolicy;
