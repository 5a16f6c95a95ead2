/// Client entry point
use crate::collection::{Collection, CollectionKind};
use crate::http::HttpConnection;
use crate::transport::Connection;
use docrelay_core::{ClientConfig, Error, Result};
use std::sync::Arc;

/// DocRelay client, scoped to one database
///
/// Cheap to clone; collection handles share its connection.
#[derive(Clone)]
pub struct Client {
    conn: Arc<dyn Connection>,
}

impl Client {
    /// Create a client that talks HTTP to the server in `config`
    ///
    /// # Example
    /// ```no_run
    /// # use docrelay_client::{Client, ClientConfig};
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::connect(
    ///     ClientConfig::new()
    ///         .with_endpoint("http://localhost:8529")
    ///         .with_database("shop"),
    /// )?;
    /// let orders = client.collection("orders")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let conn = HttpConnection::new(config)?;
        Ok(Self::with_connection(Arc::new(conn)))
    }

    /// Create a client over any [`Connection`]
    pub fn with_connection(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    /// Handle to a document collection
    pub fn collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        Ok(Collection::new(name, CollectionKind::Document, Arc::clone(&self.conn)))
    }

    /// Handle to an edge collection
    pub fn edge_collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        Ok(Collection::new(name, CollectionKind::Edge, Arc::clone(&self.conn)))
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 256
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid collection name '{}'", name)))
    }
}
