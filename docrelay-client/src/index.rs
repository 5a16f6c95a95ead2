/// Index handles
use crate::collection::Collection;
use crate::transport::{Connection, Method};
use docrelay_core::{escape_key, Error, IndexDescriptor, IndexType, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// An index of a collection, as last reported by the server
#[derive(Clone)]
pub struct Index {
    descriptor: IndexDescriptor,
    conn: Arc<dyn Connection>,
}

impl Index {
    pub(crate) fn new(descriptor: IndexDescriptor, conn: Arc<dyn Connection>) -> Self {
        Self { descriptor, conn }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn index_type(&self) -> IndexType {
        self.descriptor.index_type()
    }

    pub fn fields(&self) -> &[String] {
        self.descriptor.fields()
    }

    /// Drop the index on the server.
    ///
    /// Fails with [`Error::NotFound`] if it no longer exists.
    pub async fn remove(&self) -> Result<()> {
        let path = format!(
            "_api/index/{}/{}",
            escape_key(self.descriptor.collection()),
            escape_key(self.descriptor.name())
        );
        let request = self.conn.new_request(Method::Delete, &path)?;
        let response = self.conn.execute(request).await?;
        response.check_status(&[200])?;

        debug!(index = self.descriptor.id(), "Removed index");
        Ok(())
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index").field("descriptor", &self.descriptor).finish()
    }
}

impl Collection {
    /// Fetch the index called `name` of this collection.
    pub async fn index(&self, name: &str) -> Result<Index> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidArgument(format!("invalid index name '{}'", name)));
        }
        let conn = self.connection();
        let path = format!("_api/index/{}/{}", escape_key(self.name()), escape_key(name));
        let request = conn.new_request(Method::Get, &path)?;
        let response = conn.execute(request).await?;
        response.check_status(&[200])?;

        let body: Value = response.parse_root()?;
        let descriptor = IndexDescriptor::from_json(&body)?;
        Ok(Index::new(descriptor, Arc::clone(conn)))
    }

    /// Fetch all indexes of this collection.
    pub async fn indexes(&self) -> Result<Vec<Index>> {
        let conn = self.connection();
        let mut request = conn.new_request(Method::Get, "_api/index")?;
        request.set_query("collection", self.name());
        let response = conn.execute(request).await?;
        response.check_status(&[200])?;

        let descriptors: Vec<Value> = response.parse_body("indexes")?;
        descriptors
            .iter()
            .map(|raw| IndexDescriptor::from_json(raw).map(|d| Index::new(d, Arc::clone(conn))))
            .collect()
    }
}
