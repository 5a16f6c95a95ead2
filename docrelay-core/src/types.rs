use serde::{Deserialize, Serialize};

/// Identifying metadata of a stored document, as returned by a successful
/// single-document operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Key of the document, unique within its collection
    #[serde(rename = "_key")]
    pub key: String,
    /// Collection-qualified id (`collection/key`)
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision of the document after the operation
    #[serde(rename = "_rev")]
    pub rev: String,
    /// Revision the operation replaced, when the server reports one
    #[serde(rename = "_oldRev", default, skip_serializing_if = "Option::is_none")]
    pub old_rev: Option<String>,
}

impl DocumentMeta {
    pub fn new(key: impl Into<String>, id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            rev: rev.into(),
            old_rev: None,
        }
    }

    /// True for the zero value handed out for silent or failed operations.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.id.is_empty() && self.rev.is_empty()
    }
}
