/// Index descriptors as reported by the server
///
/// A descriptor is read-only: it is parsed once from the server's JSON and
/// only exposes accessors. Attributes that do not apply to an index type
/// read as `false` / `0`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Primary,
    Fulltext,
    Hash,
    Skiplist,
    Persistent,
    Geo,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Primary => "primary",
            IndexType::Fulltext => "fulltext",
            IndexType::Hash => "hash",
            IndexType::Skiplist => "skiplist",
            IndexType::Persistent => "persistent",
            IndexType::Geo => "geo",
        }
    }
}

impl FromStr for IndexType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(IndexType::Primary),
            "fulltext" => Ok(IndexType::Fulltext),
            "hash" => Ok(IndexType::Hash),
            "skiplist" => Ok(IndexType::Skiplist),
            "persistent" => Ok(IndexType::Persistent),
            // Older servers report the geo variant they built
            "geo" | "geo1" | "geo2" => Ok(IndexType::Geo),
            other => Err(Error::InvalidArgument(format!("unknown index type '{}'", other))),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index descriptor as it appears on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIndex {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default)]
    fields: Vec<String>,
    unique: Option<bool>,
    sparse: Option<bool>,
    deduplicate: Option<bool>,
    geo_json: Option<bool>,
    #[serde(default)]
    min_length: u32,
}

/// Parsed, immutable index metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    id: String,
    index_type: IndexType,
    fields: Vec<String>,
    unique: Option<bool>,
    sparse: Option<bool>,
    deduplicate: Option<bool>,
    geo_json: Option<bool>,
    min_length: u32,
}

impl IndexDescriptor {
    /// Parse a descriptor from the server's JSON representation.
    ///
    /// The id must have the form `collection/name`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let raw: RawIndex = serde_json::from_value(value.clone())
            .map_err(|e| Error::decode(format!("invalid index descriptor: {}", e), None))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawIndex) -> Result<Self> {
        if raw.id.is_empty() {
            return Err(Error::InvalidArgument("index id is empty".to_string()));
        }
        if raw.id.split('/').count() != 2 {
            return Err(Error::InvalidArgument(format!(
                "index id '{}' must be `collection/name`",
                raw.id
            )));
        }
        let index_type = raw.type_name.parse()?;

        Ok(Self {
            id: raw.id,
            index_type,
            fields: raw.fields,
            unique: raw.unique,
            sparse: raw.sparse,
            deduplicate: raw.deduplicate,
            geo_json: raw.geo_json,
            min_length: raw.min_length,
        })
    }

    /// Full id, `collection/name`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the index within its collection
    pub fn name(&self) -> &str {
        self.id.split_once('/').map(|(_, name)| name).unwrap_or(self.id.as_str())
    }

    /// Collection the index belongs to
    pub fn collection(&self) -> &str {
        self.id.split_once('/').map(|(col, _)| col).unwrap_or("")
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_unique(&self) -> bool {
        self.unique.unwrap_or(false)
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse.unwrap_or(false)
    }

    pub fn is_deduplicate(&self) -> bool {
        self.deduplicate.unwrap_or(false)
    }

    /// GeoJSON coordinate order flag, only meaningful for geo indexes
    pub fn is_geo_json(&self) -> bool {
        self.geo_json.unwrap_or(false)
    }

    /// Minimum word length, only meaningful for fulltext indexes
    pub fn min_length(&self) -> u32 {
        self.min_length
    }
}
