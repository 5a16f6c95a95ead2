/// Key extraction for documents that carry their own `_key`
///
/// Typed documents reach this through serde: a struct field serialized as
/// `_key` (usually `#[serde(rename = "_key")]`) is the identifying field.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Name of the attribute holding a document's key
pub const KEY_ATTRIBUTE: &str = "_key";

/// A value that can name the key of the document it represents.
pub trait HasKey {
    /// Returns the document key, or [`Error::InvalidArgument`] when the value
    /// has no usable `_key`.
    fn document_key(&self) -> Result<String>;
}

impl HasKey for Map<String, Value> {
    fn document_key(&self) -> Result<String> {
        match self.get(KEY_ATTRIBUTE) {
            None | Some(Value::Null) => Err(Error::InvalidArgument(
                "document contains no '_key' entry".to_string(),
            )),
            Some(Value::String(key)) => Ok(key.clone()),
            Some(other) => Err(Error::InvalidArgument(format!(
                "document '_key' must be a string, got {}",
                kind_of(other)
            ))),
        }
    }
}

impl HasKey for Value {
    fn document_key(&self) -> Result<String> {
        match self {
            Value::Object(map) => map.document_key(),
            other => Err(Error::InvalidArgument(format!(
                "document must be an object, got {}",
                kind_of(other)
            ))),
        }
    }
}

/// Human readable name of a JSON value's shape, used in error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
