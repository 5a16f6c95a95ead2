/// Document key rules
///
/// Keys are checked against the server's key grammar before they are put on
/// the wire, and escaped when they become part of a request path.

use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Longest key the server accepts, in bytes
pub const MAX_KEY_LENGTH: usize = 254;

lazy_static! {
    static ref KEY_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_\-:.@()+,=;$!*'%]+$").expect("key pattern is valid");
}

/// Check a document key against the key grammar.
///
/// Empty keys, keys over [`MAX_KEY_LENGTH`] bytes and keys with characters
/// outside `[A-Za-z0-9_-:.@()+,=;$!*'%]` fail with [`Error::InvalidKey`].
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(Error::InvalidKey(format!(
            "key is {} bytes long, maximum is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    if !KEY_PATTERN.is_match(key) {
        return Err(Error::InvalidKey(format!(
            "key '{}' contains characters outside the allowed set",
            key
        )));
    }
    Ok(())
}

/// Percent-encode a key for use as a single path segment.
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                escaped.push(byte as char)
            }
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }
    escaped
}
