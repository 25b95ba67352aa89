//! Client-supplied per-file metadata ("descriptors").
//!
//! The `descriptors` form field carries a JSON array of objects, each tagged
//! with a `filename` the client expects to upload. The index stores the
//! remaining fields keyed by a SHA-256 digest of the trimmed filename, so the
//! raw untrusted string is never used as a map key. Reserved keys are
//! stripped at ingestion time; the pipeline writes those fields itself and a
//! client value must never shadow them.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Keys the pipeline owns in every result record. Client descriptors are
/// stripped of these before they are stored.
pub const RESERVED_KEYS: [&str; 5] = ["filename", "processable", "error", "tempfile", "status"];

/// Arbitrary client metadata attached to one filename, reserved keys removed.
pub type Descriptor = Map<String, Value>;

/// The `descriptors` field was present but not a JSON array of objects.
///
/// Unlike option parsing this is a hard failure: a malformed descriptor body
/// signals a malformed request, not an absent optional field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid descriptors JSON.")]
pub struct DescriptorParseError;

/// Per-filename descriptor lookup for one batch.
#[derive(Debug, Default)]
pub struct DescriptorIndex {
    entries: HashMap<String, Descriptor>,
}

fn filename_key(filename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.trim().as_bytes());
    hex::encode(hasher.finalize())
}

impl DescriptorIndex {
    /// Parse the optional `descriptors` form field.
    ///
    /// `None` or an empty body yields an empty index. A body that is not
    /// valid JSON, or whose root is not an array, fails the whole request.
    /// Array elements without a string `filename` are skipped; duplicate
    /// filenames resolve last-one-wins.
    pub fn parse(body: Option<&str>) -> Result<Self, DescriptorParseError> {
        let Some(body) = body.map(str::trim).filter(|b| !b.is_empty()) else {
            return Ok(Self::default());
        };

        let root: Value = serde_json::from_str(body).map_err(|_| DescriptorParseError)?;
        let Value::Array(elements) = root else {
            return Err(DescriptorParseError);
        };

        let mut entries = HashMap::new();
        for element in elements {
            let Value::Object(mut fields) = element else {
                continue;
            };
            let Some(Value::String(filename)) = fields.get("filename").cloned() else {
                continue;
            };
            for key in RESERVED_KEYS {
                fields.remove(key);
            }
            entries.insert(filename_key(&filename), fields);
        }

        Ok(Self { entries })
    }

    /// Exact-match lookup by original filename (same trim normalization as
    /// indexing). Misses yield an empty descriptor.
    pub fn lookup(&self, filename: &str) -> Descriptor {
        self.entries
            .get(&filename_key(filename))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
