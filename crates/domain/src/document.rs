//! Document model, canonical metadata JSON, and SQL escaping helpers.

use crate::{CollectionName, DocumentId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: identity, content, and optional metadata.
///
/// The embedding is derived and never part of the relational row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, unique within its collection.
    pub id: DocumentId,
    /// Collection the document belongs to.
    pub collection: CollectionName,
    /// Text content.
    pub content: String,
    /// Arbitrary JSON-object metadata (scalars or nested JSON values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Identity of a document without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Collection the document belongs to.
    pub collection: CollectionName,
    /// Document identifier.
    pub id: DocumentId,
}

impl Document {
    /// Return the identity portion of this document.
    #[must_use]
    pub fn as_ref_key(&self) -> DocumentRef {
        DocumentRef {
            collection: self.collection.clone(),
            id: self.id.clone(),
        }
    }

    /// Canonical metadata serialization for change comparison.
    ///
    /// `None` canonicalizes to the empty string so that "no metadata" and
    /// "metadata removed" compare equal.
    #[must_use]
    pub fn canonical_metadata(&self) -> String {
        self.metadata
            .as_ref()
            .map(canonicalize_json)
            .unwrap_or_default()
    }
}

/// Canonicalize a JSON value: object keys sorted recursively, compact
/// serialization (no insignificant whitespace).
///
/// Two metadata payloads that differ only in key order or whitespace
/// canonicalize to the same text, which keeps change detection stable.
#[must_use]
pub fn canonicalize_json(value: &Value) -> String {
    sort_value(value).to_string()
}

/// Compare two optional metadata payloads by canonical form.
#[must_use]
pub fn metadata_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    let canonical = |value: Option<&Value>| value.map(canonicalize_json).unwrap_or_default();
    canonical(left) == canonical(right)
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            // serde_json's default map preserves insertion order; rebuild in
            // key order so serialization is deterministic.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, entry) in entries {
                sorted.insert(key.clone(), sort_value(entry));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// Escape a string value for embedding in a single-quoted SQL literal.
///
/// Single quotes are doubled per the SQL standard.
#[must_use]
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escape a JSON payload for embedding in a single-quoted SQL literal.
///
/// Backslashes are doubled first (the SQL parser consumes one level of
/// backslash escaping before the JSON parser sees the remainder), then
/// single quotes are doubled.
#[must_use]
pub fn escape_sql_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}
