//! Unique compound index over document fields

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use rulestore_common::error::{Result, StorageError};

/// Unique index definition, keyed in field order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIndex {
    fields: Vec<String>,
}

impl UniqueIndex {
    /// Create an index over `fields`
    pub fn new(fields: &[&str]) -> Result<Self> {
        if fields.is_empty() {
            return Err(StorageError::WriteFailed(
                "unique index needs at least one field".to_string(),
            )
            .into());
        }
        Ok(Self {
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        })
    }

    /// Indexed field names
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Conventional index name, e.g. `ptype_1_v0_1`
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_1", f))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Binary index key for a document.
    ///
    /// Each field contributes a type marker and a u64 length-prefixed value so
    /// distinct field tuples never encode to the same key.
    pub fn key(&self, doc: &Document) -> Vec<u8> {
        let mut key = Vec::new();
        for field in &self.fields {
            let (marker, text) = match doc.get(field) {
                None | Some(Bson::Null) => (b'n', String::new()),
                Some(Bson::String(s)) => (b's', s.clone()),
                Some(other) => (b'o', other.to_string()),
            };
            key.push(marker);
            let len = u64::try_from(text.len()).unwrap_or(u64::MAX);
            key.extend_from_slice(&len.to_be_bytes());
            key.extend_from_slice(text.as_bytes());
        }
        key
    }

    /// Human-readable description of the indexed values in `doc`
    pub fn describe(&self, doc: &Document) -> String {
        self.fields
            .iter()
            .map(|f| match doc.get(f) {
                Some(Bson::String(s)) => format!("{}: {:?}", f, s),
                Some(other) => format!("{}: {}", f, other),
                None => format!("{}: null", f),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Error reported when `doc` collides with an indexed row
    pub fn duplicate(&self, doc: &Document) -> rulestore_common::Error {
        StorageError::DuplicateKey(format!(
            "index {} dup key {{ {} }}",
            self.name(),
            self.describe(doc)
        ))
        .into()
    }
}
