//! Fixed-width stored form of a policy rule

use std::fmt;

use bson::{Bson, Document};

use rulestore_common::error::{Result, StorageError};

/// Number of field slots a stored rule carries
pub const MAX_FIELDS: usize = 6;

/// Column holding the rule type tag
pub const PTYPE_FIELD: &str = "ptype";

/// Columns holding the rule fields, in order
pub const SLOT_FIELDS: [&str; MAX_FIELDS] = ["v0", "v1", "v2", "v3", "v4", "v5"];

/// Every column; the unique index covers all of them
pub const INDEX_FIELDS: [&str; MAX_FIELDS + 1] = ["ptype", "v0", "v1", "v2", "v3", "v4", "v5"];

/// One stored rule: a type tag plus six slots, empty slots as `""`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RuleRow {
    pub ptype: String,
    pub slots: [String; MAX_FIELDS],
}

impl RuleRow {
    /// Row with the given type tag and every slot empty
    pub fn new(ptype: impl Into<String>) -> Self {
        Self {
            ptype: ptype.into(),
            slots: Default::default(),
        }
    }

    /// Slot value, `None` when out of range
    pub fn slot(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(String::as_str)
    }

    /// True when some non-empty slot follows an empty one
    pub fn is_sparse(&self) -> bool {
        match self.slots.iter().position(String::is_empty) {
            Some(first_empty) => self.slots[first_empty..].iter().any(|s| !s.is_empty()),
            None => false,
        }
    }

    /// Stored document: the type tag and all six slots
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(PTYPE_FIELD, self.ptype.as_str());
        for (name, value) in SLOT_FIELDS.iter().zip(&self.slots) {
            doc.insert(*name, value.as_str());
        }
        doc
    }

    /// Selector matching exactly this row, empty slots included
    pub fn exact_filter(&self) -> Document {
        self.to_document()
    }

    /// Read a stored document.
    ///
    /// Missing or `null` slots read as empty; other fields (such as `_id`)
    /// are ignored.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let ptype = match doc.get(PTYPE_FIELD) {
            Some(Bson::String(s)) => s.clone(),
            Some(other) => return Err(corrupt(PTYPE_FIELD, other)),
            None => {
                return Err(StorageError::CorruptData(format!(
                    "rule document without {}",
                    PTYPE_FIELD
                ))
                .into())
            }
        };

        let mut row = RuleRow::new(ptype);
        for (slot, name) in row.slots.iter_mut().zip(SLOT_FIELDS) {
            match doc.get(name) {
                Some(Bson::String(s)) => slot.clone_from(s),
                None | Some(Bson::Null) => {}
                Some(other) => return Err(corrupt(name, other)),
            }
        }
        Ok(row)
    }
}

impl fmt::Display for RuleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ptype)?;
        for value in self.slots.iter().take_while(|s| !s.is_empty()) {
            write!(f, ", {}", value)?;
        }
        Ok(())
    }
}

fn corrupt(field: &str, value: &Bson) -> rulestore_common::Error {
    StorageError::CorruptData(format!(
        "rule field {} holds {:?}, expected a string",
        field,
        value.element_type()
    ))
    .into()
}
