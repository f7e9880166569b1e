//! Partial-match selectors for filtered rule removal

use bson::Document;

use crate::row::{MAX_FIELDS, PTYPE_FIELD, SLOT_FIELDS};

/// Exact-match conjunction over the type tag and a subset of slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    ptype: String,
    slots: [Option<String>; MAX_FIELDS],
}

impl Selector {
    /// Build a selector from a sparse, offset list of field values.
    ///
    /// `field_values[0]` lines up with slot `field_index`. Slots outside
    /// the supplied range, and supplied values that are empty, stay
    /// unconstrained. `field_index` may be negative; values that land before
    /// slot 0 or after slot 5 are ignored. The type tag is always constrained.
    pub fn build<S: AsRef<str>>(ptype: &str, field_index: isize, field_values: &[S]) -> Self {
        let mut slots: [Option<String>; MAX_FIELDS] = Default::default();

        for (slot, constraint) in slots.iter_mut().enumerate() {
            let Ok(position) = isize::try_from(slot) else {
                continue;
            };
            let value = position
                .checked_sub(field_index)
                .and_then(|offset| usize::try_from(offset).ok())
                .and_then(|offset| field_values.get(offset))
                .map(AsRef::as_ref);

            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *constraint = Some(value.to_string());
            }
        }

        Self {
            ptype: ptype.to_string(),
            slots,
        }
    }

    /// Constrained rule type
    pub fn ptype(&self) -> &str {
        &self.ptype
    }

    /// Required value for a slot, `None` when unconstrained
    pub fn slot(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(Option::as_deref)
    }

    /// Constrained slots as `(index, value)` pairs
    pub fn constrained(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_deref().map(|v| (i, v)))
    }

    /// Store selector: `ptype` plus one equality per constrained slot
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(PTYPE_FIELD, self.ptype.as_str());
        for (index, value) in self.constrained() {
            doc.insert(SLOT_FIELDS[index], value);
        }
        doc
    }
}
