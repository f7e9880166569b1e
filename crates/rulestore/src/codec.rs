//! Conversion between policy tuples and stored rows
//!
//! Encoding fills slots left to right. Decoding reads slots in order and
//! stops at the first empty one, so a stored row with a gap loses everything
//! after the gap. Rows written by older tools can look like that; the loss is
//! logged and counted, never raised.

use tracing::warn;

use rulestore_common::metrics;

use crate::row::{RuleRow, MAX_FIELDS};

/// Encode a rule tuple under `ptype`.
///
/// Fields beyond [`MAX_FIELDS`] are not stored.
pub fn encode<S: AsRef<str>>(ptype: &str, rule: &[S]) -> RuleRow {
    if rule.len() > MAX_FIELDS {
        warn!(
            ptype,
            fields = rule.len(),
            "rule has more than {} fields, extra fields are dropped",
            MAX_FIELDS
        );
    }

    let mut row = RuleRow::new(ptype);
    for (slot, value) in row.slots.iter_mut().zip(rule) {
        *slot = value.as_ref().to_string();
    }
    row
}

/// Decode a stored row into its rule tuple
pub fn decode(row: &RuleRow) -> Vec<String> {
    let len = row
        .slots
        .iter()
        .position(String::is_empty)
        .unwrap_or(MAX_FIELDS);

    if row.is_sparse() {
        warn!(
            ptype = %row.ptype,
            kept = len,
            slots = ?row.slots,
            "stored rule has a gap, fields after the first empty slot are dropped"
        );
        metrics::record_truncated_decode(&row.ptype);
    }

    row.slots[..len].to_vec()
}
