//! Document selector matching
//!
//! Selectors are BSON documents mapping a field name to either a plain value
//! (equality) or an operator document. Supported operators: `$eq`, `$ne`,
//! `$in`, `$nin`, `$exists`. All top-level entries must hold (conjunction).

use bson::{Bson, Document};

use rulestore_common::error::{Result, StorageError};

/// Check that every operator in `filter` is supported
pub fn validate(filter: &Document) -> Result<()> {
    for (field, condition) in filter {
        if field.starts_with('$') {
            return Err(invalid(format!("top-level operator {} is not supported", field)));
        }
        if let Some(ops) = operator_document(condition) {
            for (op, operand) in ops {
                match op.as_str() {
                    "$eq" | "$ne" => {}
                    "$in" | "$nin" => {
                        if !matches!(operand, Bson::Array(_)) {
                            return Err(invalid(format!("{} on '{}' needs an array", op, field)));
                        }
                    }
                    "$exists" => {
                        if !matches!(operand, Bson::Boolean(_)) {
                            return Err(invalid(format!("$exists on '{}' needs a boolean", field)));
                        }
                    }
                    other => {
                        return Err(invalid(format!("unsupported operator {} on '{}'", other, field)));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Evaluate a validated selector against a document.
///
/// An empty selector matches every document.
#[must_use]
pub fn matches(filter: &Document, doc: &Document) -> bool {
    filter
        .iter()
        .all(|(field, condition)| matches_condition(doc.get(field), condition))
}

fn matches_condition(actual: Option<&Bson>, condition: &Bson) -> bool {
    let Some(ops) = operator_document(condition) else {
        return values_equal(actual, condition);
    };

    ops.iter().all(|(op, operand)| match (op.as_str(), operand) {
        ("$eq", expected) => values_equal(actual, expected),
        ("$ne", expected) => !values_equal(actual, expected),
        ("$in", Bson::Array(options)) => options.iter().any(|v| values_equal(actual, v)),
        ("$nin", Bson::Array(options)) => !options.iter().any(|v| values_equal(actual, v)),
        ("$exists", Bson::Boolean(want)) => actual.is_some() == *want,
        _ => false,
    })
}

/// Missing fields compare equal to `null` and to the empty string, which is
/// how unused rule slots are stored.
fn values_equal(actual: Option<&Bson>, expected: &Bson) -> bool {
    match actual {
        Some(value) => value == expected,
        None => match expected {
            Bson::Null => true,
            Bson::String(s) => s.is_empty(),
            _ => false,
        },
    }
}

fn operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => Some(ops),
        _ => None,
    }
}

fn invalid(message: String) -> rulestore_common::Error {
    StorageError::InvalidFilter(message).into()
}
