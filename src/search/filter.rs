//! Metadata filtering for search candidates.
//!
//! A filter is a predicate over an item's optional metadata payload,
//! applied after candidate selection and before scoring. Any closure of
//! the right shape is a filter.

use serde_json::Value;

/// Candidate predicate over item metadata.
pub trait MetadataFilter {
    /// Returns `true` to keep the candidate.
    fn keep(&self, metadata: Option<&Value>) -> bool;
}

impl<F> MetadataFilter for F
where
    F: Fn(Option<&Value>) -> bool,
{
    fn keep(&self, metadata: Option<&Value>) -> bool {
        self(metadata)
    }
}

/// Keeps items whose metadata has `field == expected`.
///
/// Items without metadata, or without the field, are dropped.
#[derive(Debug, Clone)]
pub struct FieldEquals {
    field: String,
    expected: Value,
}

impl FieldEquals {
    pub fn new(field: impl Into<String>, expected: Value) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }
}

impl MetadataFilter for FieldEquals {
    fn keep(&self, metadata: Option<&Value>) -> bool {
        metadata
            .and_then(|m| m.get(&self.field))
            .is_some_and(|v| *v == self.expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_filter() {
        let filter = |metadata: Option<&Value>| metadata.is_some();
        assert!(filter.keep(Some(&json!({}))));
        assert!(!filter.keep(None));
    }

    #[test]
    fn test_field_equals() {
        let filter = FieldEquals::new("category", json!("cleaning"));
        assert!(filter.keep(Some(&json!({"category": "cleaning"}))));
        assert!(!filter.keep(Some(&json!({"category": "electronics"}))));
        assert!(!filter.keep(Some(&json!({"other": 1}))));
        assert!(!filter.keep(None));
    }
}
