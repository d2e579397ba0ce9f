//! Query filters understood by every document store

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Record, RecordId};

/// Selection predicate for store lookups.
///
/// Field comparison is exact JSON equality on a top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// Every record in the collection.
    All,
    /// The record with this id.
    Id(RecordId),
    /// Records whose `field` equals `value`.
    FieldEq { field: String, value: Value },
}

impl Filter {
    pub fn id(id: impl Into<RecordId>) -> Self {
        Filter::Id(id.into())
    }

    pub fn field_eq(field: impl Into<String>, value: Value) -> Self {
        Filter::FieldEq {
            field: field.into(),
            value,
        }
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => record.id() == id,
            Filter::FieldEq { field, value } => record.get(field) == Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fields;
    use serde_json::json;

    fn port(id: &str, code: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert("portCode".to_string(), json!(code));
        Record::new(RecordId::new(id), fields)
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(Filter::All.matches(&port("1", "NLRTM")));
    }

    #[test]
    fn test_id_filter() {
        let record = port("1", "NLRTM");
        assert!(Filter::id("1").matches(&record));
        assert!(!Filter::id("2").matches(&record));
    }

    #[test]
    fn test_field_eq_is_exact() {
        let record = port("1", "NLRTM");
        assert!(Filter::field_eq("portCode", json!("NLRTM")).matches(&record));
        assert!(!Filter::field_eq("portCode", json!("nlrtm")).matches(&record));
        assert!(!Filter::field_eq("portName", json!("NLRTM")).matches(&record));
    }
}
