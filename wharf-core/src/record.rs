//! Schemaless documents and stored records

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RecordId, ValidationError};

/// Ordered field map of a document. Insertion order is preserved.
pub type Fields = serde_json::Map<String, Value>;

/// Reserved field name carrying the record id in JSON form.
pub const ID_FIELD: &str = "id";

/// True when a field is absent, null, or an empty string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// A document as submitted by a caller, before the store has accepted it.
///
/// The id is optional: when absent the store assigns one on insert.
/// `fields` never contains the reserved `id` key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    id: Option<RecordId>,
    fields: Fields,
}

impl Document {
    pub fn new(mut fields: Fields) -> Self {
        fields.shift_remove(ID_FIELD);
        Self { id: None, fields }
    }

    pub fn with_id(id: RecordId, fields: Fields) -> Self {
        let mut doc = Self::new(fields);
        doc.id = Some(id);
        doc
    }

    /// Build a document from a JSON body.
    ///
    /// The body must be an object. A non-empty string `id` becomes the
    /// caller-supplied id; `id` of any other type is rejected.
    pub fn from_json(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(mut fields) = value else {
            return Err(ValidationError::InvalidValue {
                field: "body".to_string(),
                reason: "expected a JSON object".to_string(),
            });
        };

        let id = match fields.shift_remove(ID_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(RecordId::new(s)),
            Some(_) => {
                return Err(ValidationError::InvalidValue {
                    field: ID_FIELD.to_string(),
                    reason: "must be a string".to_string(),
                })
            }
        };

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field. Writing the reserved `id` key is ignored.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value);
        }
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// First field from `required` that is blank, if any.
    pub fn first_missing<'a>(&self, required: &[&'a str]) -> Option<&'a str> {
        required
            .iter()
            .copied()
            .find(|field| is_blank(self.fields.get(*field)))
    }

    pub fn into_parts(self) -> (Option<RecordId>, Fields) {
        (self.id, self.fields)
    }

    /// Attach an id, turning the document into a stored record.
    pub fn into_record(self, id: RecordId) -> Record {
        Record::new(id, self.fields)
    }
}

/// A document as held by the store: an id plus its fields.
///
/// Serializes as a flat JSON object with `id` first, followed by the
/// fields in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    #[serde(flatten)]
    fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, mut fields: Fields) -> Self {
        fields.shift_remove(ID_FIELD);
        Self { id, fields }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Drop the named fields from the record, if present.
    pub fn without_fields(mut self, hidden: &[&str]) -> Self {
        for field in hidden {
            self.fields.shift_remove(*field);
        }
        self
    }

    pub fn into_parts(self) -> (RecordId, Fields) {
        (self.id, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!(""))));
        assert!(!is_blank(Some(&json!("x"))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
    }

    #[test]
    fn test_document_from_json_takes_string_id() -> Result<(), ValidationError> {
        let doc = Document::from_json(json!({"id": "p-1", "portCode": "NLRTM"}))?;
        assert_eq!(doc.id(), Some(&RecordId::new("p-1")));
        assert!(doc.get(ID_FIELD).is_none());
        assert_eq!(doc.get("portCode"), Some(&json!("NLRTM")));
        Ok(())
    }

    #[test]
    fn test_document_from_json_rejects_non_object() {
        let err = Document::from_json(json!(["not", "an", "object"]));
        assert!(matches!(err, Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_document_from_json_rejects_numeric_id() {
        let err = Document::from_json(json!({"id": 7}));
        assert!(matches!(
            err,
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_document_set_ignores_id() {
        let mut doc = Document::default();
        doc.set("id", json!("sneaky"));
        doc.set("roleName", json!("admin"));
        assert!(doc.id().is_none());
        assert_eq!(doc.fields().len(), 1);
    }

    #[test]
    fn test_first_missing_reports_in_order() {
        let doc = Document::new(fields(json!({"portName": "", "portCode": "X"})));
        assert_eq!(
            doc.first_missing(&["portCode", "portName", "connectionType"]),
            Some("portName")
        );
        assert_eq!(doc.first_missing(&["portCode"]), None);
    }

    #[test]
    fn test_record_serializes_flat_with_id_first() -> Result<(), serde_json::Error> {
        let record = Record::new(
            RecordId::new("r1"),
            fields(json!({"roleName": "admin", "isActive": true})),
        );
        let text = serde_json::to_string(&record)?;
        assert_eq!(text, r#"{"id":"r1","roleName":"admin","isActive":true}"#);
        Ok(())
    }

    #[test]
    fn test_record_new_strips_embedded_id() {
        let record = Record::new(RecordId::new("real"), fields(json!({"id": "fake", "a": 1})));
        assert_eq!(record.id().as_str(), "real");
        assert!(record.get("id").is_none());
    }

    #[test]
    fn test_without_fields_redacts() {
        let record = Record::new(
            RecordId::new("u1"),
            fields(json!({"name": "A", "password": "hash"})),
        );
        let redacted = record.without_fields(&["password"]);
        assert!(redacted.get("password").is_none());
        assert_eq!(redacted.get("name"), Some(&json!("A")));
    }

    fn keys(fields: &Fields) -> Vec<&str> {
        fields.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_id_removal_keeps_field_order() -> Result<(), ValidationError> {
        let body = json!({"id": "x", "a": 1, "b": 2, "c": 3});

        let parsed = Document::from_json(body.clone())?;
        assert_eq!(keys(parsed.fields()), vec!["a", "b", "c"]);

        let built = Document::new(fields(body.clone()));
        assert_eq!(keys(built.fields()), vec!["a", "b", "c"]);

        let record = Record::new(RecordId::new("x"), fields(body));
        assert_eq!(keys(record.fields()), vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn test_field_removal_keeps_order() {
        let mut doc = Document::new(fields(json!({
            "password": "p",
            "name": "A",
            "email": "e",
            "phone": "1",
        })));
        assert_eq!(doc.remove("password"), Some(json!("p")));
        assert_eq!(keys(doc.fields()), vec!["name", "email", "phone"]);

        let record = Record::new(
            RecordId::new("u1"),
            fields(json!({"password": "h", "name": "A", "email": "e", "phone": "1"})),
        )
        .without_fields(&["password"]);
        assert_eq!(keys(record.fields()), vec!["name", "email", "phone"]);
    }

    proptest! {
        #[test]
        fn prop_record_json_preserves_fields(
            id in "[a-z0-9]{1,12}",
            entries in proptest::collection::btree_map("[a-zA-Z]{1,8}", any::<i64>(), 0..6),
        ) {
            let mut map = Fields::new();
            for (k, v) in entries {
                map.insert(k, json!(v));
            }
            let record = Record::new(RecordId::new(id), map);
            let text = serde_json::to_string(&record).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let back: Record = serde_json::from_str(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(back, record);
        }
    }
}
