//! Per-collection schema (§3, §4.3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::field::{system_fields, FieldDef, FieldType};

/// An ordered list of field descriptors for one collection, always
/// including the three system fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Builds a schema from caller-supplied fields, prepending the
    /// system fields if the caller didn't include them (§4.3: "Fills
    /// in the three system fields if missing").
    pub fn new(mut fields: Vec<FieldDef>) -> Self {
        for sys in system_fields().into_iter().rev() {
            if !fields.iter().any(|f| f.name == sys.name) {
                fields.insert(0, sys);
            }
        }
        Self { fields }
    }

    /// The schema auto-materialized for `users` and any other
    /// superuser-like collection on first reference (§4.3): `email`
    /// (required, indexed, unique) and `password` (required, private),
    /// plus the system fields.
    pub fn auth_collection_default() -> Self {
        Self::new(vec![
            FieldDef::new("email", FieldType::String)
                .required()
                .unique()
                .indexed(),
            FieldDef::new("password", FieldType::String)
                .required()
                .private(),
        ])
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.indexed)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn private_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.private)
            .map(|f| f.name.clone())
            .collect()
    }

    /// One issue found while validating a payload against this schema.
    pub fn validate(&self, record: &Map<String, Value>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for field in &self.fields {
            if field.field_type == FieldType::System {
                continue;
            }
            match record.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        issues.push(ValidationIssue {
                            field: field.name.clone(),
                            message: "required field is missing".to_string(),
                        });
                    }
                }
                Some(value) => {
                    if !field.field_type.matches(value) {
                        issues.push(ValidationIssue {
                            field: field.name.clone(),
                            message: format!(
                                "expected {:?}, got {}",
                                field.field_type,
                                type_name(value)
                            ),
                        });
                    }
                }
            }
        }
        issues
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("schema serializes to valid JSON")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_schema_always_has_system_fields() {
        let schema = Schema::new(vec![FieldDef::new("title", FieldType::String)]);
        assert!(schema.field("id").is_some());
        assert!(schema.field("created").is_some());
        assert!(schema.field("updated").is_some());
        assert!(schema.field("updated").unwrap().indexed);
    }

    #[test]
    fn required_field_missing_is_an_issue() {
        let schema = Schema::new(vec![FieldDef::new("title", FieldType::String).required()]);
        let issues = schema.validate(&Map::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "title");
    }

    #[test]
    fn type_mismatch_is_an_issue() {
        let schema = Schema::new(vec![FieldDef::new("age", FieldType::Number)]);
        let mut record = Map::new();
        record.insert("age".to_string(), Value::String("old".to_string()));
        let issues = schema.validate(&record);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn non_required_absent_field_is_fine() {
        let schema = Schema::new(vec![FieldDef::new("nickname", FieldType::String)]);
        let issues = schema.validate(&Map::new());
        assert!(issues.is_empty());
    }

    #[test]
    fn auth_default_has_email_and_password() {
        let schema = Schema::auth_collection_default();
        let email = schema.field("email").unwrap();
        assert!(email.required && email.unique && email.indexed);
        let password = schema.field("password").unwrap();
        assert!(password.required && password.private);
    }
}
