//! Field descriptors (§3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The primitive type a field's values must match.
///
/// `System` fields (`id`, `created`, `updated`, `_version`) are not
/// type-checked by `Registry::validate` — the engine computes and
/// stamps them itself, so by the time a record reaches validation
/// they're already well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    System,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::System => true,
        }
    }
}

/// One field's shape and constraints within a collection's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            indexed: false,
            private: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    fn system(name: &str) -> Self {
        let mut f = Self::new(name, FieldType::System);
        if name == "updated" {
            f.indexed = true;
        }
        f
    }
}

/// The three system fields every schema carries, in order.
pub fn system_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::system("id"),
        FieldDef::system("created"),
        FieldDef::system("updated"),
    ]
}
