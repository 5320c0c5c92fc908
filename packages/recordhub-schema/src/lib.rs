pub mod error;
pub mod field;
pub mod registry;
pub mod schema;

pub use error::SchemaError;
pub use field::{FieldDef, FieldType};
pub use registry::Registry;
pub use schema::{Schema, ValidationIssue};
