//! Built-in flatteners for the standard field types.
//!
//! Scalars are type-checked and copied. Datetimes become Unix seconds and
//! entity references become the referenced entity's id, so no live
//! reference survives into the document. Multi-value fields (lists) are
//! flattened element-wise by the flattener of their declared type.

use crate::registry::{FieldFlattener, FlattenerDescriptor};
use couchsync_model::{FieldType, FieldValue};
use serde_json::{Map, Number, Value};
use std::sync::Arc;

pub const TEXT: &str = "couchsync::builtin::text";
pub const INTEGER: &str = "couchsync::builtin::integer";
pub const DECIMAL: &str = "couchsync::builtin::decimal";
pub const BOOLEAN: &str = "couchsync::builtin::boolean";
pub const DATETIME: &str = "couchsync::builtin::datetime";
pub const REFERENCE: &str = "couchsync::builtin::reference";
pub const STRUCTURE: &str = "couchsync::builtin::structure";
pub const LIST: &str = "couchsync::builtin::list";

/// Converts any value to JSON, resolving datetimes and references.
pub fn resolve_value(value: &FieldValue) -> Result<Value, String> {
    match value {
        FieldValue::Null => Ok(Value::Null),
        FieldValue::Bool(b) => Ok(Value::Bool(*b)),
        FieldValue::Integer(i) => Ok(Value::from(*i)),
        FieldValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite number {f}")),
        FieldValue::Text(s) => Ok(Value::String(s.clone())),
        FieldValue::DateTime(dt) => Ok(Value::from(dt.timestamp())),
        FieldValue::Reference(r) => Ok(Value::String(r.id.clone())),
        FieldValue::List(items) => items
            .iter()
            .map(resolve_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldValue::Structure(map) => map
            .iter()
            .map(|(k, v)| resolve_value(v).map(|j| (k.clone(), j)))
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
    }
}

/// Flattens values of one expected kind, element-wise through lists.
pub struct TypedFlattener {
    field_type: FieldType,
    expected: &'static str,
    matches: fn(&FieldValue) -> bool,
}

impl TypedFlattener {
    pub fn text() -> Self {
        Self {
            field_type: FieldType::Text,
            expected: "text",
            matches: |v| matches!(v, FieldValue::Text(_)),
        }
    }

    pub fn integer() -> Self {
        Self {
            field_type: FieldType::Integer,
            expected: "integer",
            matches: |v| matches!(v, FieldValue::Integer(_)),
        }
    }

    pub fn decimal() -> Self {
        Self {
            field_type: FieldType::Decimal,
            expected: "number",
            matches: |v| matches!(v, FieldValue::Float(_) | FieldValue::Integer(_)),
        }
    }

    pub fn boolean() -> Self {
        Self {
            field_type: FieldType::Boolean,
            expected: "bool",
            matches: |v| matches!(v, FieldValue::Bool(_)),
        }
    }

    pub fn datetime() -> Self {
        Self {
            field_type: FieldType::DateTime,
            expected: "datetime",
            matches: |v| matches!(v, FieldValue::DateTime(_)),
        }
    }

    pub fn reference() -> Self {
        Self {
            field_type: FieldType::Reference,
            expected: "reference",
            matches: |v| matches!(v, FieldValue::Reference(_)),
        }
    }

    fn flatten_typed(&self, value: &FieldValue) -> Result<Value, String> {
        match value {
            FieldValue::Null => Ok(Value::Null),
            FieldValue::List(items) => items
                .iter()
                .map(|item| self.flatten_typed(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            v if (self.matches)(v) => resolve_value(v),
            other => Err(format!("expected {}, got {}", self.expected, other.kind())),
        }
    }
}

impl FieldFlattener for TypedFlattener {
    fn accepts(&self, field_type: &FieldType) -> bool {
        *field_type == self.field_type
    }

    fn flatten(&self, value: &FieldValue) -> Result<Value, String> {
        self.flatten_typed(value)
    }
}

/// Nested structures and untyped lists: resolved recursively.
pub struct StructureFlattener;

impl FieldFlattener for StructureFlattener {
    fn accepts(&self, field_type: &FieldType) -> bool {
        matches!(field_type, FieldType::Structure | FieldType::List)
    }

    fn flatten(&self, value: &FieldValue) -> Result<Value, String> {
        resolve_value(value)
    }
}

fn entry(
    path: &'static str,
    handler: impl FieldFlattener + 'static,
) -> (&'static str, Arc<dyn FieldFlattener>) {
    (path, Arc::new(handler))
}

/// Handler path and instance for every built-in flattener.
pub fn handlers() -> Vec<(&'static str, Arc<dyn FieldFlattener>)> {
    vec![
        entry(TEXT, TypedFlattener::text()),
        entry(INTEGER, TypedFlattener::integer()),
        entry(DECIMAL, TypedFlattener::decimal()),
        entry(BOOLEAN, TypedFlattener::boolean()),
        entry(DATETIME, TypedFlattener::datetime()),
        entry(REFERENCE, TypedFlattener::reference()),
        entry(STRUCTURE, StructureFlattener),
        entry(LIST, StructureFlattener),
    ]
}

/// Wildcard descriptors for the standard field types.
pub fn descriptors() -> Vec<FlattenerDescriptor> {
    let table: [(&str, &str, FieldType, &str); 8] = [
        ("text", "Plain and formatted text", FieldType::Text, TEXT),
        ("integer", "Whole numbers", FieldType::Integer, INTEGER),
        ("decimal", "Decimal and float numbers", FieldType::Decimal, DECIMAL),
        ("boolean", "True/false values", FieldType::Boolean, BOOLEAN),
        ("datetime", "Dates as Unix seconds", FieldType::DateTime, DATETIME),
        ("reference", "Entity references as referenced ids", FieldType::Reference, REFERENCE),
        ("structure", "Nested field structures", FieldType::Structure, STRUCTURE),
        ("list", "Untyped multi-value fields", FieldType::List, LIST),
    ];
    let handlers = handlers();

    table
        .into_iter()
        .filter_map(|(name, description, field_type, path)| {
            handlers
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, handler)| {
                    FlattenerDescriptor::new(name, description, field_type, Arc::clone(handler))
                        .with_handler_path(path)
                })
        })
        .collect()
}
