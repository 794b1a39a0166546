use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A link from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity_type: String,
    pub id: String,
}

impl EntityReference {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

/// A typed field value as held by the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Structure(BTreeMap<String, FieldValue>),
    DateTime(DateTime<Utc>),
    Reference(EntityReference),
}

impl FieldValue {
    /// True when the value maps onto JSON without a flattener: scalars,
    /// finite floats, and lists/structures made only of such values.
    pub fn is_primitive(&self) -> bool {
        match self {
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::Text(_) => true,
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Self::is_primitive),
            Self::Structure(map) => map.values().all(Self::is_primitive),
            Self::DateTime(_) | Self::Reference(_) => false,
        }
    }

    /// Copies a primitive value into JSON. Returns `None` for values that
    /// need a flattener.
    pub fn to_primitive_json(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Integer(i) => Some(Value::from(*i)),
            Self::Float(f) => Number::from_f64(*f).map(Value::Number),
            Self::Text(s) => Some(Value::String(s.clone())),
            Self::List(items) => items
                .iter()
                .map(Self::to_primitive_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Structure(map) => map
                .iter()
                .map(|(k, v)| v.to_primitive_json().map(|j| (k.clone(), j)))
                .collect::<Option<Map<String, Value>>>()
                .map(Value::Object),
            Self::DateTime(_) | Self::Reference(_) => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Structure(_) => "structure",
            Self::DateTime(_) => "datetime",
            Self::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<EntityReference> for FieldValue {
    fn from(r: EntityReference) -> Self {
        Self::Reference(r)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}
