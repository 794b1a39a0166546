use couchsync_types::UnixTimestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names owned by the document hooks. Flattening never writes them.
pub const RESERVED_FIELDS: [&str; 2] = ["created", "changed"];

/// A flat, JSON-compatible representation of one entity.
///
/// Serializes as a single JSON object: the flattened fields plus `created`
/// and `changed` when set. Equal documents always serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<UnixTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<UnixTimestamp>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl FlatDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved(name: &str) -> bool {
        RESERVED_FIELDS.contains(&name)
    }

    /// Sets a field, returning the previous value. Reserved names are
    /// routed to the timestamp slots when the value is an integer and
    /// ignored otherwise.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match name.as_str() {
            "created" => {
                self.created = value.as_i64().map(UnixTimestamp::from_secs);
                None
            }
            "changed" => {
                self.changed = value.as_i64().map(UnixTimestamp::from_secs);
                None
            }
            _ => self.fields.insert(name, value),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Flattened (non-reserved) fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of flattened fields, excluding `created`/`changed`.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Same fields, ignoring the hook-owned timestamps.
    pub fn same_fields(&self, other: &Self) -> bool {
        self.fields == other.fields
    }

    /// Converts to a JSON object.
    pub fn to_json(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Builds a document from a JSON object.
    pub fn from_json(object: Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(object))
    }
}
