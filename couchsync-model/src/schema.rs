use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Declares the fields an entity type carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: Vec<FieldDefinition>,
}

impl EntitySchema {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field declaration.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks up a declared field by name.
    pub fn definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn decimal(name: &str) -> Self {
        Self::new(name, FieldType::Decimal)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    pub fn reference(name: &str) -> Self {
        Self::new(name, FieldType::Reference)
    }

    pub fn structure(name: &str) -> Self {
        Self::new(name, FieldType::Structure)
    }

    pub fn list(name: &str) -> Self {
        Self::new(name, FieldType::List)
    }

    /// A field whose type is defined by a plugin.
    pub fn custom(name: &str, field_type: &str) -> Self {
        Self::new(name, FieldType::Custom(field_type.to_string()))
    }
}

/// The declared type of a field. Flatteners are registered against these.
///
/// Serialized as a bare string (`"text"`, `"commerce_price"`, ...) so that
/// plugin-defined types need no wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Reference,
    Structure,
    List,
    Custom(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Reference => "reference",
            Self::Structure => "structure",
            Self::List => "list",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => Self::Text,
            "integer" => Self::Integer,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "datetime" => Self::DateTime,
            "reference" => Self::Reference,
            "structure" => Self::Structure,
            "list" => Self::List,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for FieldType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<FieldType> for String {
    fn from(ft: FieldType) -> Self {
        ft.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schemas for every entity type the primary store exposes.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema, replacing (and returning) any previous one for the type.
    pub fn insert(&mut self, schema: EntitySchema) -> Option<EntitySchema> {
        self.schemas.insert(schema.entity_type.clone(), schema)
    }

    /// Builder-style insert.
    pub fn with(mut self, schema: EntitySchema) -> Self {
        self.insert(schema);
        self
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
