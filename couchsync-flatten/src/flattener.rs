//! Entity flattener: entity in, flat document out.
//!
//! 1. Base field list from the entity type's schema (or, for types without
//!    a schema, the entity's own field names).
//! 2. `flatten_entity_fields_alter` subscribers adjust the list; repeated
//!    names are dropped afterwards, first occurrence wins.
//! 3. Each field is converted by the registered flattener for its declared
//!    type, or copied when it is primitive and no flattener applies.
//!
//! `created`/`changed` are never set here; the document hooks own them.

use crate::error::{FlattenError, FlattenResult};
use crate::fields::FieldList;
use crate::hooks::HookDispatcher;
use crate::registry::FlattenerRegistry;
use couchsync_model::{Entity, FieldDefinition, FieldValue, FlatDocument, SchemaCatalog};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Flattens entities using a shared registry, schema catalog and hooks.
#[derive(Debug, Clone)]
pub struct EntityFlattener {
    registry: Arc<FlattenerRegistry>,
    schemas: Arc<SchemaCatalog>,
    hooks: Arc<HookDispatcher>,
}

impl EntityFlattener {
    pub fn new(
        registry: Arc<FlattenerRegistry>,
        schemas: Arc<SchemaCatalog>,
        hooks: Arc<HookDispatcher>,
    ) -> Self {
        Self {
            registry,
            schemas,
            hooks,
        }
    }

    pub fn registry(&self) -> &Arc<FlattenerRegistry> {
        &self.registry
    }

    pub fn schemas(&self) -> &Arc<SchemaCatalog> {
        &self.schemas
    }

    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.hooks
    }

    /// The declared fields of the entity's type, before alteration.
    pub fn base_fields(&self, entity: &Entity) -> FieldList {
        match self.schemas.get(&entity.entity_type) {
            Some(schema) => schema.field_names().into(),
            None => {
                debug!(
                    entity_type = %entity.entity_type,
                    "No schema for entity type, using entity fields"
                );
                entity.field_names().collect()
            }
        }
    }

    /// The final, deduplicated list of fields to flatten.
    pub fn field_list(&self, entity: &Entity) -> FlattenResult<FieldList> {
        let base = self.base_fields(entity);
        let altered = self
            .hooks
            .alter_fields(base, &entity.entity_type, entity)?;
        Ok(altered.deduplicated())
    }

    /// Flattens `entity` into a document without timestamps.
    pub fn flatten(&self, entity: &Entity) -> FlattenResult<FlatDocument> {
        let fields = self.field_list(entity)?;
        let schema = self.schemas.get(&entity.entity_type);
        let mut document = FlatDocument::new();

        for name in fields.iter() {
            if FlatDocument::is_reserved(name) {
                trace!(field = name, "Skipping reserved field");
                continue;
            }
            let definition = schema.and_then(|s| s.definition(name));
            let value = self.flatten_field(entity, name, definition)?;
            document.insert(name, value);
        }

        debug!(
            entity_type = %entity.entity_type,
            entity_id = %entity.id,
            fields = document.len(),
            "Flattened entity"
        );
        Ok(document)
    }

    fn flatten_field(
        &self,
        entity: &Entity,
        name: &str,
        definition: Option<&FieldDefinition>,
    ) -> FlattenResult<Value> {
        let required = definition.is_some_and(|d| d.required);

        let raw = match entity.get(name) {
            Some(value) => value,
            None if required => {
                return Err(FlattenError::MissingRequiredField {
                    entity_type: entity.entity_type.clone(),
                    entity_id: entity.id.clone(),
                    field: name.to_string(),
                });
            }
            None => return Ok(Value::Null),
        };

        if let Some(definition) = definition {
            match self.registry.resolve(&entity.entity_type, &definition.field_type) {
                Ok(descriptor) => {
                    return descriptor.handler.flatten(raw).map_err(|message| {
                        FlattenError::FlattenerFailed {
                            flattener: descriptor.name.clone(),
                            field: name.to_string(),
                            message,
                        }
                    });
                }
                Err(e) if required => return Err(e),
                Err(_) => {}
            }
        }

        copy_primitive(entity, name, raw)
    }
}

fn copy_primitive(entity: &Entity, name: &str, raw: &FieldValue) -> FlattenResult<Value> {
    raw.to_primitive_json()
        .ok_or_else(|| FlattenError::UnflattenableField {
            entity_type: entity.entity_type.clone(),
            field: name.to_string(),
            kind: raw.kind(),
        })
}
