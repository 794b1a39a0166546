use chrono::{TimeZone, Utc};
use couchsync_flatten::{
    EntityFlattener, ExtensionPoint, FieldList, FlattenError, FlattenerRegistry, HookDispatcher,
    SyncHook,
};
use couchsync_model::{
    Entity, EntityReference, EntitySchema, FieldDefinition, FieldValue, SchemaCatalog,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

/// Adds the SKU property to commerce products.
struct SkuHook;

impl SyncHook for SkuHook {
    fn name(&self) -> &str {
        "commerce_sku"
    }

    fn alter_fields(
        &self,
        mut fields: FieldList,
        entity_type: &str,
        _entity: &Entity,
    ) -> Result<FieldList, String> {
        if entity_type == "commerce_product" {
            fields.push("sku");
        }
        Ok(fields)
    }
}

/// Drops every field and re-adds `title` twice.
struct Shuffler;

impl SyncHook for Shuffler {
    fn name(&self) -> &str {
        "shuffler"
    }

    fn alter_fields(&self, _: FieldList, _: &str, _: &Entity) -> Result<FieldList, String> {
        Ok(FieldList::new().with("title").with("price").with("title"))
    }
}

fn schemas() -> SchemaCatalog {
    SchemaCatalog::new()
        .with(
            EntitySchema::new("commerce_product")
                .field(FieldDefinition::text("title").required())
                .field(FieldDefinition::decimal("price")),
        )
        .with(
            EntitySchema::new("node")
                .field(FieldDefinition::text("title").required())
                .field(FieldDefinition::reference("author"))
                .field(FieldDefinition::datetime("published"))
                .field(FieldDefinition::reference("tags"))
                .field(FieldDefinition::custom("location", "geofield"))
                .field(FieldDefinition::text("summary")),
        )
}

fn flattener_with(hooks: HookDispatcher) -> EntityFlattener {
    EntityFlattener::new(
        Arc::new(FlattenerRegistry::with_builtins()),
        Arc::new(schemas()),
        Arc::new(hooks),
    )
}

fn flattener() -> EntityFlattener {
    flattener_with(HookDispatcher::with_timestamps())
}

fn product() -> Entity {
    Entity::new("commerce_product", "7")
        .with_field("title", "Blue mug")
        .with_field("price", 12.5)
        .with_field("sku", "MUG-BLUE")
        .with_field("internal_note", "not synced")
}

fn article() -> Entity {
    Entity::new("node", "1")
        .with_field("title", "Hello")
        .with_field("author", EntityReference::new("user", "3"))
        .with_field(
            "published",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_field(
            "tags",
            vec![
                EntityReference::new("taxonomy_term", "4"),
                EntityReference::new("taxonomy_term", "9"),
            ],
        )
}

// ── Base fields ──────────────────────────────────────────────────

#[test]
fn schema_fields_define_document_keys() {
    let doc = flattener().flatten(&product()).unwrap();
    let mut names: Vec<&str> = doc.field_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["price", "title"]);
    assert_eq!(doc.get("title"), Some(&json!("Blue mug")));
    assert_eq!(doc.get("price"), Some(&json!(12.5)));
}

#[test]
fn flattening_sets_no_timestamps() {
    let doc = flattener().flatten(&product()).unwrap();
    assert!(doc.created.is_none());
    assert!(doc.changed.is_none());
}

#[test]
fn entity_type_without_schema_uses_entity_fields() {
    let e = Entity::new("comment", "5")
        .with_field("body", "Nice")
        .with_field("votes", 3i64);
    let doc = flattener().flatten(&e).unwrap();
    assert_eq!(doc.get("body"), Some(&json!("Nice")));
    assert_eq!(doc.get("votes"), Some(&json!(3)));
}

#[test]
fn empty_entity_produces_empty_document() {
    let doc = flattener().flatten(&Entity::new("comment", "5")).unwrap();
    assert!(doc.is_empty());
}

// ── Field alteration ─────────────────────────────────────────────

#[test]
fn alter_hook_appends_sku() {
    let mut hooks = HookDispatcher::with_timestamps();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(SkuHook));
    let doc = flattener_with(hooks).flatten(&product()).unwrap();

    let mut names: Vec<&str> = doc.field_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["price", "sku", "title"]);
    assert_eq!(doc.get("sku"), Some(&json!("MUG-BLUE")));
}

#[test]
fn alter_hook_self_filters_by_type() {
    let mut hooks = HookDispatcher::new();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(SkuHook));
    let doc = flattener_with(hooks).flatten(&article()).unwrap();
    assert!(!doc.contains("sku"));
}

#[test]
fn duplicate_fields_after_alteration_are_deduplicated() {
    let mut hooks = HookDispatcher::new();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(Shuffler));
    let f = flattener_with(hooks);

    let list = f.field_list(&product()).unwrap();
    assert_eq!(list.into_vec(), vec!["title", "price"]);
    assert_eq!(f.flatten(&product()).unwrap().len(), 2);
}

#[test]
fn added_field_without_value_is_null() {
    let mut hooks = HookDispatcher::new();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(SkuHook));
    let e = Entity::new("commerce_product", "8").with_field("title", "Plate");
    let doc = flattener_with(hooks).flatten(&e).unwrap();
    assert_eq!(doc.get("sku"), Some(&json!(null)));
    assert_eq!(doc.get("price"), Some(&json!(null)));
}

// ── Field conversion ─────────────────────────────────────────────

#[test]
fn references_and_dates_resolve_to_primitives() {
    let doc = flattener().flatten(&article()).unwrap();
    assert_eq!(doc.get("author"), Some(&json!("3")));
    assert_eq!(doc.get("published"), Some(&json!(1_704_067_200)));
    assert_eq!(doc.get("tags"), Some(&json!(["4", "9"])));
}

#[test]
fn unregistered_type_copies_primitive_values() {
    let e = article().with_field("location", vec![52.5, 13.4]);
    let doc = flattener().flatten(&e).unwrap();
    assert_eq!(doc.get("location"), Some(&json!([52.5, 13.4])));
}

#[test]
fn unregistered_type_with_non_primitive_value_fails() {
    let e = article().with_field("location", EntityReference::new("place", "berlin"));
    let err = flattener().flatten(&e).unwrap_err();
    match err {
        FlattenError::UnflattenableField { field, kind, .. } => {
            assert_eq!(field, "location");
            assert_eq!(kind, "reference");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn undeclared_non_primitive_field_fails() {
    let mut hooks = HookDispatcher::new();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(SkuHook));
    let e = product().with_field("sku", EntityReference::new("commerce_sku", "1"));
    let err = flattener_with(hooks).flatten(&e).unwrap_err();
    assert!(matches!(err, FlattenError::UnflattenableField { ref field, .. } if field == "sku"));
}

#[test]
fn required_field_without_flattener_fails() {
    let registry = FlattenerRegistry::new();
    let f = EntityFlattener::new(
        Arc::new(registry),
        Arc::new(schemas()),
        Arc::new(HookDispatcher::new()),
    );
    let err = f.flatten(&product()).unwrap_err();
    assert!(matches!(err, FlattenError::FlattenerNotFound { .. }));
}

#[test]
fn optional_field_without_flattener_falls_back_to_copy() {
    let mut schemas = schemas();
    schemas.insert(
        EntitySchema::new("commerce_product").field(FieldDefinition::decimal("price")),
    );
    let f = EntityFlattener::new(
        Arc::new(FlattenerRegistry::new()),
        Arc::new(schemas),
        Arc::new(HookDispatcher::new()),
    );
    let doc = f.flatten(&product()).unwrap();
    assert_eq!(doc.get("price"), Some(&json!(12.5)));
}

#[test]
fn missing_required_value_fails() {
    let e = Entity::new("commerce_product", "9").with_field("price", 1.0);
    let err = flattener().flatten(&e).unwrap_err();
    assert_eq!(
        err.to_string(),
        "required field 'title' missing on commerce_product 9"
    );
}

#[test]
fn flattener_type_mismatch_is_reported() {
    let e = product().with_field("title", FieldValue::Integer(5));
    let err = flattener().flatten(&e).unwrap_err();
    match err {
        FlattenError::FlattenerFailed {
            flattener,
            field,
            message,
        } => {
            assert_eq!(flattener, "text");
            assert_eq!(field, "title");
            assert_eq!(message, "expected text, got integer");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reserved_field_names_are_skipped() {
    let e = Entity::new("comment", "1")
        .with_field("created", 5i64)
        .with_field("body", "x");
    let doc = flattener().flatten(&e).unwrap();
    assert!(doc.created.is_none());
    assert_eq!(doc.len(), 1);
}

#[test]
fn alter_hook_failure_aborts_flattening() {
    struct Broken;
    impl SyncHook for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn alter_fields(&self, _: FieldList, _: &str, _: &Entity) -> Result<FieldList, String> {
            Err("nope".into())
        }
    }

    let mut hooks = HookDispatcher::new();
    hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(Broken));
    let err = flattener_with(hooks).flatten(&product()).unwrap_err();
    assert!(matches!(err, FlattenError::Hook(_)));
}

// ── Determinism ──────────────────────────────────────────────────

#[test]
fn flattening_twice_is_identical() {
    let f = flattener();
    assert_eq!(f.flatten(&article()).unwrap(), f.flatten(&article()).unwrap());
}

proptest! {
    #[test]
    fn flattening_is_deterministic(
        title in "\\PC{0,40}",
        price in -1.0e6f64..1.0e6,
        sku in "[A-Z0-9-]{0,12}",
    ) {
        let mut hooks = HookDispatcher::with_timestamps();
        hooks.register(ExtensionPoint::FlattenEntityFieldsAlter, Arc::new(SkuHook));
        let f = flattener_with(hooks);
        let e = Entity::new("commerce_product", "1")
            .with_field("title", title)
            .with_field("price", price)
            .with_field("sku", sku);

        let a = serde_json::to_string(&f.flatten(&e).unwrap()).unwrap();
        let b = serde_json::to_string(&f.flatten(&e).unwrap()).unwrap();
        prop_assert_eq!(a, b);
    }
}
