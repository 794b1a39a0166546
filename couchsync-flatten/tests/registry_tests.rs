use couchsync_flatten::{FieldFlattener, FlattenError, FlattenerDescriptor, FlattenerRegistry};
use couchsync_model::{FieldType, FieldValue};
use serde_json::{json, Value};
use std::sync::Arc;

/// Formats a price structure as a single string.
struct PriceFlattener;

impl FieldFlattener for PriceFlattener {
    fn accepts(&self, field_type: &FieldType) -> bool {
        field_type.as_str() == "commerce_price"
    }

    fn flatten(&self, value: &FieldValue) -> Result<Value, String> {
        match value {
            FieldValue::Integer(cents) => Ok(json!(format!("{}.{:02}", cents / 100, cents % 100))),
            other => Err(format!("unexpected {}", other.kind())),
        }
    }
}

fn price_type() -> FieldType {
    FieldType::from("commerce_price")
}

fn price_descriptor(name: &str) -> FlattenerDescriptor {
    FlattenerDescriptor::new(name, "Commerce prices", price_type(), Arc::new(PriceFlattener))
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn empty_registry() {
    let registry = FlattenerRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.names().is_empty());
}

#[test]
fn register_and_get() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    assert!(registry.contains("price"));
    assert_eq!(registry.get("price").unwrap().description, "Commerce prices");
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_name_rejected() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    let err = registry
        .register(price_descriptor("price").for_entity_type("commerce_product"))
        .unwrap_err();
    assert!(matches!(err, FlattenError::DuplicateFlattener(ref n) if n == "price"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn same_target_under_new_name_rejected() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    let err = registry.register(price_descriptor("price_v2")).unwrap_err();
    match err {
        FlattenError::ConflictingFlattener { name, existing, .. } => {
            assert_eq!(name, "price_v2");
            assert_eq!(existing, "price");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Resolution ───────────────────────────────────────────────────

#[test]
fn resolve_wildcard() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    let d = registry.resolve("commerce_product", &price_type()).unwrap();
    assert_eq!(d.name, "price");
}

#[test]
fn entity_specific_beats_wildcard() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    registry
        .register(price_descriptor("product_price").for_entity_type("commerce_product"))
        .unwrap();

    assert_eq!(
        registry.resolve("commerce_product", &price_type()).unwrap().name,
        "product_price"
    );
    assert_eq!(registry.resolve("commerce_order", &price_type()).unwrap().name, "price");
}

#[test]
fn resolve_unknown_is_not_found() {
    let registry = FlattenerRegistry::new();
    let err = registry.resolve("node", &FieldType::Text).unwrap_err();
    match err {
        FlattenError::FlattenerNotFound {
            entity_type,
            field_type,
        } => {
            assert_eq!(entity_type, "node");
            assert_eq!(field_type, "text");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn resolved_handler_flattens() {
    let mut registry = FlattenerRegistry::new();
    registry.register(price_descriptor("price")).unwrap();
    let d = registry.resolve("commerce_product", &price_type()).unwrap();
    assert_eq!(d.handler.flatten(&FieldValue::Integer(1250)).unwrap(), json!("12.50"));
}

// ── Builtins ─────────────────────────────────────────────────────

#[test]
fn builtins_cover_standard_types() {
    let registry = FlattenerRegistry::with_builtins();
    for ft in [
        FieldType::Text,
        FieldType::Integer,
        FieldType::Decimal,
        FieldType::Boolean,
        FieldType::DateTime,
        FieldType::Reference,
        FieldType::Structure,
        FieldType::List,
    ] {
        assert!(registry.resolve("node", &ft).is_ok(), "missing builtin for {ft}");
    }
    assert_eq!(registry.len(), 8);
}

#[test]
fn every_builtin_descriptor_registers() {
    let descriptors = couchsync_flatten::builtin::descriptors();
    let mut registry = FlattenerRegistry::new();
    for descriptor in descriptors.clone() {
        registry.register(descriptor).unwrap();
    }
    assert_eq!(registry.len(), descriptors.len());
    assert_eq!(FlattenerRegistry::with_builtins().len(), descriptors.len());
}

#[test]
fn builtins_record_handler_paths() {
    let registry = FlattenerRegistry::with_builtins();
    assert_eq!(
        registry.get("datetime").unwrap().handler_path.as_deref(),
        Some("couchsync::builtin::datetime")
    );
}

#[test]
fn plugin_flattener_alongside_builtins() {
    let mut registry = FlattenerRegistry::with_builtins();
    registry.register(price_descriptor("price")).unwrap();
    assert!(registry.resolve("commerce_product", &price_type()).is_ok());
    assert!(registry.resolve("commerce_product", &FieldType::Text).is_ok());
}

#[test]
fn shared_registry_reads_concurrently() {
    let registry = Arc::new(FlattenerRegistry::with_builtins());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.resolve("node", &FieldType::Text).is_ok())
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
}
