use chrono::{TimeZone, Utc};
use couchsync_model::{Entity, EntityReference, FieldValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;

fn make_product() -> Entity {
    Entity::new("commerce_product", "7")
        .with_field("title", "Blue mug")
        .with_field("price", 12.5)
        .with_field("stock", 3i64)
}

// ── Construction & accessors ─────────────────────────────────────

#[test]
fn builder_sets_fields() {
    let e = make_product();
    assert_eq!(e.entity_type, "commerce_product");
    assert_eq!(e.id, "7");
    assert_eq!(e.get_str("title"), Some("Blue mug"));
    assert_eq!(e.get("stock"), Some(&FieldValue::Integer(3)));
}

#[test]
fn get_str_ignores_non_text() {
    let e = make_product();
    assert_eq!(e.get_str("price"), None);
    assert_eq!(e.get_str("missing"), None);
}

#[test]
fn field_names_are_sorted() {
    let e = make_product();
    let names: Vec<&str> = e.field_names().collect();
    assert_eq!(names, vec!["price", "stock", "title"]);
}

#[test]
fn document_ref_uses_type_and_id() {
    let r = make_product().document_ref();
    assert_eq!(r.document_id(), "commerce_product:7");
}

#[test]
fn set_overwrites() {
    let mut e = make_product();
    e.set("title", "Red mug");
    assert_eq!(e.get_str("title"), Some("Red mug"));
}

// ── Primitive classification ─────────────────────────────────────

#[test]
fn scalars_are_primitive() {
    assert!(FieldValue::Null.is_primitive());
    assert!(FieldValue::from(true).is_primitive());
    assert!(FieldValue::from(1i64).is_primitive());
    assert!(FieldValue::from(1.5).is_primitive());
    assert!(FieldValue::from("x").is_primitive());
}

#[test]
fn non_finite_float_is_not_primitive() {
    assert!(!FieldValue::Float(f64::NAN).is_primitive());
    assert_eq!(FieldValue::Float(f64::INFINITY).to_primitive_json(), None);
}

#[test]
fn references_and_datetimes_are_not_primitive() {
    let r = FieldValue::from(EntityReference::new("user", "1"));
    let dt = FieldValue::from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert!(!r.is_primitive());
    assert!(!dt.is_primitive());
}

#[test]
fn nested_reference_taints_container() {
    let list = FieldValue::List(vec![
        FieldValue::from("a"),
        FieldValue::from(EntityReference::new("user", "1")),
    ]);
    assert!(!list.is_primitive());
    assert_eq!(list.to_primitive_json(), None);
}

#[test]
fn primitive_structure_copies_to_json() {
    let mut map = BTreeMap::new();
    map.insert("amount".to_string(), FieldValue::from(1200i64));
    map.insert("currency".to_string(), FieldValue::from("EUR"));
    let v = FieldValue::Structure(map);
    assert_eq!(
        v.to_primitive_json(),
        Some(json!({"amount": 1200, "currency": "EUR"}))
    );
}

#[test]
fn vec_converts_to_list() {
    let v = FieldValue::from(vec!["a", "b"]);
    assert_eq!(v.to_primitive_json(), Some(json!(["a", "b"])));
    assert_eq!(v.kind(), "list");
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn entity_serde_roundtrip() {
    let e = make_product().with_field("owner", EntityReference::new("user", "3"));
    let json = serde_json::to_string(&e).unwrap();
    let back: Entity = serde_json::from_str(&json).unwrap();
    assert_eq!(back, e);
}

#[test]
fn field_value_is_adjacently_tagged() {
    let json = serde_json::to_value(FieldValue::from("hi")).unwrap();
    assert_eq!(json, json!({"kind": "text", "value": "hi"}));
}
