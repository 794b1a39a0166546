use couchsync_types::{DocumentRef, Revision};
use proptest::prelude::*;
use std::collections::HashSet;

// ── Document IDs ─────────────────────────────────────────────────

#[test]
fn document_id_joins_type_and_id() {
    let r = DocumentRef::new("node", "42");
    assert_eq!(r.document_id(), "node:42");
    assert_eq!(r.to_string(), "node:42");
}

#[test]
fn document_id_is_deterministic() {
    let a = DocumentRef::new("commerce_product", "7");
    let b = DocumentRef::new("commerce_product", "7");
    assert_eq!(a.document_id(), b.document_id());
}

#[test]
fn parse_splits_on_first_separator() {
    let r = DocumentRef::parse("file:public://a:b.png").unwrap();
    assert_eq!(r.entity_type(), "file");
    assert_eq!(r.entity_id(), "public://a:b.png");
}

#[test]
fn parse_rejects_malformed_ids() {
    assert!(DocumentRef::parse("no-separator").is_err());
    assert!(DocumentRef::parse(":42").is_err());
    assert!(DocumentRef::parse("node:").is_err());
}

#[test]
fn separator_in_type_is_escaped() {
    let r = DocumentRef::new("a:b", "c");
    assert_eq!(r.document_id(), "a%3Ab:c");
    let parsed = DocumentRef::parse(&r.document_id()).unwrap();
    assert_eq!(parsed.entity_type(), "a:b");
    assert_eq!(parsed.entity_id(), "c");
}

#[test]
fn shifted_separator_does_not_collide() {
    let a = DocumentRef::new("a:b", "c");
    let b = DocumentRef::new("a", "b:c");
    assert_ne!(a.document_id(), b.document_id());
    assert_eq!(b.document_id(), "a:b:c");
}

#[test]
fn percent_in_type_is_escaped() {
    let a = DocumentRef::new("a%3Ab", "c");
    let b = DocumentRef::new("a:b", "c");
    assert_eq!(a.document_id(), "a%253Ab:c");
    assert_ne!(a.document_id(), b.document_id());
    assert_eq!(DocumentRef::parse(&a.document_id()).unwrap(), a);
}

#[test]
fn parse_rejects_unknown_type_escapes() {
    assert!(DocumentRef::parse("a%zz:c").is_err());
    assert!(DocumentRef::parse("a%:c").is_err());
}

#[test]
fn from_str_matches_parse() {
    let r: DocumentRef = "user:1".parse().unwrap();
    assert_eq!(r, DocumentRef::new("user", "1"));
}

// ── Revisions ────────────────────────────────────────────────────

#[test]
fn new_ref_has_no_revision() {
    assert!(DocumentRef::new("node", "1").revision().is_none());
}

#[test]
fn with_revision_carries_token() {
    let r = DocumentRef::new("node", "1").with_revision(Revision::new("1-abc"));
    assert_eq!(r.revision().map(Revision::as_str), Some("1-abc"));
}

#[test]
fn equality_ignores_revision() {
    let a = DocumentRef::new("node", "1").with_revision("1-a".into());
    let b = DocumentRef::new("node", "1").with_revision("2-b".into());
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}

#[test]
fn revision_serializes_transparently() {
    let json = serde_json::to_string(&Revision::new("3-ff")).unwrap();
    assert_eq!(json, "\"3-ff\"");
}

#[test]
fn ref_without_revision_omits_field() {
    let json = serde_json::to_value(DocumentRef::new("node", "1")).unwrap();
    assert!(json.get("revision").is_none());
    assert_eq!(json["entity_type"], "node");
}

proptest! {
    #[test]
    fn parse_recovers_identity(ty in "[a-z_:%]{1,16}", id in "[a-zA-Z0-9:%/._-]{1,24}") {
        let r = DocumentRef::new(ty.clone(), id.clone());
        let parsed = DocumentRef::parse(&r.document_id()).unwrap();
        prop_assert_eq!(parsed.entity_type(), ty.as_str());
        prop_assert_eq!(parsed.entity_id(), id.as_str());
    }
}

proptest! {
    #[test]
    fn distinct_identities_get_distinct_ids(
        a in ("[a-z:%]{1,6}", "[a-z:%]{1,6}"),
        b in ("[a-z:%]{1,6}", "[a-z:%]{1,6}"),
    ) {
        let ra = DocumentRef::new(a.0.clone(), a.1.clone());
        let rb = DocumentRef::new(b.0.clone(), b.1.clone());
        prop_assert_eq!(ra.document_id() == rb.document_id(), a == b);
    }
}
