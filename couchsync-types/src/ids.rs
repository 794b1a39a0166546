//! Document identity used throughout the sync engine.
//!
//! A remote document is addressed by the `(entity_type, entity_id)` pair of
//! the entity it mirrors. The pair maps to a deterministic document ID so
//! that create-vs-update can be decided by a single fetch.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Separator between entity type and entity id in a document ID.
pub const DOCUMENT_ID_SEPARATOR: char = ':';

/// Escapes for the entity type component, so the first separator in a
/// document ID always ends the type.
const TYPE_ESCAPES: [(char, &str); 2] = [('%', "%25"), (DOCUMENT_ID_SEPARATOR, "%3A")];

fn escape_type(entity_type: &str) -> Cow<'_, str> {
    if !entity_type.contains(|c: char| TYPE_ESCAPES.iter().any(|(raw, _)| *raw == c)) {
        return Cow::Borrowed(entity_type);
    }
    let mut escaped = String::with_capacity(entity_type.len() + 4);
    for c in entity_type.chars() {
        match TYPE_ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, code)) => escaped.push_str(code),
            None => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Reverses [`escape_type`]. `None` on any escape it would not produce.
fn unescape_type(escaped: &str) -> Option<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (raw, code) = TYPE_ESCAPES
            .iter()
            .find(|(_, code)| tail.starts_with(code))?;
        out.push(*raw);
        rest = &tail[code.len()..];
    }
    out.push_str(rest);
    Some(out)
}

/// Opaque revision token used for optimistic concurrency on writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Revision {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a remote document by the entity it mirrors.
///
/// Equality and hashing consider only the identity, never the revision:
/// two refs to the same document with different known revisions are the
/// same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    entity_type: String,
    entity_id: String,
    /// Last-known revision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<Revision>,
}

impl DocumentRef {
    /// Creates a ref with no known revision.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            revision: None,
        }
    }

    /// Returns a copy of this ref carrying the given revision.
    #[must_use]
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Parses a document ID of the form `{entity_type}:{entity_id}`.
    ///
    /// The type component is percent-escaped (`%` and `:`); the entity id
    /// is taken verbatim after the first separator.
    pub fn parse(document_id: &str) -> crate::Result<Self> {
        let invalid = || Error::InvalidDocumentId(document_id.to_string());
        match document_id.split_once(DOCUMENT_ID_SEPARATOR) {
            Some((entity_type, entity_id)) if !entity_type.is_empty() && !entity_id.is_empty() => {
                let entity_type = unescape_type(entity_type).ok_or_else(invalid)?;
                Ok(Self::new(entity_type, entity_id))
            }
            _ => Err(invalid()),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    #[must_use]
    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    /// Records a newly observed revision.
    pub fn set_revision(&mut self, revision: Option<Revision>) {
        self.revision = revision;
    }

    /// The deterministic document ID for this identity.
    ///
    /// Distinct `(entity_type, entity_id)` pairs always give distinct IDs.
    #[must_use]
    pub fn document_id(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.entity_id == other.entity_id
    }
}

impl Eq for DocumentRef {}

impl std::hash::Hash for DocumentRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.entity_type.hash(state);
        self.entity_id.hash(state);
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            escape_type(&self.entity_type),
            DOCUMENT_ID_SEPARATOR,
            self.entity_id
        )
    }
}

impl FromStr for DocumentRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
