//! Snapshot: opaque serialized board content.
//!
//! DESIGN
//! ======
//! A snapshot is whatever document the browser canvas produced for one board
//! at one point in time. The server never looks inside it. Snapshots are
//! shared by `Arc`, so a history log, the surface mirror, and the persistence
//! queue all point at the same allocation and identity checks are pointer
//! comparisons.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Immutable, reference-counted board document.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<serde_json::Value>);

impl Snapshot {
    #[must_use]
    pub fn new(doc: serde_json::Value) -> Self {
        Self(Arc::new(doc))
    }

    /// The document a freshly created or cleared board holds.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Build a snapshot from stored or inbound JSON. `null` means "nothing
    /// was ever drawn" and maps to the empty document.
    #[must_use]
    pub fn from_stored(doc: serde_json::Value) -> Self {
        if doc.is_null() { Self::empty() } else { Self::new(doc) }
    }

    #[must_use]
    pub fn doc(&self) -> &serde_json::Value {
        &self.0
    }

    /// Identity comparison: true only for clones of the same capture.
    #[must_use]
    pub fn same(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub fn is_empty_doc(&self) -> bool {
        self.0.as_object().is_some_and(serde_json::Map::is_empty)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from_stored)
    }
}
