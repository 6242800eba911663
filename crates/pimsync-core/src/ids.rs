//! Identifiers shared by the external store and the resource graph.
//!
//! External identifiers are opaque strings handed out by the PIM store.
//! Entry ids can be short-lived (they roll over on moves and become
//! unusable right after a delete); record keys are the more stable
//! secondary identity.

use serde::{Deserialize, Serialize};

/// Opaque external-store handle naming a folder or an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Creates an entry id from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the entry id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty id some stores report for absent objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an external message store (one PST, one mailbox, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl StoreId {
    /// Creates a store id from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the store id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned secondary identifier that survives moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub String);

impl RecordKey {
    /// Creates a record key from its string form.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the record key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable key used to reopen an external object later.
///
/// Never persisted across store re-creation; callers revalidate it
/// against the entry id stamped on the local resource before use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryIdPair {
    /// Entry id of the object (the container id for folders).
    pub entry_id: EntryId,
    /// Store holding the object.
    pub store_id: StoreId,
}

impl EntryIdPair {
    /// Creates a pair from its parts.
    #[must_use]
    pub const fn new(entry_id: EntryId, store_id: StoreId) -> Self {
        Self { entry_id, store_id }
    }

    /// Derives the durable pair of a message from its own entry id and
    /// the store that contains it.
    #[must_use]
    pub fn message(entry_id: &EntryId, store_id: &StoreId) -> Self {
        Self::new(entry_id.clone(), store_id.clone())
    }

    /// Returns a pair for a sibling object in the same store.
    #[must_use]
    pub fn sibling(&self, entry_id: EntryId) -> Self {
        Self::new(entry_id, self.store_id.clone())
    }
}

impl std::fmt::Display for EntryIdPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.entry_id, self.store_id)
    }
}

/// Identifier of a resource in the local resource graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub i64);

impl ResourceId {
    /// Creates a resource id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
