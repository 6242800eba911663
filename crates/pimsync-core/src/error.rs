//! Error types for the core library.

use thiserror::Error;

use crate::ids::{EntryId, ResourceId};

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The external store could not open or read an object.
    ///
    /// Transient: the object may have moved or vanished. Callers drop the
    /// work item and rely on the next full enumeration.
    #[error("External store access failed: {0}")]
    ExternalAccess(String),

    /// A delete/move target could not be resolved to a local resource.
    #[error("Could not resolve the target of a notification in folder {parent}")]
    IdentityUnresolved {
        /// Entry id of the parent container that was scanned.
        parent: EntryId,
    },

    /// Another resource already carries the entry id being stamped.
    #[error(
        "Entry id {entry_id} is already owned by resource {owner}; refusing to stamp it on {target}"
    )]
    EntryIdConflict {
        /// Conflicting entry id value.
        entry_id: EntryId,
        /// Resource currently holding the value.
        owner: ResourceId,
        /// Resource the value was about to be written to.
        target: ResourceId,
    },

    /// A date cannot be stored in the given property.
    #[error("Unsupported date {value} for property {property}")]
    UnsupportedDate {
        /// Property name.
        property: String,
        /// Offending value, RFC 3339.
        value: String,
    },

    /// A resource referenced by id does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The synchronizer is shutting down.
    #[error("Synchronizer is shutting down")]
    Shutdown,
}

impl Error {
    /// Returns true for failures that are expected to heal on their own
    /// (through a retry or the next full enumeration).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ExternalAccess(_) | Self::IdentityUnresolved { .. } | Self::Shutdown
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
