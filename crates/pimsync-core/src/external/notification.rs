//! Change notifications published by the external store.

use serde::{Deserialize, Serialize};

use crate::ids::{EntryId, StoreId};

/// What kind of object a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A folder.
    Folder,
    /// A message, contact or task.
    Item,
}

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// The object was created.
    Created,
    /// The object's properties changed.
    Modified,
    /// The object moved to another folder.
    Moved,
    /// The object was deleted.
    Deleted,
}

/// A single external-store change notification.
///
/// For `Deleted` and `Moved` events the `entry_id` (and `old_entry_id`)
/// may already be unusable when the notification is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Store the object lives in.
    pub store_id: StoreId,
    /// Folder or item.
    pub kind: ObjectKind,
    /// Event type.
    pub event: NotificationEvent,
    /// Entry id of the object after the event.
    pub entry_id: EntryId,
    /// Containing folder after the event.
    pub parent_id: EntryId,
    /// Entry id before a move.
    #[serde(default)]
    pub old_entry_id: Option<EntryId>,
    /// Containing folder before a move.
    #[serde(default)]
    pub old_parent_id: Option<EntryId>,
}

impl Notification {
    /// Creates a notification without move information.
    #[must_use]
    pub const fn new(
        store_id: StoreId,
        kind: ObjectKind,
        event: NotificationEvent,
        entry_id: EntryId,
        parent_id: EntryId,
    ) -> Self {
        Self {
            store_id,
            kind,
            event,
            entry_id,
            parent_id,
            old_entry_id: None,
            old_parent_id: None,
        }
    }

    /// Adds the pre-move identifiers.
    #[must_use]
    pub fn moved_from(mut self, old_entry_id: EntryId, old_parent_id: EntryId) -> Self {
        self.old_entry_id = Some(old_entry_id);
        self.old_parent_id = Some(old_parent_id);
        self
    }

    /// Short label used in job names and logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:?} {:?} {}", self.kind, self.event, self.entry_id)
    }
}
