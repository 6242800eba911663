//! External PIM store collaborator.
//!
//! The external store exposes folders, messages, contacts and tasks as
//! property bags addressed by entry ids. Access is blocking and
//! session-scoped; nothing in this module may be called from the
//! resource-store writer queue.

mod memory;
mod notification;
mod tags;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::ids::{EntryId, EntryIdPair, StoreId};

pub use memory::{FolderNode, MemoryExternalStore, MessageNode, StoreEvent, StoreNode, StoreSnapshot};
pub use notification::{Notification, NotificationEvent, ObjectKind};
pub use tags::{PropSet, PropTag, named};

/// Value of an external property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalValue {
    /// String property.
    Str(String),
    /// Integer property.
    Int(i64),
    /// Boolean property.
    Bool(bool),
    /// Date property, UTC.
    Date(DateTime<Utc>),
    /// Binary property.
    Binary(Vec<u8>),
    /// Multi-valued string property.
    StrList(Vec<String>),
}

/// Snapshot of an opened external object.
///
/// Typed getters never fail: absent or mistyped properties yield the
/// type-appropriate empty value (empty string, zero, `MIN_UTC`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBag {
    /// Entry id of the object.
    pub entry_id: EntryId,
    /// Properties keyed by tag.
    #[serde(default)]
    pub props: BTreeMap<PropTag, ExternalValue>,
}

impl PropertyBag {
    /// Creates an empty bag for an object.
    #[must_use]
    pub fn new(entry_id: EntryId) -> Self {
        Self {
            entry_id,
            props: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, tag: PropTag, value: ExternalValue) -> Self {
        self.props.insert(tag, value);
        self
    }

    /// Sets a property.
    pub fn set(&mut self, tag: PropTag, value: ExternalValue) {
        self.props.insert(tag, value);
    }

    /// Returns the raw value of a property.
    #[must_use]
    pub fn get(&self, tag: &PropTag) -> Option<&ExternalValue> {
        self.props.get(tag)
    }

    /// Returns true if the property is present.
    #[must_use]
    pub fn has(&self, tag: &PropTag) -> bool {
        self.props.contains_key(tag)
    }

    /// String property, empty when absent.
    #[must_use]
    pub fn string(&self, tag: &PropTag) -> String {
        self.opt_string(tag).unwrap_or_default()
    }

    /// String property, `None` when absent or blank.
    #[must_use]
    pub fn opt_string(&self, tag: &PropTag) -> Option<String> {
        match self.get(tag) {
            Some(ExternalValue::Str(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Integer property, zero when absent.
    #[must_use]
    pub fn int(&self, tag: &PropTag) -> i64 {
        match self.get(tag) {
            Some(ExternalValue::Int(n)) => *n,
            Some(ExternalValue::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }

    /// Boolean property, false when absent.
    #[must_use]
    pub fn boolean(&self, tag: &PropTag) -> bool {
        match self.get(tag) {
            Some(ExternalValue::Bool(b)) => *b,
            Some(ExternalValue::Int(n)) => *n != 0,
            _ => false,
        }
    }

    /// Date property, `DateTime::<Utc>::MIN_UTC` when absent.
    #[must_use]
    pub fn date(&self, tag: &PropTag) -> DateTime<Utc> {
        match self.get(tag) {
            Some(ExternalValue::Date(d)) => *d,
            _ => DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Binary property.
    #[must_use]
    pub fn binary(&self, tag: &PropTag) -> Option<&[u8]> {
        match self.get(tag) {
            Some(ExternalValue::Binary(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Multi-valued string property, empty when absent.
    #[must_use]
    pub fn strings(&self, tag: &PropTag) -> Vec<String> {
        match self.get(tag) {
            Some(ExternalValue::StrList(list)) => list.clone(),
            Some(ExternalValue::Str(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Kind of an external message store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreKind {
    /// Local personal folders file.
    #[default]
    Personal,
    /// Server mailbox.
    Mailbox,
    /// Shared public folders.
    PublicFolders,
    /// Anything the store does not identify.
    Other,
}

impl StoreKind {
    /// Whether stores of this kind are synchronized.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::PublicFolders)
    }
}

/// Description of one external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Store identifier.
    pub store_id: StoreId,
    /// Display name.
    pub name: String,
    /// Provider kind.
    pub kind: StoreKind,
}

/// Default folders a store can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DefaultFolder {
    /// Inbox.
    Inbox,
    /// Deleted items.
    DeletedItems,
    /// Contacts.
    Contacts,
    /// Tasks.
    Tasks,
}

/// One row of a folder's message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// Entry id of the item.
    pub entry_id: EntryId,
    /// Delivery time, `MIN_UTC` when unknown.
    pub delivery_time: DateTime<Utc>,
    /// Message class (`IPM.Note`, `IPM.Contact`, ...).
    pub message_class: String,
}

/// Blocking access to the external PIM store.
///
/// Every failure to open or read an object is reported as
/// [`crate::Error::ExternalAccess`].
pub trait ExternalStore: Send + Sync {
    /// Lists the stores of the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be queried.
    fn stores(&self) -> Result<Vec<StoreInfo>>;

    /// Returns the root folder of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    fn root_folder(&self, store: &StoreId) -> Result<EntryIdPair>;

    /// Opens a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened.
    fn open_folder(&self, folder: &EntryIdPair) -> Result<PropertyBag>;

    /// Opens a message, contact or task.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be opened.
    fn open_message(&self, message: &EntryIdPair) -> Result<PropertyBag>;

    /// Reads the recipient table of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be opened.
    fn recipients(&self, message: &EntryIdPair) -> Result<Vec<PropertyBag>>;

    /// Reads the attachment table of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be opened.
    fn attachments(&self, message: &EntryIdPair) -> Result<Vec<PropertyBag>>;

    /// Lists the direct child folders of a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened.
    fn child_folders(&self, folder: &EntryIdPair) -> Result<Vec<EntryId>>;

    /// Reads a folder's message table, newest delivery first.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened.
    fn message_table(&self, folder: &EntryIdPair) -> Result<Vec<MessageRow>>;

    /// Resolves one of the store's default folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the store has no such folder.
    fn default_folder(&self, store: &StoreId, kind: DefaultFolder) -> Result<EntryIdPair>;

    /// Creates an empty item in a folder and returns its durable pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened.
    fn create_message(&self, folder: &EntryIdPair, message_class: &str) -> Result<EntryIdPair>;

    /// Writes properties to an item and commits them.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be opened or saved.
    fn save_changes(&self, message: &EntryIdPair, changes: &[(PropTag, ExternalValue)])
    -> Result<()>;

    /// Returns true if the object can still be reopened.
    fn can_open(&self, pair: &EntryIdPair) -> bool {
        self.open_message(pair).is_ok() || self.open_folder(pair).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_properties_default() {
        let bag = PropertyBag::new(EntryId::new("01"));
        assert_eq!(bag.string(&PropTag::Subject), "");
        assert_eq!(bag.int(&PropTag::Importance), 0);
        assert!(!bag.boolean(&PropTag::ReminderSet));
        assert_eq!(bag.date(&PropTag::MessageDeliveryTime), DateTime::<Utc>::MIN_UTC);
        assert!(bag.binary(&PropTag::ConversationIndex).is_none());
        assert!(bag.strings(&PropTag::Categories).is_empty());
    }

    #[test]
    fn test_blank_string_is_absent() {
        let bag = PropertyBag::new(EntryId::new("01"))
            .with(PropTag::Subject, ExternalValue::Str("   ".into()));
        assert!(bag.opt_string(&PropTag::Subject).is_none());
    }

    #[test]
    fn test_public_folders_unsupported() {
        assert!(StoreKind::Personal.is_supported());
        assert!(StoreKind::Mailbox.is_supported());
        assert!(!StoreKind::PublicFolders.is_supported());
    }
}
