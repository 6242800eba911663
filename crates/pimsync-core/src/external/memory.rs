//! In-memory external store.
//!
//! Mirrors the behaviour of a real PIM store closely enough to exercise
//! the reconciliation engine: entry ids roll over on moves, deleted
//! objects cannot be reopened, and hidden (soft-deleted) items can still
//! be opened while no longer showing up in their folder's table.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    DefaultFolder, ExternalStore, ExternalValue, MessageRow, Notification, NotificationEvent,
    ObjectKind, PropTag, PropertyBag, StoreInfo,
};
use crate::ids::{EntryId, EntryIdPair, StoreId};
use crate::{Error, Result};

/// A folder of the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderNode {
    /// Parent folder, `None` for the root.
    #[serde(default)]
    pub parent: Option<EntryId>,
    /// Folder properties.
    #[serde(default)]
    pub props: PropertyBag,
}

/// An item (message, contact, task) of the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageNode {
    /// Containing folder.
    #[serde(default)]
    pub folder: EntryId,
    /// Item properties.
    #[serde(default)]
    pub props: PropertyBag,
    /// Recipient table rows.
    #[serde(default)]
    pub recipients: Vec<PropertyBag>,
    /// Attachment table rows.
    #[serde(default)]
    pub attachments: Vec<PropertyBag>,
    /// Soft-deleted: still openable but missing from the folder table.
    #[serde(default)]
    pub hidden: bool,
}

impl MessageNode {
    /// Creates an item with the given class.
    #[must_use]
    pub fn new(entry_id: EntryId, message_class: &str) -> Self {
        Self {
            props: PropertyBag::new(entry_id)
                .with(PropTag::MessageClass, ExternalValue::Str(message_class.to_string())),
            ..Self::default()
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, tag: PropTag, value: ExternalValue) -> Self {
        self.props.set(tag, value);
        self
    }

    /// Adds a recipient row.
    #[must_use]
    pub fn with_recipient(mut self, row: PropertyBag) -> Self {
        self.recipients.push(row);
        self
    }

    /// Adds an attachment row.
    #[must_use]
    pub fn with_attachment(mut self, row: PropertyBag) -> Self {
        self.attachments.push(row);
        self
    }
}

/// One store of the in-memory session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreNode {
    /// Store description.
    pub info: StoreInfo,
    /// Root folder.
    pub root: EntryId,
    /// Default folders by kind.
    #[serde(default)]
    pub default_folders: BTreeMap<DefaultFolder, EntryId>,
    /// Folders by entry id.
    #[serde(default)]
    pub folders: BTreeMap<EntryId, FolderNode>,
    /// Items by entry id.
    #[serde(default)]
    pub messages: BTreeMap<EntryId, MessageNode>,
}

/// Serializable state of the in-memory session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Stores of the session.
    #[serde(default)]
    pub stores: Vec<StoreNode>,
    /// Counter used to mint new entry ids.
    #[serde(default)]
    pub next_id: u64,
}

impl StoreSnapshot {
    fn store(&self, store_id: &StoreId) -> Result<&StoreNode> {
        self.stores
            .iter()
            .find(|s| &s.info.store_id == store_id)
            .ok_or_else(|| Error::ExternalAccess(format!("store {store_id} is not open")))
    }

    fn store_mut(&mut self, store_id: &StoreId) -> Result<&mut StoreNode> {
        self.stores
            .iter_mut()
            .find(|s| &s.info.store_id == store_id)
            .ok_or_else(|| Error::ExternalAccess(format!("store {store_id} is not open")))
    }

    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:08X}", self.next_id)
    }
}

/// A change applied to the in-memory store, as read from a replay file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// Create a folder.
    AddFolder {
        /// Store.
        store: StoreId,
        /// Parent folder.
        parent: EntryId,
        /// Display name.
        name: String,
        /// Container class.
        container_class: String,
    },
    /// Create an item.
    AddMessage {
        /// Store.
        store: StoreId,
        /// Target folder.
        folder: EntryId,
        /// Item contents.
        message: MessageNode,
    },
    /// Change item properties.
    ModifyMessage {
        /// Store.
        store: StoreId,
        /// Item.
        entry: EntryId,
        /// New property values.
        changes: BTreeMap<PropTag, ExternalValue>,
    },
    /// Move an item to another folder.
    MoveMessage {
        /// Store.
        store: StoreId,
        /// Item.
        entry: EntryId,
        /// Destination folder.
        to: EntryId,
    },
    /// Delete an item.
    DeleteMessage {
        /// Store.
        store: StoreId,
        /// Item.
        entry: EntryId,
    },
    /// Delete a folder and everything below it.
    DeleteFolder {
        /// Store.
        store: StoreId,
        /// Folder.
        entry: EntryId,
    },
}

/// External store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryExternalStore {
    state: Mutex<StoreSnapshot>,
}

impl MemoryExternalStore {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    /// Returns a copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreSnapshot>> {
        self.state
            .lock()
            .map_err(|_| Error::ExternalAccess("store state lock poisoned".into()))
    }

    /// Adds a store with an empty root folder and returns the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn add_store(&self, info: StoreInfo) -> Result<EntryIdPair> {
        let mut state = self.lock()?;
        let root = EntryId::new(state.mint("R"));
        let mut folders = BTreeMap::new();
        folders.insert(
            root.clone(),
            FolderNode {
                parent: None,
                props: PropertyBag::new(root.clone())
                    .with(PropTag::DisplayName, ExternalValue::Str(info.name.clone())),
            },
        );
        let pair = EntryIdPair::new(root.clone(), info.store_id.clone());
        state.stores.push(StoreNode {
            info,
            root,
            default_folders: BTreeMap::new(),
            folders,
            messages: BTreeMap::new(),
        });
        Ok(pair)
    }

    /// Marks a folder as one of the store's default folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unknown.
    pub fn set_default_folder(
        &self,
        store: &StoreId,
        kind: DefaultFolder,
        folder: &EntryId,
    ) -> Result<()> {
        let mut state = self.lock()?;
        state
            .store_mut(store)?
            .default_folders
            .insert(kind, folder.clone());
        Ok(())
    }

    /// Creates a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the parent folder is unknown.
    pub fn add_folder(
        &self,
        store: &StoreId,
        parent: &EntryId,
        name: &str,
        container_class: &str,
    ) -> Result<Notification> {
        let mut state = self.lock()?;
        let entry = EntryId::new(state.mint("F"));
        let node = state.store_mut(store)?;
        if !node.folders.contains_key(parent) {
            return Err(Error::ExternalAccess(format!("folder {parent} not found")));
        }
        node.folders.insert(
            entry.clone(),
            FolderNode {
                parent: Some(parent.clone()),
                props: PropertyBag::new(entry.clone())
                    .with(PropTag::DisplayName, ExternalValue::Str(name.to_string()))
                    .with(
                        PropTag::ContainerClass,
                        ExternalValue::Str(container_class.to_string()),
                    ),
            },
        );
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Folder,
            NotificationEvent::Created,
            entry,
            parent.clone(),
        ))
    }

    /// Creates an item; a blank entry id in `message.props` is replaced
    /// by a freshly minted one. A record key is minted when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the folder is unknown.
    pub fn add_message(
        &self,
        store: &StoreId,
        folder: &EntryId,
        mut message: MessageNode,
    ) -> Result<Notification> {
        let mut state = self.lock()?;
        if message.props.entry_id.is_empty() {
            message.props.entry_id = EntryId::new(state.mint("M"));
        }
        if !message.props.has(&PropTag::RecordKey) {
            let key = state.mint("K");
            message.props.set(PropTag::RecordKey, ExternalValue::Str(key));
        }
        let entry = message.props.entry_id.clone();
        message.folder = folder.clone();
        let node = state.store_mut(store)?;
        if !node.folders.contains_key(folder) {
            return Err(Error::ExternalAccess(format!("folder {folder} not found")));
        }
        node.messages.insert(entry.clone(), message);
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Item,
            NotificationEvent::Created,
            entry,
            folder.clone(),
        ))
    }

    /// Changes item properties.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be found.
    pub fn modify_message(
        &self,
        store: &StoreId,
        entry: &EntryId,
        changes: impl IntoIterator<Item = (PropTag, ExternalValue)>,
    ) -> Result<Notification> {
        let mut state = self.lock()?;
        let message = state
            .store_mut(store)?
            .messages
            .get_mut(entry)
            .ok_or_else(|| Error::ExternalAccess(format!("item {entry} not found")))?;
        for (tag, value) in changes {
            message.props.set(tag, value);
        }
        message.props.set(
            PropTag::LastModificationTime,
            ExternalValue::Date(Utc::now()),
        );
        let folder = message.folder.clone();
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Item,
            NotificationEvent::Modified,
            entry.clone(),
            folder,
        ))
    }

    /// Moves an item; the item gets a new entry id and keeps its record key.
    ///
    /// # Errors
    ///
    /// Returns an error if the item or the destination is unknown.
    pub fn move_message(&self, store: &StoreId, entry: &EntryId, to: &EntryId) -> Result<Notification> {
        let mut state = self.lock()?;
        let new_entry = EntryId::new(state.mint("M"));
        let node = state.store_mut(store)?;
        if !node.folders.contains_key(to) {
            return Err(Error::ExternalAccess(format!("folder {to} not found")));
        }
        let mut message = node
            .messages
            .remove(entry)
            .ok_or_else(|| Error::ExternalAccess(format!("item {entry} not found")))?;
        let old_folder = std::mem::replace(&mut message.folder, to.clone());
        message.props.entry_id = new_entry.clone();
        node.messages.insert(new_entry.clone(), message);
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Item,
            NotificationEvent::Moved,
            new_entry,
            to.clone(),
        )
        .moved_from(entry.clone(), old_folder))
    }

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown.
    pub fn delete_message(&self, store: &StoreId, entry: &EntryId) -> Result<Notification> {
        let mut state = self.lock()?;
        let message = state
            .store_mut(store)?
            .messages
            .remove(entry)
            .ok_or_else(|| Error::ExternalAccess(format!("item {entry} not found")))?;
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Item,
            NotificationEvent::Deleted,
            entry.clone(),
            message.folder,
        ))
    }

    /// Removes an item from its folder table while keeping it openable.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown.
    pub fn hide_message(&self, store: &StoreId, entry: &EntryId) -> Result<Notification> {
        let mut state = self.lock()?;
        let message = state
            .store_mut(store)?
            .messages
            .get_mut(entry)
            .ok_or_else(|| Error::ExternalAccess(format!("item {entry} not found")))?;
        message.hidden = true;
        Ok(Notification::new(
            store.clone(),
            ObjectKind::Item,
            NotificationEvent::Deleted,
            entry.clone(),
            message.folder.clone(),
        ))
    }

    /// Deletes a folder with all subfolders and items.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder is unknown.
    pub fn delete_folder(&self, store: &StoreId, entry: &EntryId) -> Result<Notification> {
        let mut state = self.lock()?;
        let node = state.store_mut(store)?;
        let parent = node
            .folders
            .get(entry)
            .ok_or_else(|| Error::ExternalAccess(format!("folder {entry} not found")))?
            .parent
            .clone()
            .unwrap_or_default();

        let mut doomed = vec![entry.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor].clone();
            doomed.extend(
                node.folders
                    .iter()
                    .filter(|(_, f)| f.parent.as_ref() == Some(&current))
                    .map(|(id, _)| id.clone()),
            );
            cursor += 1;
        }
        for folder in &doomed {
            node.folders.remove(folder);
        }
        node.messages.retain(|_, m| !doomed.contains(&m.folder));

        Ok(Notification::new(
            store.clone(),
            ObjectKind::Folder,
            NotificationEvent::Deleted,
            entry.clone(),
            parent,
        ))
    }

    /// Applies a replay event and returns the notification it produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the event refers to unknown objects.
    pub fn apply(&self, event: StoreEvent) -> Result<Notification> {
        match event {
            StoreEvent::AddFolder {
                store,
                parent,
                name,
                container_class,
            } => self.add_folder(&store, &parent, &name, &container_class),
            StoreEvent::AddMessage {
                store,
                folder,
                message,
            } => self.add_message(&store, &folder, message),
            StoreEvent::ModifyMessage {
                store,
                entry,
                changes,
            } => self.modify_message(&store, &entry, changes),
            StoreEvent::MoveMessage { store, entry, to } => self.move_message(&store, &entry, &to),
            StoreEvent::DeleteMessage { store, entry } => self.delete_message(&store, &entry),
            StoreEvent::DeleteFolder { store, entry } => self.delete_folder(&store, &entry),
        }
    }
}

impl ExternalStore for MemoryExternalStore {
    fn stores(&self) -> Result<Vec<StoreInfo>> {
        Ok(self.lock()?.stores.iter().map(|s| s.info.clone()).collect())
    }

    fn root_folder(&self, store: &StoreId) -> Result<EntryIdPair> {
        let state = self.lock()?;
        Ok(EntryIdPair::new(state.store(store)?.root.clone(), store.clone()))
    }

    fn open_folder(&self, folder: &EntryIdPair) -> Result<PropertyBag> {
        let state = self.lock()?;
        let node = state
            .store(&folder.store_id)?
            .folders
            .get(&folder.entry_id)
            .ok_or_else(|| Error::ExternalAccess(format!("folder {folder} cannot be opened")))?;
        let mut bag = node.props.clone();
        bag.entry_id = folder.entry_id.clone();
        bag.set(
            PropTag::EntryId,
            ExternalValue::Str(folder.entry_id.to_string()),
        );
        if let Some(parent) = &node.parent {
            bag.set(PropTag::ParentEntryId, ExternalValue::Str(parent.to_string()));
        }
        let count = state
            .store(&folder.store_id)?
            .messages
            .values()
            .filter(|m| m.folder == folder.entry_id && !m.hidden)
            .count();
        bag.set(
            PropTag::ContentCount,
            ExternalValue::Int(i64::try_from(count).unwrap_or(i64::MAX)),
        );
        Ok(bag)
    }

    fn open_message(&self, message: &EntryIdPair) -> Result<PropertyBag> {
        let state = self.lock()?;
        let node = state
            .store(&message.store_id)?
            .messages
            .get(&message.entry_id)
            .ok_or_else(|| Error::ExternalAccess(format!("item {message} cannot be opened")))?;
        let mut bag = node.props.clone();
        bag.entry_id = message.entry_id.clone();
        bag.set(
            PropTag::EntryId,
            ExternalValue::Str(message.entry_id.to_string()),
        );
        bag.set(
            PropTag::ParentEntryId,
            ExternalValue::Str(node.folder.to_string()),
        );
        Ok(bag)
    }

    fn recipients(&self, message: &EntryIdPair) -> Result<Vec<PropertyBag>> {
        let state = self.lock()?;
        state
            .store(&message.store_id)?
            .messages
            .get(&message.entry_id)
            .map(|m| m.recipients.clone())
            .ok_or_else(|| Error::ExternalAccess(format!("item {message} cannot be opened")))
    }

    fn attachments(&self, message: &EntryIdPair) -> Result<Vec<PropertyBag>> {
        let state = self.lock()?;
        state
            .store(&message.store_id)?
            .messages
            .get(&message.entry_id)
            .map(|m| m.attachments.clone())
            .ok_or_else(|| Error::ExternalAccess(format!("item {message} cannot be opened")))
    }

    fn child_folders(&self, folder: &EntryIdPair) -> Result<Vec<EntryId>> {
        let state = self.lock()?;
        let node = state.store(&folder.store_id)?;
        if !node.folders.contains_key(&folder.entry_id) {
            return Err(Error::ExternalAccess(format!(
                "folder {folder} cannot be opened"
            )));
        }
        Ok(node
            .folders
            .iter()
            .filter(|(_, f)| f.parent.as_ref() == Some(&folder.entry_id))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn message_table(&self, folder: &EntryIdPair) -> Result<Vec<MessageRow>> {
        let state = self.lock()?;
        let node = state.store(&folder.store_id)?;
        if !node.folders.contains_key(&folder.entry_id) {
            return Err(Error::ExternalAccess(format!(
                "folder {folder} cannot be opened"
            )));
        }
        let mut rows: Vec<MessageRow> = node
            .messages
            .iter()
            .filter(|(_, m)| m.folder == folder.entry_id && !m.hidden)
            .map(|(id, m)| MessageRow {
                entry_id: id.clone(),
                delivery_time: m.props.date(&PropTag::MessageDeliveryTime),
                message_class: m.props.string(&PropTag::MessageClass),
            })
            .collect();
        rows.sort_by(|a, b| b.delivery_time.cmp(&a.delivery_time));
        Ok(rows)
    }

    fn default_folder(&self, store: &StoreId, kind: DefaultFolder) -> Result<EntryIdPair> {
        let state = self.lock()?;
        state
            .store(store)?
            .default_folders
            .get(&kind)
            .map(|entry| EntryIdPair::new(entry.clone(), store.clone()))
            .ok_or_else(|| Error::ExternalAccess(format!("store {store} has no {kind:?} folder")))
    }

    fn create_message(&self, folder: &EntryIdPair, message_class: &str) -> Result<EntryIdPair> {
        let notification = self.add_message(
            &folder.store_id,
            &folder.entry_id,
            MessageNode::new(EntryId::default(), message_class),
        )?;
        Ok(EntryIdPair::new(notification.entry_id, folder.store_id.clone()))
    }

    fn save_changes(
        &self,
        message: &EntryIdPair,
        changes: &[(PropTag, ExternalValue)],
    ) -> Result<()> {
        let mut state = self.lock()?;
        let node = state
            .store_mut(&message.store_id)?
            .messages
            .get_mut(&message.entry_id)
            .ok_or_else(|| Error::ExternalAccess(format!("item {message} cannot be opened")))?;
        for (tag, value) in changes {
            node.props.set(tag.clone(), value.clone());
        }
        node.props.set(
            PropTag::LastModificationTime,
            ExternalValue::Date(Utc::now()),
        );
        Ok(())
    }

    fn can_open(&self, pair: &EntryIdPair) -> bool {
        self.lock().is_ok_and(|state| {
            state.store(&pair.store_id).is_ok_and(|s| {
                s.messages.contains_key(&pair.entry_id) || s.folders.contains_key(&pair.entry_id)
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::external::StoreKind;

    fn session() -> (MemoryExternalStore, StoreId, EntryId) {
        let ext = MemoryExternalStore::new();
        let store = StoreId::new("S1");
        let root = ext
            .add_store(StoreInfo {
                store_id: store.clone(),
                name: "Personal".into(),
                kind: StoreKind::Personal,
            })
            .unwrap();
        let inbox = ext
            .add_folder(&store, &root.entry_id, "Inbox", "IPF.Note")
            .unwrap()
            .entry_id;
        (ext, store, inbox)
    }

    #[test]
    fn test_move_rolls_entry_id_and_keeps_record_key() {
        let (ext, store, inbox) = session();
        let archive = ext
            .add_folder(&store, &inbox, "Archive", "IPF.Note")
            .unwrap()
            .entry_id;
        let created = ext
            .add_message(&store, &inbox, MessageNode::new(EntryId::default(), "IPM.Note"))
            .unwrap();
        let old = EntryIdPair::new(created.entry_id.clone(), store.clone());
        let key = ext.open_message(&old).unwrap().string(&PropTag::RecordKey);

        let moved = ext.move_message(&store, &created.entry_id, &archive).unwrap();

        assert_ne!(moved.entry_id, created.entry_id);
        assert_eq!(moved.old_entry_id, Some(created.entry_id.clone()));
        assert_eq!(moved.old_parent_id, Some(inbox));
        assert!(!ext.can_open(&old));
        let reopened = ext
            .open_message(&EntryIdPair::new(moved.entry_id, store))
            .unwrap();
        assert_eq!(reopened.string(&PropTag::RecordKey), key);
    }

    #[test]
    fn test_message_table_newest_first_and_skips_hidden() {
        let (ext, store, inbox) = session();
        let older = Utc::now() - chrono::Duration::days(1);
        let newer = Utc::now();
        for (id, when) in [("A", older), ("B", newer), ("C", newer)] {
            ext.add_message(
                &store,
                &inbox,
                MessageNode::new(EntryId::new(id), "IPM.Note")
                    .with(PropTag::MessageDeliveryTime, ExternalValue::Date(when)),
            )
            .unwrap();
        }
        ext.hide_message(&store, &EntryId::new("C")).unwrap();

        let rows = ext
            .message_table(&EntryIdPair::new(inbox, store.clone()))
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, ["B", "A"]);
        assert!(ext.can_open(&EntryIdPair::new(EntryId::new("C"), store)));
    }

    #[test]
    fn test_delete_folder_is_recursive() {
        let (ext, store, inbox) = session();
        let sub = ext
            .add_folder(&store, &inbox, "Sub", "IPF.Note")
            .unwrap()
            .entry_id;
        ext.add_message(&store, &sub, MessageNode::new(EntryId::new("X"), "IPM.Note"))
            .unwrap();

        ext.delete_folder(&store, &inbox).unwrap();

        assert!(!ext.can_open(&EntryIdPair::new(sub, store.clone())));
        assert!(!ext.can_open(&EntryIdPair::new(EntryId::new("X"), store)));
    }

    #[test]
    fn test_snapshot_json_roundtrip_preserves_bags() {
        let (ext, store, inbox) = session();
        ext.add_message(
            &store,
            &inbox,
            MessageNode::new(EntryId::new("A"), "IPM.Note")
                .with(PropTag::Subject, ExternalValue::Str("hello".into())),
        )
        .unwrap();
        let json = serde_json::to_string(&ext.snapshot().unwrap()).unwrap();
        let restored = MemoryExternalStore::from_json(&json).unwrap();
        let bag = restored
            .open_message(&EntryIdPair::new(EntryId::new("A"), store))
            .unwrap();
        assert_eq!(bag.string(&PropTag::Subject), "hello");
    }
}
