//! Full re-enumeration of external stores.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{SyncContext, Synchronizer};
use crate::Result;
use crate::address_book::find_address_book;
use crate::descriptor::FolderKind;
use crate::external::{ExternalStore, PropTag};
use crate::ids::{EntryId, EntryIdPair, StoreId};
use crate::jobs::{Job, JobScheduler};
use crate::recovery::{self, ITEM_KINDS};
use crate::resource::{self, LinkType, ResourceStore, ResourceType};

impl<E, R> Synchronizer<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    /// Queues a full enumeration of every store of the session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shutdown`] once shutdown has been requested.
    pub fn enumerate_all(&self) -> Result<()> {
        self.inner.shutdown.check()?;
        let ctx = Arc::clone(&self.inner);
        self.inner.access.queue_job(
            self.inner.settings.enumeration_priority,
            Job::new("enumerate stores", async move { ctx.enumerate_all() }),
        );
        Ok(())
    }

    /// Queues a full enumeration of one store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shutdown`] once shutdown has been requested.
    pub fn enumerate_store(&self, store: StoreId) -> Result<()> {
        self.inner.shutdown.check()?;
        let ctx = Arc::clone(&self.inner);
        self.inner.access.queue_job(
            self.inner.settings.enumeration_priority,
            Job::new(format!("enumerate store {store}"), async move {
                ctx.enumerate_store(&store).await
            }),
        );
        Ok(())
    }

    /// Queues the enumeration of one folder's items.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shutdown`] once shutdown has been requested.
    pub fn enumerate_folder(&self, folder: EntryIdPair) -> Result<()> {
        self.inner.shutdown.check()?;
        let ctx = Arc::clone(&self.inner);
        self.inner.access.queue_job(
            self.inner.settings.enumeration_priority,
            Job::new(format!("enumerate folder {}", folder.entry_id), async move {
                ctx.enumerate_folder(&folder).await
            }),
        );
        Ok(())
    }

    /// Queues the pruning of contacts that vanished from a contact
    /// folder.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shutdown`] once shutdown has been requested.
    pub fn prune_address_book(&self, folder: EntryIdPair) -> Result<()> {
        self.inner.shutdown.check()?;
        let ctx = Arc::clone(&self.inner);
        self.inner.access.queue_job(
            self.inner.settings.enumeration_priority,
            Job::new(format!("prune address book {}", folder.entry_id), async move {
                ctx.prune_address_book(&folder).await
            }),
        );
        Ok(())
    }
}

impl<E, R> SyncContext<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    /// Stamps every store and queues the enumeration of supported ones.
    fn enumerate_all(self: Arc<Self>) -> Result<()> {
        for info in self.external.stores()? {
            let ctx = Arc::clone(&self);
            let stamped = info.clone();
            self.writer.queue_job(
                self.settings.enumeration_priority,
                Job::new(format!("check store {}", info.store_id), async move {
                    ctx.applier().apply_store(&stamped).await.map(|_| ())
                }),
            );
            if !info.kind.is_supported() {
                debug!("skipping unsupported store {}", info.name);
                continue;
            }
            let ctx = Arc::clone(&self);
            let store = info.store_id.clone();
            self.access.queue_job(
                self.settings.enumeration_priority,
                Job::new(format!("enumerate store {store}"), async move {
                    ctx.enumerate_store(&store).await
                }),
            );
        }
        Ok(())
    }

    /// Walks the folder tree breadth first. Each folder's apply is
    /// queued before its items so items find their folder.
    async fn enumerate_store(self: Arc<Self>, store: &StoreId) -> Result<()> {
        let root = self.external.root_folder(store)?;
        let mut pending = VecDeque::from([root]);
        let mut folders = 0usize;

        while let Some(folder) = pending.pop_front() {
            self.shutdown.check()?;
            if let Err(e) = self.queue_folder(&folder, self.settings.enumeration_priority) {
                warn!("folder {} skipped: {e}", folder.entry_id);
                continue;
            }
            folders += 1;
            if let Err(e) = Arc::clone(&self).enumerate_folder(&folder).await {
                warn!("items of folder {} skipped: {e}", folder.entry_id);
            }
            for child in self.external.child_folders(&folder)? {
                pending.push_back(folder.sibling(child));
            }
        }
        info!("enumerated {folders} folder(s) of store {store}");
        Ok(())
    }

    /// Queues every item of a folder, newest first, then prunes local
    /// items that are gone.
    async fn enumerate_folder(self: Arc<Self>, folder: &EntryIdPair) -> Result<()> {
        let bag = self.external.open_folder(folder)?;
        let kind = FolderKind::from_container_class(&bag.string(&PropTag::ContainerClass));
        if kind == FolderKind::Other {
            return Ok(());
        }

        let rows = self.external.message_table(folder)?;
        let mut queued = 0usize;
        for row in &rows {
            self.shutdown.check()?;
            let item = folder.sibling(row.entry_id.clone());
            match self
                .item_changed(&item, false, Some(self.settings.enumeration_priority))
                .await
            {
                Ok(()) => queued += 1,
                Err(e) => debug!("item {} skipped: {e}", row.entry_id),
            }
        }
        debug!("queued {queued} of {} item(s) in {}", rows.len(), folder.entry_id);

        let live: Vec<EntryId> = rows.into_iter().map(|row| row.entry_id).collect();
        if kind == FolderKind::Contact {
            return self.prune_contacts(folder, &live).await;
        }
        self.prune_items(folder, &live).await
    }

    /// Deletes local items of a folder missing from its live listing.
    async fn prune_items(self: &Arc<Self>, folder: &EntryIdPair, live: &[EntryId]) -> Result<()> {
        let Some(local) =
            resource::find_by_entry_id(&self.store, ResourceType::Folder, &folder.entry_id).await?
        else {
            return Ok(());
        };
        let known =
            recovery::known_children(&self.store, local, LinkType::InFolder, &ITEM_KINDS).await?;
        let vanished = recovery::live_diff(&known, live, |id| {
            self.external.can_open(&folder.sibling(id.clone()))
        });
        for entry_id in vanished {
            if let Some((_, id)) =
                recovery::resolve_entry_id(&self.store, &entry_id, &ITEM_KINDS).await?
            {
                self.queue_delete_item(id, &entry_id);
            }
        }
        Ok(())
    }

    async fn prune_address_book(self: Arc<Self>, folder: &EntryIdPair) -> Result<()> {
        let live: Vec<EntryId> = self
            .external
            .message_table(folder)?
            .into_iter()
            .map(|row| row.entry_id)
            .collect();
        self.prune_contacts(folder, &live).await
    }

    /// Two-phase pruning of the contacts in a folder's address book.
    async fn prune_contacts(self: &Arc<Self>, folder: &EntryIdPair, live: &[EntryId]) -> Result<()> {
        let Some(book) = find_address_book(&self.store, &folder.entry_id).await? else {
            return Ok(());
        };
        let contact_kinds = [ResourceType::Contact];
        let known =
            recovery::known_children(&self.store, book, LinkType::InAddressBook, &contact_kinds)
                .await?;
        let can_open = |id: &EntryId| self.external.can_open(&folder.sibling(id.clone()));

        let mut vanished: Vec<EntryId> = known.iter().filter(|id| !can_open(id)).cloned().collect();
        if vanished.is_empty() {
            vanished = recovery::live_diff(&known, live, can_open);
        }
        for entry_id in vanished {
            if let Some(id) =
                resource::find_by_entry_id(&self.store, ResourceType::Contact, &entry_id).await?
            {
                self.queue_delete_item(id, &entry_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::external::{ExternalValue, MemoryExternalStore, MessageNode, StoreInfo, StoreKind};
    use crate::resource::{Direction, MemoryResourceStore};

    fn populated() -> (MemoryExternalStore, StoreId, EntryId, EntryId) {
        let ext = MemoryExternalStore::new();
        let store = StoreId::new("S");
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
        let contacts = ext
            .add_folder(&store, &root.entry_id, "Contacts", "IPF.Contact")
            .unwrap()
            .entry_id;
        for id in ["M1", "M2"] {
            ext.add_message(
                &store,
                &inbox,
                MessageNode::new(EntryId::new(id), "IPM.Note")
                    .with(PropTag::Subject, ExternalValue::Str(id.into())),
            )
            .unwrap();
        }
        ext.add_message(
            &store,
            &contacts,
            MessageNode::new(EntryId::new("C1"), "IPM.Contact")
                .with(PropTag::DisplayName, ExternalValue::Str("Ada".into())),
        )
        .unwrap();
        ext.add_store(StoreInfo {
            store_id: StoreId::new("P"),
            name: "Public Folders".into(),
            kind: StoreKind::PublicFolders,
        })
        .unwrap();
        (ext, store, inbox, contacts)
    }

    #[tokio::test]
    async fn test_enumerate_all_builds_graph() {
        let (ext, _, _, _) = populated();
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        sync.enumerate_all().unwrap();
        sync.drain().await;

        let store = sync.store();
        assert_eq!(store.list(ResourceType::InfoStore).await.unwrap().len(), 2);
        // Root, Inbox and Contacts of the supported store only
        assert_eq!(store.list(ResourceType::Folder).await.unwrap().len(), 3);
        assert_eq!(store.list(ResourceType::Email).await.unwrap().len(), 2);
        assert_eq!(store.list(ResourceType::AddressBook).await.unwrap().len(), 1);
        let contacts = store.list(ResourceType::Contact).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert!(resource::has_link(store, contacts[0], LinkType::InAddressBook)
            .await
            .unwrap());

        for mail in store.list(ResourceType::Email).await.unwrap() {
            assert_eq!(
                store
                    .links(mail, LinkType::InFolder, Direction::Outgoing)
                    .await
                    .unwrap()
                    .len(),
                1
            );
        }
    }

    #[tokio::test]
    async fn test_second_enumeration_prunes_vanished_items() {
        let (ext, store_id, inbox, contacts) = populated();
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        sync.enumerate_all().unwrap();
        sync.drain().await;

        let mails = sync.store().list(ResourceType::Email).await.unwrap();
        let gone = sync
            .store()
            .load(mails[0])
            .await
            .unwrap()
            .unwrap()
            .entry_id()
            .unwrap();
        sync.external().delete_message(&store_id, &gone).unwrap();
        let contact = sync.store().list(ResourceType::Contact).await.unwrap()[0];
        let contact_entry = sync
            .store()
            .load(contact)
            .await
            .unwrap()
            .unwrap()
            .entry_id()
            .unwrap();
        sync.external()
            .delete_message(&store_id, &contact_entry)
            .unwrap();

        sync.enumerate_folder(EntryIdPair::new(inbox, store_id.clone()))
            .unwrap();
        sync.prune_address_book(EntryIdPair::new(contacts, store_id))
            .unwrap();
        sync.drain().await;

        assert_eq!(sync.store().list(ResourceType::Email).await.unwrap(), vec![mails[1]]);
        assert!(sync.store().list(ResourceType::Contact).await.unwrap().is_empty());
    }
}
