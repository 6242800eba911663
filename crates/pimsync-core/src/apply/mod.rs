//! Apply step: merges descriptors into the resource graph.
//!
//! Everything here runs on the resource-store writer queue. Each apply
//! upserts by entry id (so re-applying a descriptor is harmless), records
//! its changes in one [`ResourceUpdate`] and commits it at the end.
//! Helper resources (contacts, accounts, categories, flags, attachments)
//! are found or created with their own commits first.

mod contact;
mod folder;
mod linkage;
mod mail;
mod state;
mod task;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::ids::{EntryId, ResourceId};
use crate::resource::{
    self, Direction, LinkType, Resource, ResourceStore, ResourceType, ResourceUpdate, UpdateTarget,
    props,
};
use crate::{Error, Result};

pub use state::{MailSyncMode, MailTarget};

/// Earliest date the resource store accepts.
fn min_supported_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |d| d.and_utc())
}

/// Latest date the resource store accepts.
fn max_supported_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(4500, 8, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map_or(DateTime::<Utc>::MAX_UTC, |d| d.and_utc())
}

/// Checks a date for a property.
///
/// `MIN_UTC` is the absent marker and yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDate`] if the date is outside the range
/// the resource store can hold.
pub fn check_date(property: &str, date: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    if date == DateTime::<Utc>::MIN_UTC {
        return Ok(None);
    }
    if date < min_supported_date() || date > max_supported_date() {
        return Err(Error::UnsupportedDate {
            property: property.to_string(),
            value: date.to_rfc3339(),
        });
    }
    Ok(Some(date))
}

/// Records a date property; absent dates delete it, unsupported dates
/// are logged and leave it untouched.
pub fn set_date(update: &mut ResourceUpdate, property: &str, date: DateTime<Utc>) {
    match check_date(property, date) {
        Ok(Some(date)) => {
            update.set(property, date);
        }
        Ok(None) => {
            update.delete(property);
        }
        Err(e) => warn!("{e}, property skipped"),
    }
}

/// Merges descriptors into a resource store.
#[derive(Debug)]
pub struct Applier<'a, R> {
    store: &'a R,
    settings: &'a SyncSettings,
}

impl<'a, R: ResourceStore> Applier<'a, R> {
    /// Creates an applier.
    #[must_use]
    pub const fn new(store: &'a R, settings: &'a SyncSettings) -> Self {
        Self { store, settings }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &'a R {
        self.store
    }

    /// Records the entry id in `update` after checking that no other
    /// resource of the type carries it.
    ///
    /// New resources are only created after the same lookup failed on
    /// the writer queue, so only edits are checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryIdConflict`] if another resource owns the id.
    pub async fn stamp_entry_id(
        &self,
        update: &mut ResourceUpdate,
        resource_type: ResourceType,
        entry_id: &EntryId,
    ) -> Result<()> {
        if let UpdateTarget::Existing(target) = update.target() {
            let owners = self
                .store
                .find_by_prop(resource_type, props::ENTRY_ID, &entry_id.into())
                .await?;
            if let Some(owner) = owners.into_iter().find(|owner| *owner != target) {
                return Err(Error::EntryIdConflict {
                    entry_id: entry_id.clone(),
                    owner,
                    target,
                });
            }
        }
        update.set(props::ENTRY_ID, entry_id);
        Ok(())
    }

    /// Moves the stamped entry id of a resource from `old` to `new` after
    /// the external object was moved. Nothing happens when `new` is
    /// already known or `old` is not.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn rekey(
        &self,
        resource_type: ResourceType,
        old: &EntryId,
        new: &EntryId,
    ) -> Result<Option<ResourceId>> {
        if old == new || resource::find_by_entry_id(self.store, resource_type, new).await?.is_some()
        {
            return Ok(None);
        }
        let Some(id) = resource::find_by_entry_id(self.store, resource_type, old).await? else {
            return Ok(None);
        };
        let mut update = ResourceUpdate::edit(id);
        update.set(props::ENTRY_ID, new);
        self.store.commit(update).await?;
        debug!("resource {id} now known as {new}");
        Ok(Some(id))
    }

    /// Loads the folder resource of an external folder.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn folder_resource(&self, folder: &EntryId) -> Result<Option<Resource>> {
        match resource::find_by_entry_id(self.store, ResourceType::Folder, folder).await? {
            Some(id) => self.store.load(id).await,
            None => Ok(None),
        }
    }

    async fn outgoing(&self, target: Option<ResourceId>, link: LinkType) -> Result<Vec<ResourceId>> {
        match target {
            Some(id) => self.store.links(id, link, Direction::Outgoing).await,
            None => Ok(Vec::new()),
        }
    }

    /// Records changes making the outgoing `link`s of `target` equal to
    /// `desired`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn replace_links(
        &self,
        update: &mut ResourceUpdate,
        target: Option<ResourceId>,
        link: LinkType,
        desired: &BTreeSet<ResourceId>,
    ) -> Result<()> {
        let current: BTreeSet<ResourceId> = self.outgoing(target, link).await?.into_iter().collect();
        for stale in current.difference(desired) {
            update.remove_link(link, *stale);
        }
        for missing in desired.difference(&current) {
            update.add_link(link, *missing);
        }
        Ok(())
    }

    /// Records changes making `to` the only outgoing `link` of `target`;
    /// `None` removes the link.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn relink(
        &self,
        update: &mut ResourceUpdate,
        target: Option<ResourceId>,
        link: LinkType,
        to: Option<ResourceId>,
    ) -> Result<()> {
        let desired: BTreeSet<ResourceId> = to.into_iter().collect();
        self.replace_links(update, target, link, &desired).await
    }

    /// Permanently deletes an item and its attachments.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn delete_item(&self, id: ResourceId) -> Result<()> {
        for attachment in self
            .store
            .links(id, LinkType::Attachment, Direction::Outgoing)
            .await?
        {
            self.store.delete(attachment).await?;
        }
        self.store.delete(id).await?;
        debug!("deleted resource {id}");
        Ok(())
    }

    /// Deletes a folder with its subfolders, their items and address
    /// books. Returns the number of folders deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn delete_folder_tree(&self, folder: ResourceId) -> Result<usize> {
        let mut doomed = vec![folder];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor];
            for child in self
                .store
                .links(current, LinkType::Parent, Direction::Incoming)
                .await?
            {
                if !doomed.contains(&child) {
                    doomed.push(child);
                }
            }
            cursor += 1;
        }

        for folder in doomed.iter().rev() {
            for item in self
                .store
                .links(*folder, LinkType::InFolder, Direction::Incoming)
                .await?
            {
                self.delete_item(item).await?;
            }
            if let Some(entry_id) = self.store.load(*folder).await?.and_then(|f| f.entry_id()) {
                if let Some(book) =
                    crate::address_book::find_address_book(self.store, &entry_id).await?
                {
                    self.store.delete(book).await?;
                }
            }
            self.store.delete(*folder).await?;
        }
        info!("deleted {} folder(s) below resource {folder}", doomed.len());
        Ok(doomed.len())
    }
}
