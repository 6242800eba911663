use tracing::{debug, info};

use super::Applier;
use crate::Result;
use crate::address_book::ensure_address_book;
use crate::descriptor::{FolderDescriptor, FolderKind};
use crate::external::StoreInfo;
use crate::ids::ResourceId;
use crate::resource::{
    self, LinkType, PropValue, ResourceStore, ResourceType, ResourceUpdate, props,
};

impl<R: ResourceStore> Applier<'_, R> {
    /// Stamps an external store as an `InfoStore` resource.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn apply_store(&self, store: &StoreInfo) -> Result<ResourceId> {
        let existing = resource::find_unique(
            self.store,
            ResourceType::InfoStore,
            props::STORE_ID,
            &PropValue::from(store.store_id.as_str()),
        )
        .await?;
        let mut update = match existing {
            Some(id) => ResourceUpdate::edit(id),
            None => ResourceUpdate::create(ResourceType::InfoStore),
        };
        let supported = store.kind.is_supported();
        update
            .set(props::STORE_ID, store.store_id.as_str())
            .set_text(props::NAME, &store.name)
            .set(props::STORE_TYPE_CHECKED, true)
            .set(props::STORE_SUPPORTED, supported);
        let id = self.store.commit(update).await?;
        if !supported {
            info!("store {} ({}) is not synchronized", store.name, store.store_id);
        }
        Ok(id)
    }

    /// Merges a folder snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn apply_folder(&self, d: &FolderDescriptor) -> Result<ResourceId> {
        let existing =
            resource::find_by_entry_id(self.store, ResourceType::Folder, d.entry_id()).await?;
        let mut update = match existing {
            Some(id) => ResourceUpdate::edit(id),
            None => ResourceUpdate::create(ResourceType::Folder),
        };
        self.stamp_entry_id(&mut update, ResourceType::Folder, d.entry_id())
            .await?;
        update
            .set_text(props::NAME, &d.name)
            .set_text(props::CONTAINER_CLASS, &d.container_class)
            .set(props::CONTENT_COUNT, d.content_count)
            .set(props::STORE_ID, d.folder.store_id.as_str())
            .set(props::IGNORED_FOLDER, self.settings.is_ignored_folder(&d.name));

        let parent = match &d.parent {
            Some(parent) => {
                resource::find_by_entry_id(self.store, ResourceType::Folder, parent).await?
            }
            None => None,
        };
        if d.parent.is_none() || parent.is_some() {
            self.relink(&mut update, existing, LinkType::Parent, parent)
                .await?;
        }

        let owner = resource::find_unique(
            self.store,
            ResourceType::InfoStore,
            props::STORE_ID,
            &PropValue::from(d.folder.store_id.as_str()),
        )
        .await?;
        if owner.is_some() {
            self.relink(&mut update, existing, LinkType::OwnerStore, owner)
                .await?;
        }

        let id = self.store.commit(update).await?;
        if d.kind == FolderKind::Contact {
            ensure_address_book(self.store, &d.name, d.entry_id()).await?;
        }
        debug!("applied folder {} as {id}", d.name);
        Ok(id)
    }
}
