use tracing::{debug, info};

use super::{Applier, set_date};
use crate::Result;
use crate::descriptor::TaskDescriptor;
use crate::ids::{EntryIdPair, RecordKey, ResourceId};
use crate::resource::{
    self, LinkType, PropValue, ResourceStore, ResourceType, ResourceUpdate, props,
};

impl<R: ResourceStore> Applier<'_, R> {
    async fn resolve_task(&self, d: &TaskDescriptor) -> Result<Option<ResourceId>> {
        if let Some(id) =
            resource::find_by_entry_id(self.store, ResourceType::Task, d.entry_id()).await?
        {
            return Ok(Some(id));
        }
        match &d.record_key {
            Some(key) => {
                resource::find_unique(
                    self.store,
                    ResourceType::Task,
                    props::RECORD_KEY,
                    &PropValue::from(key.as_str()),
                )
                .await
            }
            None => Ok(None),
        }
    }

    /// Merges a task snapshot. Tasks of ignored folders are deleted and
    /// yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails or the entry id is
    /// owned by another Task resource.
    pub async fn apply_task(&self, d: &TaskDescriptor) -> Result<Option<ResourceId>> {
        let folder = self.folder_resource(&d.folder.entry_id).await?;
        let existing = self.resolve_task(d).await?;

        if folder.as_ref().is_some_and(|f| self.folder_ignored(f)) {
            if let Some(id) = existing {
                self.delete_item(id).await?;
                debug!("task {id} is in an ignored folder");
            }
            return Ok(None);
        }

        let mut update = match existing {
            Some(id) => ResourceUpdate::edit(id),
            None => ResourceUpdate::create(ResourceType::Task),
        };
        self.stamp_entry_id(&mut update, ResourceType::Task, d.entry_id())
            .await?;
        update
            .set_text(props::SUBJECT, &d.subject)
            .set_text(props::BODY, &d.body)
            .set(props::STATUS, d.status.as_str())
            .set(props::PRIORITY, d.priority)
            .set(props::PERCENT_COMPLETE, d.percent_complete)
            .set(props::STORE_ID, d.item.store_id.as_str());
        set_date(&mut update, props::START_DATE, d.start);
        set_date(&mut update, props::DUE_DATE, d.due);
        set_date(&mut update, props::COMPLETED_DATE, d.completed);
        set_date(&mut update, props::REMIND_DATE, d.remind);
        set_date(&mut update, props::MODIFIED, d.modified);
        if let Some(key) = &d.record_key {
            update.set(props::RECORD_KEY, key.as_str());
        }

        if let Some(folder) = &folder {
            self.relink(&mut update, existing, LinkType::InFolder, Some(folder.id))
                .await?;
        }
        if self.settings.sync_categories {
            self.apply_categories(&mut update, existing, &d.categories)
                .await?;
        }

        let id = self.store.commit(update).await?;
        debug!("applied task {id}");
        Ok(Some(id))
    }

    /// Stamps the external identity of an exported task onto the local
    /// task.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails or another task owns
    /// the entry id.
    pub async fn stamp_exported_task(
        &self,
        task: ResourceId,
        pair: &EntryIdPair,
        record_key: Option<&RecordKey>,
    ) -> Result<()> {
        let mut update = ResourceUpdate::edit(task);
        self.stamp_entry_id(&mut update, ResourceType::Task, &pair.entry_id)
            .await?;
        update.set(props::STORE_ID, pair.store_id.as_str());
        if let Some(key) = record_key {
            update.set(props::RECORD_KEY, key.as_str());
        }
        self.store.commit(update).await?;
        info!("task {task} exported as {}", pair.entry_id);
        Ok(())
    }
}
