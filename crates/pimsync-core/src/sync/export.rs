//! Export of local tasks to the external store.

use std::sync::Arc;

use tracing::{debug, info};

use super::{SyncContext, Synchronizer};
use crate::descriptor::{TASK_CLASS, TaskExportDescriptor};
use crate::external::{DefaultFolder, ExternalStore, PropTag};
use crate::ids::{EntryIdPair, RecordKey, ResourceId};
use crate::jobs::{ExportTicket, Job, JobPriority, JobScheduler};
use crate::resource::{Direction, LinkType, ResourceStore, props};
use crate::{Error, Result};

impl<E, R> Synchronizer<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    /// Queues the export of a local task.
    ///
    /// Returns false without queuing anything while an export of the
    /// same task is pending or running, or after shutdown.
    pub fn request_task_export(&self, task: ResourceId) -> bool {
        if self.inner.shutdown.is_triggered() {
            return false;
        }
        let Some(ticket) = self.inner.exports.try_acquire(task) else {
            debug!("export of task {task} already in flight");
            return false;
        };
        let ctx = Arc::clone(&self.inner);
        self.inner.access.queue_job(
            JobPriority::Immediate,
            Job::new(format!("export task {task}"), async move {
                ctx.export_task(ticket).await
            }),
        );
        true
    }
}

impl<E, R> SyncContext<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    /// Category paths of a resource, parents joined with backslashes.
    async fn category_paths(&self, id: ResourceId) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for category in self
            .store
            .links(id, LinkType::Category, Direction::Outgoing)
            .await?
        {
            let mut segments = Vec::new();
            let mut cursor = Some(category);
            while let Some(current) = cursor {
                // Parent cycles are tolerated
                if segments.len() > 32 {
                    break;
                }
                let Some(resource) = self.store.load(current).await? else {
                    break;
                };
                segments.push(resource.str_prop(props::NAME).unwrap_or_default().to_string());
                cursor = self
                    .store
                    .links(current, LinkType::Parent, Direction::Outgoing)
                    .await?
                    .first()
                    .copied();
            }
            segments.reverse();
            paths.push(segments.join("\\"));
        }
        Ok(paths)
    }

    /// Folder new tasks are created in: the Tasks folder of the first
    /// supported store.
    fn export_folder(&self) -> Result<EntryIdPair> {
        let store = self
            .external
            .stores()?
            .into_iter()
            .find(|s| s.kind.is_supported())
            .ok_or_else(|| Error::ExternalAccess("no supported store for task export".into()))?;
        self.external.default_folder(&store.store_id, DefaultFolder::Tasks)
    }

    async fn export_task(self: Arc<Self>, ticket: ExportTicket) -> Result<()> {
        let task = ticket.resource();
        let resource = self
            .store
            .load(task)
            .await?
            .ok_or(Error::ResourceNotFound(task))?;
        let categories = self.category_paths(task).await?;
        let descriptor = TaskExportDescriptor::from_resource(&resource, categories);

        let existing = descriptor
            .target
            .clone()
            .filter(|pair| self.external.can_open(pair));
        let pair = match existing {
            Some(pair) => pair,
            None => {
                let folder = self.export_folder()?;
                let pair = self.external.create_message(&folder, TASK_CLASS)?;
                info!("created external task {} for {task}", pair.entry_id);
                pair
            }
        };
        self.external.save_changes(&pair, &descriptor.changes())?;

        let record_key = self
            .external
            .open_message(&pair)?
            .opt_string(&PropTag::RecordKey)
            .map(RecordKey::new);
        if descriptor.target.as_ref() == Some(&pair)
            && resource.str_prop(props::RECORD_KEY) == record_key.as_ref().map(RecordKey::as_str)
        {
            return Ok(());
        }

        // The ticket is released once the stamp is written
        let ctx = Arc::clone(&self);
        self.writer.queue_job(
            JobPriority::Immediate,
            Job::new(format!("stamp exported task {task}"), async move {
                let _ticket = ticket;
                ctx.applier()
                    .stamp_exported_task(task, &pair, record_key.as_ref())
                    .await
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::external::{ExternalValue, MemoryExternalStore, StoreInfo, StoreKind, named};
    use crate::ids::StoreId;
    use crate::resource::{MemoryResourceStore, ResourceType, ResourceUpdate};

    fn external() -> (MemoryExternalStore, StoreId) {
        let ext = MemoryExternalStore::new();
        let store = StoreId::new("S");
        let root = ext
            .add_store(StoreInfo {
                store_id: store.clone(),
                name: "Personal".into(),
                kind: StoreKind::Personal,
            })
            .unwrap();
        let tasks = ext
            .add_folder(&store, &root.entry_id, "Tasks", "IPF.Task")
            .unwrap()
            .entry_id;
        ext.set_default_folder(&store, DefaultFolder::Tasks, &tasks)
            .unwrap();
        (ext, store)
    }

    #[tokio::test]
    async fn test_export_creates_and_stamps() {
        let (ext, _) = external();
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        let mut update = ResourceUpdate::create(ResourceType::Task);
        update
            .set(props::SUBJECT, "Renew passport")
            .set(props::STATUS, "InProgress");
        let task = sync.store().commit(update).await.unwrap();

        assert!(sync.request_task_export(task));
        sync.drain().await;

        let stamped = sync.store().load(task).await.unwrap().unwrap();
        let entry = stamped.entry_id().unwrap();
        let pair = EntryIdPair::new(entry, StoreId::new("S"));
        let bag = sync.external().open_message(&pair).unwrap();
        assert_eq!(bag.string(&PropTag::Subject), "Renew passport");
        assert_eq!(bag.int(&named::TASK_STATUS), 1);
        assert!(stamped.str_prop(props::RECORD_KEY).is_some());
        assert!(!sync.exports().is_held(task));

        // A second export updates the same external item
        let mut update = ResourceUpdate::edit(task);
        update.set(props::SUBJECT, "Renew passport now");
        sync.store().commit(update).await.unwrap();
        assert!(sync.request_task_export(task));
        sync.drain().await;
        assert_eq!(
            sync.store().load(task).await.unwrap().unwrap().entry_id(),
            Some(pair.entry_id.clone())
        );
        assert_eq!(
            sync.external().open_message(&pair).unwrap().props.get(&PropTag::Subject),
            Some(&ExternalValue::Str("Renew passport now".into()))
        );
    }

    #[tokio::test]
    async fn test_back_to_back_requests_queue_one_job() {
        let (ext, _) = external();
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        let task = sync
            .store()
            .commit(ResourceUpdate::create(ResourceType::Task))
            .await
            .unwrap();

        assert!(sync.request_task_export(task));
        assert!(!sync.request_task_export(task));
        assert_eq!(sync.access().len(), 1);

        sync.drain().await;
        assert!(!sync.exports().is_held(task));
        assert!(sync.request_task_export(task));
    }

    #[tokio::test]
    async fn test_missing_task_releases_guard() {
        let (ext, _) = external();
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        let ghost = ResourceId(99);
        assert!(sync.request_task_export(ghost));
        sync.drain().await;
        assert!(!sync.exports().is_held(ghost));
    }
}
