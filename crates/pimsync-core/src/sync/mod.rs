//! The synchronizer: notification handling on two job queues.
//!
//! External access (opening objects, reading tables, identity recovery)
//! runs on the `access` queue, which may read the resource store but
//! never writes it. Every mutation of the resource graph is queued on
//! the single `writer` queue. Jobs carry an `Arc` of the shared context.

mod enumerate;
mod export;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::apply::{Applier, MailSyncMode};
use crate::config::SyncSettings;
use crate::descriptor::{
    ContactDescriptor, FolderDescriptor, ItemKind, MailDescriptor, TaskDescriptor,
};
use crate::external::{ExternalStore, Notification, NotificationEvent, ObjectKind, PropTag};
use crate::ids::{EntryId, EntryIdPair, RecordKey, ResourceId};
use crate::jobs::{DelayedJob, ExportGuard, Job, JobPriority, JobQueue, JobScheduler, Shutdown};
use crate::recovery::{self, ITEM_KINDS, Vanished};
use crate::resource::{self, LinkType, ResourceStore, ResourceType};
use crate::{Error, Result};

/// Shared state captured by every job.
struct SyncContext<E, R> {
    external: E,
    store: R,
    settings: SyncSettings,
    writer: JobQueue,
    access: JobQueue,
    shutdown: Shutdown,
    exports: ExportGuard,
    retries: Mutex<Vec<DelayedJob>>,
}

/// Incremental synchronizer of an external store into a resource store.
pub struct Synchronizer<E, R> {
    inner: Arc<SyncContext<E, R>>,
}

impl<E, R> Clone for Synchronizer<E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, R> std::fmt::Debug for Synchronizer<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("writer", &self.inner.writer.len())
            .field("access", &self.inner.access.len())
            .finish_non_exhaustive()
    }
}

impl<E, R> Synchronizer<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    /// Creates a synchronizer with idle queues.
    pub fn new(external: E, store: R, settings: SyncSettings) -> Self {
        let shutdown = Shutdown::new();
        Self {
            inner: Arc::new(SyncContext {
                external,
                store,
                settings,
                writer: JobQueue::new("writer", shutdown.clone()),
                access: JobQueue::new("access", shutdown.clone()),
                shutdown,
                exports: ExportGuard::new(),
                retries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The external store.
    #[must_use]
    pub fn external(&self) -> &E {
        &self.inner.external
    }

    /// The resource store.
    #[must_use]
    pub fn store(&self) -> &R {
        &self.inner.store
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// Queue of resource-store mutations.
    #[must_use]
    pub fn writer(&self) -> &JobQueue {
        &self.inner.writer
    }

    /// Queue of external-store work.
    #[must_use]
    pub fn access(&self) -> &JobQueue {
        &self.inner.access
    }

    /// Export guard of in-flight task exports.
    #[must_use]
    pub fn exports(&self) -> &ExportGuard {
        &self.inner.exports
    }

    /// Number of deferred retries that have not fired yet.
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.inner
            .retries
            .lock()
            .map_or(0, |r| r.iter().filter(|job| !job.is_finished()).count())
    }

    /// Runs both queues in the current task until neither has work.
    /// Returns the number of jobs run.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.inner.access.run_pending().await + self.inner.writer.run_pending().await;
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Starts one worker per queue.
    #[must_use]
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.inner.access.spawn_worker(),
            self.inner.writer.spawn_worker(),
        ]
    }

    /// Stops the workers, skips queued jobs and cancels deferred retries.
    pub fn shutdown(&self) {
        self.inner.shutdown.trigger();
        if let Ok(mut retries) = self.inner.retries.lock() {
            for job in retries.drain(..) {
                job.cancel();
            }
        }
        info!("synchronizer shut down");
    }

    /// Queues the processing of an external notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] once shutdown has been requested.
    pub fn handle_notification(&self, notification: Notification) -> Result<()> {
        self.inner.shutdown.check()?;
        let ctx = Arc::clone(&self.inner);
        let name = format!("notification {}", notification.label());
        self.inner.access.queue_job(
            self.inner.settings.notification_priority,
            Job::new(name, async move { ctx.process_notification(notification).await }),
        );
        Ok(())
    }
}

impl<E, R> SyncContext<E, R>
where
    E: ExternalStore + 'static,
    R: ResourceStore + 'static,
{
    const fn applier(&self) -> Applier<'_, R> {
        Applier::new(&self.store, &self.settings)
    }

    async fn process_notification(self: Arc<Self>, n: Notification) -> Result<()> {
        debug!("processing {}", n.label());
        match (n.kind, n.event) {
            (ObjectKind::Folder, NotificationEvent::Deleted) => self.folder_deleted(n, true).await,
            (ObjectKind::Folder, _) => {
                let pair = EntryIdPair::new(n.entry_id, n.store_id);
                self.queue_folder(&pair, self.settings.notification_priority)
            }
            (ObjectKind::Item, NotificationEvent::Deleted) => self.item_deleted(n, true).await,
            (ObjectKind::Item, NotificationEvent::Moved) => self.item_moved(n).await,
            (ObjectKind::Item, NotificationEvent::Created | NotificationEvent::Modified) => {
                let pair = EntryIdPair::new(n.entry_id, n.store_id);
                self.item_changed(&pair, false, None).await
            }
        }
    }

    /// Snapshots a folder and queues its apply.
    fn queue_folder(self: &Arc<Self>, pair: &EntryIdPair, priority: JobPriority) -> Result<()> {
        let bag = self.external.open_folder(pair)?;
        let descriptor = FolderDescriptor::snapshot(pair, &bag);
        let ctx = Arc::clone(self);
        self.writer.queue_job(
            priority,
            Job::new(format!("apply folder {}", descriptor.name), async move {
                ctx.applier().apply_folder(&descriptor).await.map(|_| ())
            }),
        );
        Ok(())
    }

    /// Snapshots an item and queues its apply.
    ///
    /// `priority` overrides the priority derived from the mail state.
    async fn item_changed(
        self: &Arc<Self>,
        pair: &EntryIdPair,
        moved: bool,
        priority: Option<JobPriority>,
    ) -> Result<()> {
        let bag = self.external.open_message(pair)?;
        let ctx = Arc::clone(self);
        match ItemKind::from_message_class(&bag.string(&PropTag::MessageClass)) {
            ItemKind::Mail => {
                let mode = if moved {
                    MailSyncMode::Moved
                } else {
                    MailSyncMode::Normal
                };
                let record_key = bag.opt_string(&PropTag::RecordKey).map(RecordKey::new);
                let target = mode
                    .resolve_target(&self.store, &pair.entry_id, record_key.as_ref())
                    .await?;
                let descriptor =
                    MailDescriptor::snapshot(&self.external, pair, &bag, mode, target.depth)?;
                let priority =
                    priority.unwrap_or_else(|| target.mode.on_snapshot_complete(&self.settings));
                self.writer.queue_job(
                    priority,
                    Job::new(format!("apply mail {}", pair.entry_id), async move {
                        ctx.applier().apply_mail(&descriptor).await.map(|_| ())
                    }),
                );
            }
            ItemKind::Contact => {
                let descriptor = ContactDescriptor::snapshot(pair, &bag);
                self.writer.queue_job(
                    priority.unwrap_or(self.settings.notification_priority),
                    Job::new(format!("apply contact {}", pair.entry_id), async move {
                        ctx.applier().apply_contact(&descriptor).await.map(|_| ())
                    }),
                );
            }
            ItemKind::Task => {
                let descriptor = TaskDescriptor::snapshot(pair, &bag);
                self.writer.queue_job(
                    priority.unwrap_or(self.settings.notification_priority),
                    Job::new(format!("apply task {}", pair.entry_id), async move {
                        ctx.applier().apply_task(&descriptor).await.map(|_| ())
                    }),
                );
            }
        }
        Ok(())
    }

    async fn item_moved(self: Arc<Self>, n: Notification) -> Result<()> {
        let pair = EntryIdPair::new(n.entry_id.clone(), n.store_id.clone());
        let bag = match self.external.open_message(&pair) {
            Ok(bag) => bag,
            Err(e) => {
                // Moved somewhere unreadable: treat as a delete from the old folder
                debug!("moved item {} cannot be opened: {e}", n.entry_id);
                let deleted = Notification {
                    event: NotificationEvent::Deleted,
                    entry_id: n.old_entry_id.clone().unwrap_or(n.entry_id),
                    parent_id: n.old_parent_id.clone().unwrap_or(n.parent_id),
                    ..n
                };
                return self.item_deleted(deleted, true).await;
            }
        };

        let kind = ItemKind::from_message_class(&bag.string(&PropTag::MessageClass));
        if kind != ItemKind::Mail {
            if let Some(old) = n.old_entry_id.clone() {
                let resource_type = match kind {
                    ItemKind::Contact => ResourceType::Contact,
                    _ => ResourceType::Task,
                };
                let ctx = Arc::clone(&self);
                let new = n.entry_id.clone();
                self.writer.queue_job(
                    self.settings.notification_priority,
                    Job::new(format!("rekey {old}"), async move {
                        ctx.applier()
                            .rekey(resource_type, &old, &new)
                            .await
                            .map(|_| ())
                    }),
                );
            }
        }
        self.item_changed(&pair, kind == ItemKind::Mail, None).await
    }

    /// Resolves and deletes the target of an item delete.
    async fn item_deleted(self: Arc<Self>, n: Notification, may_retry: bool) -> Result<()> {
        if let Some((_, id)) =
            recovery::resolve_entry_id(&self.store, &n.entry_id, &ITEM_KINDS).await?
        {
            self.queue_delete_item(id, &n.entry_id);
            return Ok(());
        }

        let parent = EntryIdPair::new(n.parent_id.clone(), n.store_id.clone());
        let found = match resource::find_by_entry_id(&self.store, ResourceType::Folder, &parent.entry_id)
            .await?
        {
            Some(folder) => {
                let known =
                    recovery::known_children(&self.store, folder, LinkType::InFolder, &ITEM_KINDS)
                        .await?;
                recovery::recover_vanished(
                    &self.store,
                    &known,
                    |id| self.external.can_open(&parent.sibling(id.clone())),
                    || {
                        Ok(self
                            .external
                            .message_table(&parent)?
                            .into_iter()
                            .map(|row| row.entry_id)
                            .collect())
                    },
                    &ITEM_KINDS,
                )
                .await?
            }
            None => None,
        };

        match found {
            Some(Vanished {
                entry_id, resource, ..
            }) => {
                self.queue_delete_item(resource, &entry_id);
                Ok(())
            }
            None if may_retry => {
                self.schedule_retry(n);
                Ok(())
            }
            None => Err(Error::IdentityUnresolved {
                parent: parent.entry_id,
            }),
        }
    }

    fn queue_delete_item(self: &Arc<Self>, id: ResourceId, entry_id: &EntryId) {
        let ctx = Arc::clone(self);
        self.writer.queue_job(
            self.settings.notification_priority,
            Job::new(format!("delete item {entry_id}"), async move {
                ctx.applier().delete_item(id).await
            }),
        );
    }

    /// Resolves and deletes the target of a folder delete with its
    /// subtree.
    async fn folder_deleted(self: Arc<Self>, n: Notification, may_retry: bool) -> Result<()> {
        let folder_kinds = [ResourceType::Folder];
        let direct = resource::find_by_entry_id(&self.store, ResourceType::Folder, &n.entry_id).await?;
        let target = match direct {
            Some(id) => Some(id),
            None => {
                let parent = EntryIdPair::new(n.parent_id.clone(), n.store_id.clone());
                match resource::find_by_entry_id(&self.store, ResourceType::Folder, &parent.entry_id)
                    .await?
                {
                    Some(parent_folder) => {
                        let known = recovery::known_children(
                            &self.store,
                            parent_folder,
                            LinkType::Parent,
                            &folder_kinds,
                        )
                        .await?;
                        recovery::recover_vanished(
                            &self.store,
                            &known,
                            |id| self.external.open_folder(&parent.sibling(id.clone())).is_ok(),
                            || self.external.child_folders(&parent),
                            &folder_kinds,
                        )
                        .await?
                        .map(|v| v.resource)
                    }
                    None => None,
                }
            }
        };

        match target {
            Some(id) => {
                let ctx = Arc::clone(&self);
                self.writer.queue_job(
                    self.settings.notification_priority,
                    Job::new(format!("delete folder {}", n.entry_id), async move {
                        ctx.applier().delete_folder_tree(id).await.map(|_| ())
                    }),
                );
                Ok(())
            }
            None if may_retry => {
                self.schedule_retry(n);
                Ok(())
            }
            None => Err(Error::IdentityUnresolved {
                parent: n.parent_id,
            }),
        }
    }

    /// Schedules the single deferred retry of an unresolved delete.
    fn schedule_retry(self: &Arc<Self>, n: Notification) {
        let delay = Duration::from_secs(self.settings.deletion_retry_delay_secs);
        info!("{} unresolved, retrying in {delay:?}", n.label());
        let ctx = Arc::clone(self);
        let name = format!("retry {}", n.label());
        let job = Job::new(name, async move {
            match n.kind {
                ObjectKind::Folder => ctx.folder_deleted(n, false).await,
                ObjectKind::Item => ctx.item_deleted(n, false).await,
            }
        });
        let handle = self
            .access
            .queue_job_at(tokio::time::Instant::now() + delay, job);
        match self.retries.lock() {
            Ok(mut retries) => {
                retries.retain(|job| !job.is_finished());
                retries.push(handle);
            }
            Err(_) => warn!("retry list poisoned; retry cannot be cancelled"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::external::{ExternalValue, MemoryExternalStore, MessageNode, StoreInfo, StoreKind};
    use crate::ids::StoreId;
    use crate::resource::MemoryResourceStore;

    type TestSync = Synchronizer<MemoryExternalStore, MemoryResourceStore>;

    fn setup() -> (TestSync, StoreId, EntryId) {
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
        let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
        (sync, store, inbox)
    }

    fn note(id: &str) -> MessageNode {
        MessageNode::new(EntryId::new(id), "IPM.Note")
            .with(PropTag::Subject, ExternalValue::Str(format!("mail {id}")))
    }

    #[tokio::test]
    async fn test_created_mail_is_applied() {
        let (sync, store, inbox) = setup();
        let n = sync.external().add_message(&store, &inbox, note("M1")).unwrap();
        sync.handle_notification(n).unwrap();
        assert_eq!(sync.drain().await, 2);

        let mails = sync.store().list(ResourceType::Email).await.unwrap();
        assert_eq!(mails.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_resolved_directly() {
        let (sync, store, inbox) = setup();
        let n = sync.external().add_message(&store, &inbox, note("M1")).unwrap();
        let entry = n.entry_id.clone();
        sync.handle_notification(n).unwrap();
        sync.drain().await;

        let n = sync.external().delete_message(&store, &entry).unwrap();
        sync.handle_notification(n).unwrap();
        sync.drain().await;
        assert!(sync.store().list(ResourceType::Email).await.unwrap().is_empty());
        assert_eq!(sync.pending_retries(), 0);
    }

    #[tokio::test]
    async fn test_workers_apply_in_background() {
        let (sync, store, inbox) = setup();
        let workers = sync.spawn_workers();
        let n = sync.external().add_message(&store, &inbox, note("M1")).unwrap();
        sync.handle_notification(n).unwrap();

        let mut applied = false;
        for _ in 0..100 {
            if !sync.store().list(ResourceType::Email).await.unwrap().is_empty() {
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(applied);

        sync.shutdown();
        for worker in workers {
            tokio::time::timeout(Duration::from_secs(1), worker)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_notifications_refused_after_shutdown() {
        let (sync, store, inbox) = setup();
        let n = sync.external().add_message(&store, &inbox, note("M1")).unwrap();
        sync.shutdown();
        assert!(matches!(sync.handle_notification(n), Err(Error::Shutdown)));
    }
}
