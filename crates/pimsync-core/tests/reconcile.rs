//! End-to-end reconciliation tests.
//!
//! These drive the synchronizer against the in-memory external store
//! and check the resulting resource graph.

use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;

use pimsync_core::external::{ExternalValue, MessageNode, PropTag, StoreInfo, StoreKind};
use pimsync_core::resource::{Direction, LinkType, props};
use pimsync_core::{
    EntryId, ExternalStore, MemoryExternalStore, MemoryResourceStore, Notification,
    NotificationEvent, ObjectKind, ResourceStore, ResourceType, ResourceUpdate, StoreId,
    SyncSettings, Synchronizer,
};

type TestSync = Synchronizer<MemoryExternalStore, MemoryResourceStore>;

/// One personal store with an Inbox.
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

fn mail(entry: &str, subject: &str) -> MessageNode {
    MessageNode::new(EntryId::new(entry), "IPM.Note")
        .with(PropTag::Subject, ExternalValue::Str(subject.to_string()))
        .with(
            PropTag::SenderEmailAddress,
            ExternalValue::Str("alice@example.com".into()),
        )
}

async fn entry_ids(sync: &TestSync, resource_type: ResourceType) -> Vec<String> {
    let mut ids = Vec::new();
    for id in sync.store().list(resource_type).await.unwrap() {
        let resource = sync.store().load(id).await.unwrap().unwrap();
        if let Some(entry) = resource.str_prop(props::ENTRY_ID) {
            ids.push(entry.to_string());
        }
    }
    ids
}

#[tokio::test]
async fn test_repeated_notification_is_idempotent() {
    let (ext, store, inbox) = session();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
    sync.enumerate_all().unwrap();
    sync.drain().await;

    let n = sync
        .external()
        .add_message(&store, &inbox, mail("M1", "Quarterly report"))
        .unwrap();
    for _ in 0..3 {
        sync.handle_notification(n.clone()).unwrap();
        sync.drain().await;
    }

    assert_eq!(entry_ids(&sync, ResourceType::Email).await, ["M1"]);
    let contacts = sync.store().list(ResourceType::Contact).await.unwrap();
    assert_eq!(contacts.len(), 1);
    let accounts = sync.store().list(ResourceType::EmailAccount).await.unwrap();
    assert_eq!(accounts.len(), 1);
}

#[tokio::test]
async fn test_folder_and_mail_round_trip() {
    let (ext, store, inbox) = session();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
    sync.enumerate_all().unwrap();
    sync.drain().await;

    let n = sync
        .external()
        .add_folder(&store, &inbox, "Projects", "IPF.Note")
        .unwrap();
    let projects = n.entry_id.clone();
    sync.handle_notification(n).unwrap();
    sync.drain().await;
    let n = sync
        .external()
        .add_message(&store, &projects, mail("M7", "Kickoff"))
        .unwrap();
    sync.handle_notification(n).unwrap();
    sync.drain().await;

    let folder = pimsync_core::resource::find_by_entry_id(
        sync.store(),
        ResourceType::Folder,
        &projects,
    )
    .await
    .unwrap()
    .unwrap();
    let items = sync
        .store()
        .links(folder, LinkType::InFolder, Direction::Incoming)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let resource = sync.store().load(items[0]).await.unwrap().unwrap();
    assert_eq!(resource.str_prop(props::SUBJECT), Some("Kickoff"));

    // Deleting the folder removes the folder and its mail
    let n = sync.external().delete_folder(&store, &projects).unwrap();
    sync.handle_notification(n).unwrap();
    sync.drain().await;
    assert!(sync.store().load(folder).await.unwrap().is_none());
    assert!(sync.store().load(items[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_with_rolled_over_entry_id_is_recovered() {
    let (ext, store, inbox) = session();
    for id in ["A", "B", "C"] {
        ext.add_message(&store, &inbox, mail(id, id)).unwrap();
    }
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
    sync.enumerate_all().unwrap();
    sync.drain().await;
    assert_eq!(entry_ids(&sync, ResourceType::Email).await.len(), 3);

    sync.external()
        .delete_message(&store, &EntryId::new("B"))
        .unwrap();
    // The notification only carries an id nothing was stamped with
    let n = Notification::new(
        store.clone(),
        ObjectKind::Item,
        NotificationEvent::Deleted,
        EntryId::new("B-rolled-over"),
        inbox.clone(),
    );
    sync.handle_notification(n).unwrap();
    sync.drain().await;

    let mut remaining = entry_ids(&sync, ResourceType::Email).await;
    remaining.sort();
    assert_eq!(remaining, ["A", "C"]);
    assert_eq!(sync.pending_retries(), 0);
}

#[tokio::test]
async fn test_moved_mail_keeps_its_resource() {
    let (ext, store, inbox) = session();
    let root = ext.root_folder(&store).unwrap().entry_id;
    let archive = ext
        .add_folder(&store, &root, "Archive", "IPF.Note")
        .unwrap()
        .entry_id;
    ext.add_message(&store, &inbox, mail("M1", "Invoice")).unwrap();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
    sync.enumerate_all().unwrap();
    sync.drain().await;
    let before = sync.store().list(ResourceType::Email).await.unwrap();

    let n = sync
        .external()
        .move_message(&store, &EntryId::new("M1"), &archive)
        .unwrap();
    let moved_to = n.entry_id.clone();
    sync.handle_notification(n).unwrap();
    sync.drain().await;

    assert_eq!(sync.store().list(ResourceType::Email).await.unwrap(), before);
    assert_eq!(
        entry_ids(&sync, ResourceType::Email).await,
        [moved_to.as_str()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_delete_is_retried_once() {
    let (ext, store, _) = session();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());

    // Neither the item nor its folder was ever synchronized
    let n = Notification::new(
        store,
        ObjectKind::Item,
        NotificationEvent::Deleted,
        EntryId::new("GONE"),
        EntryId::new("UNKNOWN-FOLDER"),
    );
    sync.handle_notification(n).unwrap();
    assert_eq!(sync.drain().await, 1);
    assert_eq!(sync.pending_retries(), 1);
    assert!(sync.access().is_empty());

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(sync.pending_retries(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    tokio::task::yield_now().await;
    assert_eq!(sync.pending_retries(), 0);
    assert_eq!(sync.drain().await, 1);

    // The retry failed for good and schedules nothing further
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(sync.pending_retries(), 0);
    assert!(sync.access().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let (ext, store, _) = session();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
    let n = Notification::new(
        store,
        ObjectKind::Folder,
        NotificationEvent::Deleted,
        EntryId::new("GONE"),
        EntryId::new("UNKNOWN-FOLDER"),
    );
    sync.handle_notification(n).unwrap();
    sync.drain().await;
    assert_eq!(sync.pending_retries(), 1);

    sync.shutdown();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(sync.access().is_empty());
    assert_eq!(sync.pending_retries(), 0);
}

#[tokio::test]
async fn test_concurrent_export_requests_create_one_item() {
    let (ext, store, _) = session();
    let root = ext.root_folder(&store).unwrap().entry_id;
    let tasks = ext
        .add_folder(&store, &root, "Tasks", "IPF.Task")
        .unwrap()
        .entry_id;
    ext.set_default_folder(&store, pimsync_core::external::DefaultFolder::Tasks, &tasks)
        .unwrap();
    let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());

    let mut update = ResourceUpdate::create(ResourceType::Task);
    update.set(props::SUBJECT, "File taxes");
    let task = sync.store().commit(update).await.unwrap();

    let accepted = (0..5)
        .filter(|_| sync.request_task_export(task))
        .count();
    assert_eq!(accepted, 1);
    sync.drain().await;

    let snapshot = sync.external().snapshot().unwrap();
    let exported = snapshot.stores[0]
        .messages
        .values()
        .filter(|m| m.folder == tasks)
        .count();
    assert_eq!(exported, 1);
    assert!(!sync.exports().is_held(task));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_entry_ids_stay_unique(ops in prop::collection::vec((0u8..4, 0u8..3), 1..24)) {
        tokio_test::block_on(async {
            let (ext, store, inbox) = session();
            let sync = Synchronizer::new(ext, MemoryResourceStore::new(), SyncSettings::default());
            sync.enumerate_all().unwrap();
            sync.drain().await;

            let mut created = BTreeSet::new();
            for (item, action) in ops {
                let entry = EntryId::new(format!("P{item}"));
                let n = if created.insert(item) {
                    sync.external()
                        .add_message(&store, &inbox, mail(entry.as_str(), "hello"))
                        .unwrap()
                } else {
                    sync.external()
                        .modify_message(
                            &store,
                            &entry,
                            [(PropTag::Subject, ExternalValue::Str(format!("edit {action}")))],
                        )
                        .unwrap()
                };
                // Duplicate deliveries, optionally interleaved with draining
                for _ in 0..=action {
                    sync.handle_notification(n.clone()).unwrap();
                    if action == 1 {
                        sync.drain().await;
                    }
                }
                sync.drain().await;
            }

            let ids = entry_ids(&sync, ResourceType::Email).await;
            let distinct: BTreeSet<&String> = ids.iter().collect();
            assert_eq!(distinct.len(), ids.len());
            assert_eq!(ids.len(), created.len());
        });
    }
}
