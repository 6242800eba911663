use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{Applier, set_date};
use crate::Result;
use crate::descriptor::{AttachmentDescriptor, MailDescriptor, RecipientKind};
use crate::ids::ResourceId;
use crate::resource::{
    Direction, LinkType, Resource, ResourceStore, ResourceType, ResourceUpdate, props,
};
use crate::threading::{self, ThreadKeys};

impl<R: ResourceStore> Applier<'_, R> {
    /// Returns true if items of a folder resource are not synchronized.
    #[must_use]
    pub fn folder_ignored(&self, folder: &Resource) -> bool {
        folder.flag(props::IGNORED_FOLDER)
            || folder
                .str_prop(props::NAME)
                .is_some_and(|name| self.settings.is_ignored_folder(name))
    }

    /// Merges a mail snapshot.
    ///
    /// Returns the Email resource, or `None` when the mail lives in an
    /// ignored folder (any local copy is deleted) or is overlay-deleted
    /// without a local copy.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails or the entry id is
    /// owned by another Email resource.
    pub async fn apply_mail(&self, d: &MailDescriptor) -> Result<Option<ResourceId>> {
        let folder = self.folder_resource(&d.folder.entry_id).await?;
        let target = d
            .mode
            .resolve_target(self.store, d.entry_id(), d.record_key.as_ref())
            .await?;

        if folder.as_ref().is_some_and(|f| self.folder_ignored(f)) {
            for id in target.existing.iter().chain(&target.duplicates) {
                self.delete_item(*id).await?;
            }
            debug!("mail {} is in an ignored folder", d.entry_id());
            return Ok(None);
        }

        if d.overlay_deleted {
            let Some(id) = target.existing else {
                return Ok(None);
            };
            let mut update = ResourceUpdate::edit(id);
            update.set(props::IS_DELETED, true);
            self.store.commit(update).await?;
            debug!("mail {id} hidden by overlay");
            return Ok(Some(id));
        }

        let existing = target.existing;
        let mut update = match existing {
            Some(id) => ResourceUpdate::edit(id),
            None => ResourceUpdate::create(ResourceType::Email),
        };
        update.delete(props::IS_DELETED);
        self.stamp_entry_id(&mut update, ResourceType::Email, d.entry_id())
            .await?;

        update
            .set_text(props::SUBJECT, &d.subject)
            .set_text(props::BODY, &d.body)
            .set_text(props::MESSAGE_CLASS, &d.message_class)
            .set(props::UNREAD, d.unread)
            .set(props::PRIORITY, d.priority)
            .set(props::IMPORTANCE, d.importance)
            .set(props::HAS_ATTACHMENTS, d.has_attachments)
            .set(props::STORE_ID, d.message.store_id.as_str());
        set_date(&mut update, props::RECEIVED, d.received);
        set_date(&mut update, props::SENT, d.sent);
        set_date(&mut update, props::MODIFIED, d.modified);
        set_opt(&mut update, props::MESSAGE_ID, d.message_id.as_deref());
        set_opt(&mut update, props::REPLY_TO, d.reply_to.as_deref());
        set_opt(
            &mut update,
            props::CONVERSATION_INDEX,
            d.conversation_index.as_ref().map(|c| c.as_str()),
        );
        let parent_index = d.conversation_index.as_ref().and_then(|c| c.parent());
        set_opt(
            &mut update,
            props::REPLY_TO_CONVERSATION_INDEX,
            parent_index.as_ref().map(|c| c.as_str()),
        );
        set_opt(
            &mut update,
            props::RECORD_KEY,
            d.record_key.as_ref().map(|k| k.as_str()),
        );

        if let Some(folder) = &folder {
            self.relink(&mut update, existing, LinkType::InFolder, Some(folder.id))
                .await?;
        }

        self.apply_correspondents(&mut update, existing, d).await?;

        if let Some(attachments) = &d.attachments {
            self.apply_attachments(&mut update, existing, attachments)
                .await?;
        }

        let keys = ThreadKeys {
            message_id: d.message_id.as_deref(),
            reply_to: d.reply_to.as_deref(),
            conversation_index: d.conversation_index.as_ref(),
        };
        // Reply links are recomputed on every apply
        let parent = threading::reply_parent(self.store, existing, &keys).await?;
        self.relink(&mut update, existing, LinkType::Reply, parent)
            .await?;

        if self.settings.sync_categories {
            self.apply_categories(&mut update, existing, &d.categories)
                .await?;
        }
        self.apply_flag(&mut update, existing, d.flag).await?;

        let id = self.store.commit(update).await?;
        let adopted = threading::link_children(self.store, id, &keys).await?;
        if adopted > 0 {
            debug!("mail {id} adopted {adopted} earlier repl(ies)");
        }
        target.mode.on_merge_complete(self, &target, id).await?;
        Ok(Some(id))
    }

    async fn apply_correspondents(
        &self,
        update: &mut ResourceUpdate,
        existing: Option<ResourceId>,
        d: &MailDescriptor,
    ) -> Result<()> {
        let sender = match &d.sender {
            Some(sender) => {
                let contact = self
                    .find_or_create_contact(&sender.email, &sender.name)
                    .await?;
                self.mark_mailing_list(contact, &sender.email).await?;
                Some(contact)
            }
            None => None,
        };
        self.relink(update, existing, LinkType::From, sender).await?;

        for (kind, link) in [(RecipientKind::To, LinkType::To), (RecipientKind::Cc, LinkType::Cc)] {
            let mut desired = BTreeSet::new();
            for recipient in d.recipients_of(kind) {
                desired.insert(
                    self.find_or_create_contact(&recipient.email, &recipient.name)
                        .await?,
                );
            }
            self.replace_links(update, existing, link, &desired).await?;
        }
        Ok(())
    }

    async fn apply_attachments(
        &self,
        update: &mut ResourceUpdate,
        existing: Option<ResourceId>,
        attachments: &[AttachmentDescriptor],
    ) -> Result<()> {
        let mut current: BTreeMap<i64, ResourceId> = BTreeMap::new();
        if let Some(mail) = existing {
            for id in self
                .store
                .links(mail, LinkType::Attachment, Direction::Outgoing)
                .await?
            {
                let index = self
                    .store
                    .load(id)
                    .await?
                    .and_then(|a| a.prop(props::ATTACHMENT_INDEX).and_then(|v| v.as_int()));
                match index {
                    Some(index) if !current.contains_key(&index) => {
                        current.insert(index, id);
                    }
                    _ => {
                        self.store.delete(id).await?;
                    }
                }
            }
        }

        for attachment in attachments {
            let mut row = match current.remove(&attachment.index) {
                Some(id) => ResourceUpdate::edit(id),
                None => ResourceUpdate::create(ResourceType::Attachment),
            };
            row.set(props::ATTACHMENT_INDEX, attachment.index)
                .set_text(props::NAME, &attachment.name)
                .set(props::SIZE, attachment.size)
                .set_text(props::CONTENT_TYPE, &attachment.content_type);
            let id = self.store.commit(row).await?;
            update.add_link(LinkType::Attachment, id);
        }

        for stale in current.into_values() {
            self.store.delete(stale).await?;
        }
        if !attachments.is_empty() {
            debug!("{} attachment(s) recorded", attachments.len());
        }
        Ok(())
    }
}

fn set_opt(update: &mut ResourceUpdate, name: &str, value: Option<&str>) {
    match value {
        Some(value) => update.set(name, value),
        None => update.delete(name),
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::apply::MailSyncMode;
    use crate::config::SyncSettings;
    use crate::descriptor::{FlagState, RecipientDescriptor};
    use crate::ids::{EntryId, EntryIdPair, RecordKey, StoreId};
    use crate::resource::{self, MemoryResourceStore};
    use crate::threading::ConversationIndex;

    fn mail(entry: &str) -> MailDescriptor {
        let store = StoreId::new("S");
        MailDescriptor {
            message: EntryIdPair::new(EntryId::new(entry), store.clone()),
            folder: EntryIdPair::new(EntryId::new("INBOX"), store),
            record_key: Some(RecordKey::new(format!("RK-{entry}"))),
            mode: MailSyncMode::Normal,
            message_class: "IPM.Note".into(),
            subject: format!("subject {entry}"),
            body: String::new(),
            received: DateTime::<Utc>::MIN_UTC,
            sent: DateTime::<Utc>::MIN_UTC,
            modified: DateTime::<Utc>::MIN_UTC,
            unread: true,
            priority: 0,
            importance: 0,
            flag: FlagState::default(),
            message_id: Some(format!("<{entry}@x>")),
            reply_to: None,
            conversation_index: None,
            categories: Vec::new(),
            overlay_deleted: false,
            has_attachments: false,
            sender: Some(RecipientDescriptor {
                kind: RecipientKind::From,
                name: "Ann".into(),
                email: "ann@example.com".into(),
            }),
            recipients: vec![RecipientDescriptor {
                kind: RecipientKind::To,
                name: String::new(),
                email: "bob@example.com".into(),
            }],
            attachments: Some(Vec::new()),
        }
    }

    async fn inbox(store: &MemoryResourceStore, name: &str) -> ResourceId {
        let mut update = ResourceUpdate::create(ResourceType::Folder);
        update.set(props::ENTRY_ID, "INBOX").set(props::NAME, name);
        store.commit(update).await.unwrap()
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let folder = inbox(&store, "Inbox").await;
        let mut d = mail("M1");
        d.categories = vec!["Work".into()];

        let first = applier.apply_mail(&d).await.unwrap().unwrap();
        let snapshot = store.load(first).await.unwrap();
        let second = applier.apply_mail(&d).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(store.load(first).await.unwrap(), snapshot);
        assert_eq!(store.list(ResourceType::Email).await.unwrap(), vec![first]);
        assert_eq!(store.list(ResourceType::Contact).await.unwrap().len(), 2);
        assert_eq!(
            store
                .links(first, LinkType::InFolder, Direction::Outgoing)
                .await
                .unwrap(),
            vec![folder]
        );
        assert!(resource::has_link(&store, first, LinkType::Category).await.unwrap());
    }

    #[tokio::test]
    async fn test_recipients_replaced_and_bcc_ignored() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mut d = mail("M1");
        let id = applier.apply_mail(&d).await.unwrap().unwrap();

        d.recipients = vec![
            RecipientDescriptor {
                kind: RecipientKind::Cc,
                name: String::new(),
                email: "carol@example.com".into(),
            },
            RecipientDescriptor {
                kind: RecipientKind::Bcc,
                name: String::new(),
                email: "secret@example.com".into(),
            },
        ];
        applier.apply_mail(&d).await.unwrap();

        assert!(!resource::has_link(&store, id, LinkType::To).await.unwrap());
        assert!(resource::has_link(&store, id, LinkType::Cc).await.unwrap());
        let secret = resource::find_unique(
            &store,
            ResourceType::EmailAccount,
            props::EMAIL_ADDRESS,
            &"secret@example.com".into(),
        )
        .await
        .unwrap();
        assert!(secret.is_none());
    }

    #[tokio::test]
    async fn test_ignored_folder_removes_local_copy() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings {
            ignored_folders: vec!["junk e-mail".into()],
            ..SyncSettings::default()
        };
        let applier = Applier::new(&store, &settings);
        let d = mail("M1");
        let id = applier.apply_mail(&d).await.unwrap().unwrap();

        inbox(&store, "Junk E-mail").await;
        assert_eq!(applier.apply_mail(&d).await.unwrap(), None);
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overlay_delete_marks_existing_only() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mut d = mail("M1");
        d.overlay_deleted = true;
        assert_eq!(applier.apply_mail(&d).await.unwrap(), None);
        assert!(store.list(ResourceType::Email).await.unwrap().is_empty());

        d.overlay_deleted = false;
        let id = applier.apply_mail(&d).await.unwrap().unwrap();
        d.overlay_deleted = true;
        applier.apply_mail(&d).await.unwrap();
        assert!(store.load(id).await.unwrap().unwrap().flag(props::IS_DELETED));

        d.overlay_deleted = false;
        applier.apply_mail(&d).await.unwrap();
        assert!(!store.load(id).await.unwrap().unwrap().flag(props::IS_DELETED));
    }

    #[tokio::test]
    async fn test_reply_before_parent_is_linked_later() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mut root_index = vec![0x01; 44];
        let root = ConversationIndex::from_bytes(&root_index).unwrap();
        root_index.extend([0x02; 10]);
        let reply_index = ConversationIndex::from_bytes(&root_index).unwrap();

        let mut reply = mail("M2");
        reply.conversation_index = Some(reply_index);
        let reply_id = applier.apply_mail(&reply).await.unwrap().unwrap();
        assert!(!resource::has_link(&store, reply_id, LinkType::Reply).await.unwrap());

        let mut parent = mail("M1");
        parent.conversation_index = Some(root);
        let parent_id = applier.apply_mail(&parent).await.unwrap().unwrap();
        assert_eq!(
            store
                .links(reply_id, LinkType::Reply, Direction::Outgoing)
                .await
                .unwrap(),
            vec![parent_id]
        );
    }

    #[tokio::test]
    async fn test_reply_link_follows_headers_on_reapply() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mut first = mail("P1");
        first.message_id = Some("<p1@x>".into());
        let first = applier.apply_mail(&first).await.unwrap().unwrap();
        let mut second = mail("P2");
        second.message_id = Some("<p2@x>".into());
        let second = applier.apply_mail(&second).await.unwrap().unwrap();

        let mut child = mail("C");
        child.reply_to = Some("<p1@x>".into());
        let id = applier.apply_mail(&child).await.unwrap().unwrap();
        let replies = || store.links(id, LinkType::Reply, Direction::Outgoing);
        assert_eq!(replies().await.unwrap(), vec![first]);

        child.reply_to = Some("<p2@x>".into());
        applier.apply_mail(&child).await.unwrap();
        assert_eq!(replies().await.unwrap(), vec![second]);

        child.reply_to = None;
        applier.apply_mail(&child).await.unwrap();
        assert!(replies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attachments_follow_snapshot() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let attachment = |index: i64, name: &str| AttachmentDescriptor {
            index,
            name: name.into(),
            size: 5,
            content_type: String::new(),
        };
        let mut d = mail("M1");
        d.attachments = Some(vec![attachment(0, "a.txt"), attachment(1, "b.txt")]);
        let id = applier.apply_mail(&d).await.unwrap().unwrap();
        let before = store
            .links(id, LinkType::Attachment, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(before.len(), 2);

        // Recipients-only snapshots leave attachments alone
        d.attachments = None;
        applier.apply_mail(&d).await.unwrap();
        assert_eq!(store.list(ResourceType::Attachment).await.unwrap(), before);

        d.attachments = Some(vec![attachment(1, "b2.txt")]);
        applier.apply_mail(&d).await.unwrap();
        let after = store
            .links(id, LinkType::Attachment, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(after, vec![before[1]]);
        let kept = store.load(after[0]).await.unwrap().unwrap();
        assert_eq!(kept.str_prop(props::NAME), Some("b2.txt"));
        assert_eq!(store.list(ResourceType::Attachment).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_moved_mail_keeps_resource() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let id = applier.apply_mail(&mail("M1")).await.unwrap().unwrap();

        let mut moved = mail("M1-NEW");
        moved.record_key = Some(RecordKey::new("RK-M1"));
        moved.mode = MailSyncMode::Moved;
        moved.folder.entry_id = EntryId::new("ARCHIVE");
        assert_eq!(applier.apply_mail(&moved).await.unwrap(), Some(id));

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.entry_id(), Some(EntryId::new("M1-NEW")));
        assert_eq!(store.list(ResourceType::Email).await.unwrap().len(), 1);
    }
}
