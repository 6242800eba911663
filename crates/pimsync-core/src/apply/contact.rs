use tracing::debug;

use super::{Applier, set_date};
use crate::Result;
use crate::address_book::find_address_book;
use crate::descriptor::ContactDescriptor;
use crate::ids::ResourceId;
use crate::resource::{self, LinkType, ResourceStore, ResourceType, ResourceUpdate, props};

impl<R: ResourceStore> Applier<'_, R> {
    /// Finds the contact a descriptor merges into: by entry id, else a
    /// contact created from mail that owns one of its addresses.
    async fn resolve_contact(&self, d: &ContactDescriptor) -> Result<Option<ResourceId>> {
        if let Some(id) =
            resource::find_by_entry_id(self.store, ResourceType::Contact, d.entry_id()).await?
        {
            return Ok(Some(id));
        }
        for email in &d.emails {
            let Some(account) = self.find_account(email).await? else {
                continue;
            };
            for owner in self.account_owners(account).await? {
                let unstamped = self
                    .store
                    .load(owner)
                    .await?
                    .is_some_and(|c| c.entry_id().is_none());
                if unstamped {
                    debug!("contact {} merges into {owner} via {email}", d.entry_id());
                    return Ok(Some(owner));
                }
            }
        }
        Ok(None)
    }

    /// Merges a contact snapshot. Contacts of ignored folders are
    /// deleted and yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn apply_contact(&self, d: &ContactDescriptor) -> Result<Option<ResourceId>> {
        let folder = self.folder_resource(&d.folder.entry_id).await?;
        let existing = self.resolve_contact(d).await?;

        if folder.as_ref().is_some_and(|f| self.folder_ignored(f)) {
            if let Some(id) = existing {
                self.delete_item(id).await?;
            }
            return Ok(None);
        }

        let mut update = match existing {
            Some(id) => ResourceUpdate::edit(id),
            None => ResourceUpdate::create(ResourceType::Contact),
        };
        self.stamp_entry_id(&mut update, ResourceType::Contact, d.entry_id())
            .await?;

        update
            .set_text(props::DISPLAY_NAME, &d.full_name())
            .set_text(props::TITLE, &d.title)
            .set_text(props::FIRST_NAME, &d.first_name)
            .set_text(props::MIDDLE_NAME, &d.middle_name)
            .set_text(props::LAST_NAME, &d.last_name)
            .set_text(props::SUFFIX, &d.suffix)
            .set_text(props::COMPANY, &d.company)
            .set_text(props::JOB_TITLE, &d.job_title)
            .set_text(props::HOME_PAGE, &d.home_page)
            .set_text(props::ADDRESS, &d.address)
            .set_text(props::BODY, &d.notes)
            .set(props::STORE_ID, d.item.store_id.as_str());
        set_date(&mut update, props::BIRTHDAY, d.birthday);
        set_date(&mut update, props::MODIFIED, d.modified);
        match &d.record_key {
            Some(key) => update.set(props::RECORD_KEY, key.as_str()),
            None => update.delete(props::RECORD_KEY),
        };
        match d.emails.first() {
            Some(primary) => update.set(props::EMAIL_ADDRESS, primary.as_str()),
            None => update.delete(props::EMAIL_ADDRESS),
        };

        if let Some(current) = match existing {
            Some(id) => self.store.load(id).await?,
            None => None,
        } {
            for name in current.props.keys() {
                if let Some(phone) = name.strip_prefix(props::PHONE_PREFIX) {
                    if !d.phones.contains_key(phone) {
                        update.delete(name);
                    }
                }
            }
        }
        for (name, number) in &d.phones {
            update.set(&format!("{}{name}", props::PHONE_PREFIX), number.as_str());
        }

        // Accounts are only ever added; mail may still refer to old ones
        for email in &d.emails {
            let account = self.ensure_account(email).await?;
            update.add_link(LinkType::EmailAccount, account);
        }

        if let Some(folder) = &folder {
            self.relink(&mut update, existing, LinkType::InFolder, Some(folder.id))
                .await?;
        }
        let book = find_address_book(self.store, &d.folder.entry_id).await?;
        if let Some(book) = book {
            update.add_link(LinkType::InAddressBook, book);
        }

        if self.settings.sync_categories {
            self.apply_contact_categories(&mut update, existing, &d.categories)
                .await?;
        }

        let id = self.store.commit(update).await?;
        debug!("applied contact {id}");
        Ok(Some(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::address_book::ensure_address_book;
    use crate::config::SyncSettings;
    use crate::ids::{EntryId, EntryIdPair, StoreId};
    use crate::resource::{Direction, MemoryResourceStore};

    fn contact(entry: &str, emails: &[&str]) -> ContactDescriptor {
        let store = StoreId::new("S");
        ContactDescriptor {
            item: EntryIdPair::new(EntryId::new(entry), store.clone()),
            folder: EntryIdPair::new(EntryId::new("CONTACTS"), store),
            record_key: None,
            display_name: String::new(),
            title: String::new(),
            first_name: "Ada".into(),
            middle_name: String::new(),
            last_name: "Lovelace".into(),
            suffix: String::new(),
            company: "Engines".into(),
            job_title: String::new(),
            emails: emails.iter().map(|e| (*e).to_string()).collect(),
            phones: BTreeMap::from([("Mobile".to_string(), "+44 1".to_string())]),
            birthday: DateTime::<Utc>::MIN_UTC,
            home_page: String::new(),
            address: String::new(),
            notes: String::new(),
            categories: vec!["Friends".into()],
            modified: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[tokio::test]
    async fn test_merges_with_contact_from_mail() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let from_mail = applier
            .find_or_create_contact("ada@x.org", "ada")
            .await
            .unwrap();

        let id = applier
            .apply_contact(&contact("C1", &["ada@x.org", "ada@y.org"]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(id, from_mail);
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.str_prop(props::DISPLAY_NAME), Some("Ada Lovelace"));
        assert_eq!(loaded.str_prop("Phone:Mobile"), Some("+44 1"));
        assert_eq!(
            store
                .links(id, LinkType::EmailAccount, Direction::Outgoing)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(store.list(ResourceType::Contact).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reapply_drops_stale_phone_and_links_address_book() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let book = ensure_address_book(&store, "Contacts", &EntryId::new("CONTACTS"))
            .await
            .unwrap();
        let mut d = contact("C1", &["ada@x.org"]);
        let id = applier.apply_contact(&d).await.unwrap().unwrap();

        d.phones = BTreeMap::from([("Home".to_string(), "+44 2".to_string())]);
        assert_eq!(applier.apply_contact(&d).await.unwrap(), Some(id));

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.str_prop("Phone:Mobile"), None);
        assert_eq!(loaded.str_prop("Phone:Home"), Some("+44 2"));
        assert_eq!(
            store
                .links(id, LinkType::InAddressBook, Direction::Outgoing)
                .await
                .unwrap(),
            vec![book]
        );
    }

    #[tokio::test]
    async fn test_ignored_folder_deletes_contact() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let d = contact("C1", &[]);
        let id = applier.apply_contact(&d).await.unwrap().unwrap();

        let mut folder = ResourceUpdate::create(ResourceType::Folder);
        folder
            .set(props::ENTRY_ID, "CONTACTS")
            .set(props::IGNORED_FOLDER, true);
        store.commit(folder).await.unwrap();

        assert_eq!(applier.apply_contact(&d).await.unwrap(), None);
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mailing_list_category_survives_contact_apply() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let list = applier
            .find_or_create_contact("dev-request@lists.example", "dev")
            .await
            .unwrap();
        assert!(applier
            .mark_mailing_list(list, "dev-request@lists.example")
            .await
            .unwrap());
        let list_category = applier
            .find_category_path("Mailing Lists")
            .await
            .unwrap()
            .unwrap();

        let d = contact("C1", &["dev-request@lists.example"]);
        for _ in 0..2 {
            let id = applier.apply_contact(&d).await.unwrap().unwrap();
            assert_eq!(id, list);
            let categories = store
                .links(id, LinkType::Category, Direction::Outgoing)
                .await
                .unwrap();
            assert_eq!(categories.len(), 2);
            assert!(categories.contains(&list_category));
        }
    }

    #[tokio::test]
    async fn test_ignored_contact_leaves_no_accounts() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mut folder = ResourceUpdate::create(ResourceType::Folder);
        folder
            .set(props::ENTRY_ID, "CONTACTS")
            .set(props::IGNORED_FOLDER, true);
        store.commit(folder).await.unwrap();

        let d = contact("C1", &["ada@x.org", "ada@y.org"]);
        assert_eq!(applier.apply_contact(&d).await.unwrap(), None);
        assert!(store.list(ResourceType::EmailAccount).await.unwrap().is_empty());
        assert!(store.list(ResourceType::Contact).await.unwrap().is_empty());
    }
}
