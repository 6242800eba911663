//! Find-or-create helpers for contacts, accounts, categories and flags.

use std::collections::BTreeSet;

use tracing::debug;

use super::Applier;
use crate::Result;
use crate::descriptor::{FlagState, normalize_address};
use crate::ids::ResourceId;
use crate::resource::{
    self, Direction, LinkType, PropValue, ResourceStore, ResourceType, ResourceUpdate, props,
};

/// Separator of hierarchical category names.
const CATEGORY_SEPARATOR: char = '\\';

fn account_address(email: &str) -> String {
    normalize_address(email).unwrap_or_else(|| email.trim().to_lowercase())
}

fn category_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(CATEGORY_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl<R: ResourceStore> Applier<'_, R> {
    /// Finds the `EmailAccount` of an address without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn find_account(&self, email: &str) -> Result<Option<ResourceId>> {
        let email = account_address(email);
        resource::find_unique(
            self.store,
            ResourceType::EmailAccount,
            props::EMAIL_ADDRESS,
            &PropValue::from(email.as_str()),
        )
        .await
    }

    /// Finds or creates the `EmailAccount` of an address.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn ensure_account(&self, email: &str) -> Result<ResourceId> {
        if let Some(id) = self.find_account(email).await? {
            return Ok(id);
        }
        let mut update = ResourceUpdate::create(ResourceType::EmailAccount);
        update.set(props::EMAIL_ADDRESS, account_address(email));
        self.store.commit(update).await
    }

    /// Contacts owning an account.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn account_owners(&self, account: ResourceId) -> Result<Vec<ResourceId>> {
        self.store
            .links(account, LinkType::EmailAccount, Direction::Incoming)
            .await
    }

    /// Finds the contact owning an address, creating contact and account
    /// when unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn find_or_create_contact(&self, email: &str, name: &str) -> Result<ResourceId> {
        let account = self.ensure_account(email).await?;
        if let Some(contact) = self.account_owners(account).await?.first() {
            return Ok(*contact);
        }
        let mut update = ResourceUpdate::create(ResourceType::Contact);
        let display = if name.trim().is_empty() { email } else { name };
        update
            .set(props::DISPLAY_NAME, display.trim())
            .set(props::EMAIL_ADDRESS, email.trim().to_lowercase())
            .add_link(LinkType::EmailAccount, account);
        let contact = self.store.commit(update).await?;
        debug!("created contact {contact} for {email}");
        Ok(contact)
    }

    async fn find_category(
        &self,
        name: &str,
        parent: Option<ResourceId>,
    ) -> Result<Option<ResourceId>> {
        for candidate in self
            .store
            .find_by_prop(ResourceType::Category, props::NAME, &name.into())
            .await?
        {
            let parents = self
                .store
                .links(candidate, LinkType::Parent, Direction::Outgoing)
                .await?;
            if parents.first().copied() == parent {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Finds the category at a backslash-separated path without creating
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn find_category_path(&self, path: &str) -> Result<Option<ResourceId>> {
        let mut parent: Option<ResourceId> = None;
        for segment in category_segments(path) {
            match self.find_category(segment, parent).await? {
                Some(id) => parent = Some(id),
                None => return Ok(None),
            }
        }
        Ok(parent)
    }

    /// Finds or creates the category at a backslash-separated path and
    /// its ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn ensure_category_path(&self, path: &str) -> Result<Option<ResourceId>> {
        let mut parent: Option<ResourceId> = None;
        for segment in category_segments(path) {
            let id = match self.find_category(segment, parent).await? {
                Some(id) => id,
                None => {
                    let mut update = ResourceUpdate::create(ResourceType::Category);
                    update.set(props::NAME, segment);
                    if let Some(parent) = parent {
                        update.add_link(LinkType::Parent, parent);
                    }
                    self.store.commit(update).await?
                }
            };
            parent = Some(id);
        }
        Ok(parent)
    }

    async fn category_set(&self, paths: &[String]) -> Result<BTreeSet<ResourceId>> {
        let mut desired = BTreeSet::new();
        for path in paths {
            if let Some(category) = self.ensure_category_path(path).await? {
                desired.insert(category);
            }
        }
        Ok(desired)
    }

    /// Records category links of `target` matching `paths` exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn apply_categories(
        &self,
        update: &mut ResourceUpdate,
        target: Option<ResourceId>,
        paths: &[String],
    ) -> Result<()> {
        let desired = self.category_set(paths).await?;
        self.replace_links(update, target, LinkType::Category, &desired)
            .await
    }

    /// Records category links of a contact matching `paths`. The
    /// mailing-list category given from mail is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn apply_contact_categories(
        &self,
        update: &mut ResourceUpdate,
        target: Option<ResourceId>,
        paths: &[String],
    ) -> Result<()> {
        let mut desired = self.category_set(paths).await?;
        let list_category = &self.settings.mailing_list.category;
        if let Some(contact) = target.filter(|_| !list_category.is_empty()) {
            if let Some(list) = self.find_category_path(list_category).await? {
                let current = self
                    .store
                    .links(contact, LinkType::Category, Direction::Outgoing)
                    .await?;
                if current.contains(&list) {
                    desired.insert(list);
                }
            }
        }
        self.replace_links(update, target, LinkType::Category, &desired)
            .await
    }

    /// Adds a category to an existing contact.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn add_contact_category(&self, contact: ResourceId, path: &str) -> Result<()> {
        if let Some(category) = self.ensure_category_path(path).await? {
            let mut update = ResourceUpdate::edit(contact);
            update.add_link(LinkType::Category, category);
            self.store.commit(update).await?;
        }
        Ok(())
    }

    /// Gives a sender contact the mailing-list category when its address
    /// matches the configured heuristic.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn mark_mailing_list(&self, contact: ResourceId, email: &str) -> Result<bool> {
        let heuristic = &self.settings.mailing_list;
        if heuristic.category.is_empty() || !heuristic.matches(email) {
            return Ok(false);
        }
        self.add_contact_category(contact, &heuristic.category)
            .await?;
        debug!("{email} looks like a mailing list");
        Ok(true)
    }

    /// Records the flag link of a mail; unflagged mail loses its link.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or commit fails.
    pub async fn apply_flag(
        &self,
        update: &mut ResourceUpdate,
        target: Option<ResourceId>,
        flag: FlagState,
    ) -> Result<()> {
        let flag_id = match flag.flag_name() {
            Some(name) => Some(self.ensure_flag(name).await?),
            None => None,
        };
        self.relink(update, target, LinkType::Flag, flag_id).await
    }

    async fn ensure_flag(&self, name: &str) -> Result<ResourceId> {
        if let Some(id) =
            resource::find_unique(self.store, ResourceType::Flag, props::NAME, &name.into())
                .await?
        {
            return Ok(id);
        }
        let mut update = ResourceUpdate::create(ResourceType::Flag);
        update.set(props::NAME, name);
        self.store.commit(update).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::descriptor::FlagStatus;
    use crate::resource::MemoryResourceStore;

    #[tokio::test]
    async fn test_contact_find_or_create_reuses_by_address() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);

        let first = applier
            .find_or_create_contact("Ann@Example.com", "Ann")
            .await
            .unwrap();
        let second = applier
            .find_or_create_contact("ann@example.com", "")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list(ResourceType::Contact).await.unwrap().len(), 1);
        assert_eq!(
            store.list(ResourceType::EmailAccount).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_category_hierarchy() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);

        let leaf = applier
            .ensure_category_path("Work\\Projects")
            .await
            .unwrap()
            .unwrap();
        let again = applier
            .ensure_category_path("Work\\Projects")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leaf, again);

        // Same name under a different parent is a different category
        let other = applier
            .ensure_category_path("Projects")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(other, leaf);

        let parents = store
            .links(leaf, LinkType::Parent, Direction::Outgoing)
            .await
            .unwrap();
        let work = store.load(parents[0]).await.unwrap().unwrap();
        assert_eq!(work.str_prop(props::NAME), Some("Work"));
        assert_eq!(applier.ensure_category_path(" \\ ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mailing_list_category() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let list = applier
            .find_or_create_contact("dev-request@lists.example", "dev")
            .await
            .unwrap();
        let person = applier
            .find_or_create_contact("ann@example.com", "Ann")
            .await
            .unwrap();

        assert!(applier
            .mark_mailing_list(list, "dev-request@lists.example")
            .await
            .unwrap());
        assert!(!applier
            .mark_mailing_list(person, "ann@example.com")
            .await
            .unwrap());
        assert_eq!(
            store
                .links(list, LinkType::Category, Direction::Outgoing)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_flag_link_replaced_and_removed() {
        let store = MemoryResourceStore::new();
        let settings = SyncSettings::default();
        let applier = Applier::new(&store, &settings);
        let mail = store
            .commit(ResourceUpdate::create(ResourceType::Email))
            .await
            .unwrap();

        for flag in [
            FlagState {
                status: FlagStatus::Flagged,
                icon: 6,
            },
            FlagState {
                status: FlagStatus::Complete,
                icon: 0,
            },
        ] {
            let mut update = ResourceUpdate::edit(mail);
            applier
                .apply_flag(&mut update, Some(mail), flag)
                .await
                .unwrap();
            store.commit(update).await.unwrap();
        }
        let flags = store
            .links(mail, LinkType::Flag, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(flags.len(), 1);
        let flag = store.load(flags[0]).await.unwrap().unwrap();
        assert_eq!(flag.str_prop(props::NAME), Some("Completed Flag"));

        let mut update = ResourceUpdate::edit(mail);
        applier
            .apply_flag(&mut update, Some(mail), FlagState::default())
            .await
            .unwrap();
        store.commit(update).await.unwrap();
        assert!(!resource::has_link(&store, mail, LinkType::Flag).await.unwrap());
    }
}
