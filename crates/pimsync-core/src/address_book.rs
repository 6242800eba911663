//! Address book naming.
//!
//! Every contact folder gets one local address book, keyed by the
//! folder's entry id. Names must be unique among address books; clashes
//! are resolved with a numeric suffix (`Work`, `Work2`, `Work3`, ...).

use tracing::debug;

use crate::Result;
use crate::ids::{EntryId, ResourceId};
use crate::resource::{self, PropValue, ResourceStore, ResourceType, ResourceUpdate, props};

/// Finds the address book created for a contact folder.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn find_address_book<R: ResourceStore>(
    store: &R,
    source: &EntryId,
) -> Result<Option<ResourceId>> {
    resource::find_unique(
        store,
        ResourceType::AddressBook,
        props::ADDRESS_BOOK_SOURCE,
        &source.into(),
    )
    .await
}

async fn name_taken<R: ResourceStore>(store: &R, name: &str) -> Result<bool> {
    Ok(!store
        .find_by_prop(ResourceType::AddressBook, props::NAME, &PropValue::from(name))
        .await?
        .is_empty())
}

/// Returns a name for the address book of `source` that no other
/// address book uses.
///
/// An address book that already exists for `source` keeps its name when
/// that name is `proposed` itself or `proposed` followed by digits.
/// Otherwise the first free name of `proposed`, `proposed2`,
/// `proposed3`, ... is returned.
///
/// # Errors
///
/// Returns an error if a store query fails.
pub async fn assign_name<R: ResourceStore>(
    store: &R,
    proposed: &str,
    source: &EntryId,
) -> Result<String> {
    if let Some(existing) = find_address_book(store, source).await? {
        if let Some(current) = store.load(existing).await? {
            let name = current.str_prop(props::NAME).unwrap_or_default();
            if let Some(suffix) = name.strip_prefix(proposed) {
                if suffix.bytes().all(|b| b.is_ascii_digit()) {
                    return Ok(name.to_string());
                }
            }
        }
    }

    let mut candidate = proposed.to_string();
    let mut n = 2u32;
    while name_taken(store, &candidate).await? {
        candidate = format!("{proposed}{n}");
        n += 1;
    }
    debug!("address book for {source} named {candidate}");
    Ok(candidate)
}

/// Finds or creates the address book of a contact folder and keeps its
/// name in line with the folder name.
///
/// # Errors
///
/// Returns an error if a store query or commit fails.
pub async fn ensure_address_book<R: ResourceStore>(
    store: &R,
    proposed: &str,
    source: &EntryId,
) -> Result<ResourceId> {
    let name = assign_name(store, proposed, source).await?;
    let mut update = match find_address_book(store, source).await? {
        Some(id) => {
            let current = store.load(id).await?;
            if current.as_ref().and_then(|r| r.str_prop(props::NAME)) == Some(name.as_str()) {
                return Ok(id);
            }
            ResourceUpdate::edit(id)
        }
        None => {
            let mut update = ResourceUpdate::create(ResourceType::AddressBook);
            update.set(props::ADDRESS_BOOK_SOURCE, source);
            update
        }
    };
    update.set(props::NAME, name);
    store.commit(update).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::MemoryResourceStore;

    async fn address_book(store: &MemoryResourceStore, name: &str, source: &str) {
        let mut update = ResourceUpdate::create(ResourceType::AddressBook);
        update
            .set(props::NAME, name)
            .set(props::ADDRESS_BOOK_SOURCE, source);
        store.commit(update).await.unwrap();
    }

    #[tokio::test]
    async fn test_clash_appends_next_free_number() {
        let store = MemoryResourceStore::new();
        address_book(&store, "Work", "A").await;
        address_book(&store, "Work2", "B").await;

        let name = assign_name(&store, "Work", &EntryId::new("C")).await.unwrap();
        assert_eq!(name, "Work3");
    }

    #[tokio::test]
    async fn test_existing_numeric_suffix_is_kept() {
        let store = MemoryResourceStore::new();
        address_book(&store, "Work", "A").await;
        address_book(&store, "Work7", "C").await;

        let name = assign_name(&store, "Work", &EntryId::new("C")).await.unwrap();
        assert_eq!(name, "Work7");
    }

    #[tokio::test]
    async fn test_renamed_folder_gets_new_name() {
        let store = MemoryResourceStore::new();
        address_book(&store, "Clients", "C").await;

        let name = assign_name(&store, "Work", &EntryId::new("C")).await.unwrap();
        assert_eq!(name, "Work");
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = MemoryResourceStore::new();
        let source = EntryId::new("F1");
        let first = ensure_address_book(&store, "Contacts", &source).await.unwrap();
        let second = ensure_address_book(&store, "Contacts", &source).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.list(ResourceType::AddressBook).await.unwrap(),
            vec![first]
        );

        let other = ensure_address_book(&store, "Contacts", &EntryId::new("F2"))
            .await
            .unwrap();
        let loaded = store.load(other).await.unwrap().unwrap();
        assert_eq!(loaded.str_prop(props::NAME), Some("Contacts2"));
    }
}
