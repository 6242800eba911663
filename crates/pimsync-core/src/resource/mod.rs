//! Local resource graph collaborator.
//!
//! The resource store holds typed resources carrying named properties
//! and typed, directed links. All mutation goes through a
//! [`ResourceUpdate`] bracket committed on the writer queue.

mod memory;
pub mod props;
mod sqlite;

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;
use crate::ids::{EntryId, ResourceId};

pub use memory::MemoryResourceStore;
pub use sqlite::SqliteResourceStore;

/// Type of a local resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// E-mail message.
    Email,
    /// Person.
    Contact,
    /// One e-mail address of a contact.
    EmailAccount,
    /// Task.
    Task,
    /// External folder.
    Folder,
    /// Address book backed by a contact folder.
    AddressBook,
    /// Category.
    Category,
    /// Attachment of an e-mail.
    Attachment,
    /// Follow-up flag.
    Flag,
    /// External message store.
    InfoStore,
}

impl ResourceType {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Contact => "Contact",
            Self::EmailAccount => "EmailAccount",
            Self::Task => "Task",
            Self::Folder => "Folder",
            Self::AddressBook => "AddressBook",
            Self::Category => "Category",
            Self::Attachment => "Attachment",
            Self::Flag => "Flag",
            Self::InfoStore => "InfoStore",
        }
    }

    /// Parses the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Email,
            Self::Contact,
            Self::EmailAccount,
            Self::Task,
            Self::Folder,
            Self::AddressBook,
            Self::Category,
            Self::Attachment,
            Self::Flag,
            Self::InfoStore,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
    }
}

/// Type of a directed link between two resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Item → containing folder.
    InFolder,
    /// Folder or category → parent.
    Parent,
    /// Reply → replied-to e-mail.
    Reply,
    /// E-mail → sender contact.
    From,
    /// E-mail → primary recipient contact.
    To,
    /// E-mail → copied recipient contact.
    Cc,
    /// E-mail → attachment.
    Attachment,
    /// Item or contact → category.
    Category,
    /// E-mail → flag.
    Flag,
    /// Contact → e-mail account.
    EmailAccount,
    /// Contact → address book.
    InAddressBook,
    /// Folder → owning info store.
    OwnerStore,
}

impl LinkType {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InFolder => "InFolder",
            Self::Parent => "Parent",
            Self::Reply => "Reply",
            Self::From => "From",
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Attachment => "Attachment",
            Self::Category => "Category",
            Self::Flag => "Flag",
            Self::EmailAccount => "EmailAccount",
            Self::InAddressBook => "InAddressBook",
            Self::OwnerStore => "OwnerStore",
        }
    }
}

/// Direction in which links are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Links starting at the resource.
    Outgoing,
    /// Links ending at the resource.
    Incoming,
}

/// Value of a resource property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropValue {
    /// String.
    Str(String),
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Date, UTC.
    Date(DateTime<Utc>),
    /// Binary.
    Bytes(Vec<u8>),
}

impl PropValue {
    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the date payload.
    #[must_use]
    pub const fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&EntryId> for PropValue {
    fn from(id: &EntryId) -> Self {
        Self::Str(id.to_string())
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for PropValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

/// Snapshot of one resource's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource id.
    pub id: ResourceId,
    /// Resource type.
    pub resource_type: ResourceType,
    /// Properties by name.
    pub props: BTreeMap<String, PropValue>,
}

impl Resource {
    /// Returns a property value.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    /// Returns a string property.
    #[must_use]
    pub fn str_prop(&self, name: &str) -> Option<&str> {
        self.prop(name).and_then(PropValue::as_str)
    }

    /// Returns a boolean property, false when absent.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.prop(name).and_then(PropValue::as_bool).unwrap_or(false)
    }

    /// Returns a date property.
    #[must_use]
    pub fn date_prop(&self, name: &str) -> Option<DateTime<Utc>> {
        self.prop(name).and_then(PropValue::as_date)
    }

    /// Returns the stamped external entry id.
    #[must_use]
    pub fn entry_id(&self) -> Option<EntryId> {
        self.str_prop(props::ENTRY_ID).map(EntryId::new)
    }
}

/// Target of a [`ResourceUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    /// A resource created when the update commits.
    New(ResourceType),
    /// An existing resource.
    Existing(ResourceId),
}

/// Link change recorded in an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    /// Add `self → target` (no-op when present).
    Add(LinkType, ResourceId),
    /// Remove `self → target`.
    Remove(LinkType, ResourceId),
    /// Add `source → self` (no-op when present).
    AddIncoming(LinkType, ResourceId),
}

/// Begin/end update bracket.
///
/// Begin with [`ResourceUpdate::create`] or [`ResourceUpdate::edit`],
/// record changes, end with [`ResourceStore::commit`]. Nothing is
/// written until the commit, which applies every change atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUpdate {
    target: UpdateTarget,
    set: BTreeMap<String, PropValue>,
    delete: Vec<String>,
    links: Vec<LinkChange>,
}

impl ResourceUpdate {
    /// Begins creating a resource.
    #[must_use]
    pub const fn create(resource_type: ResourceType) -> Self {
        Self {
            target: UpdateTarget::New(resource_type),
            set: BTreeMap::new(),
            delete: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Begins editing an existing resource.
    #[must_use]
    pub const fn edit(id: ResourceId) -> Self {
        Self {
            target: UpdateTarget::Existing(id),
            set: BTreeMap::new(),
            delete: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Returns the update's target.
    #[must_use]
    pub const fn target(&self) -> UpdateTarget {
        self.target
    }

    /// Sets a property.
    pub fn set(&mut self, name: &str, value: impl Into<PropValue>) -> &mut Self {
        let name = name.to_string();
        self.delete.retain(|n| n != &name);
        self.set.insert(name, value.into());
        self
    }

    /// Sets a string property, deleting it when the value is empty.
    pub fn set_text(&mut self, name: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.delete(name)
        } else {
            self.set(name, value)
        }
    }

    /// Deletes a property.
    pub fn delete(&mut self, name: &str) -> &mut Self {
        self.set.remove(name);
        if !self.delete.iter().any(|n| n == name) {
            self.delete.push(name.to_string());
        }
        self
    }

    /// Adds an outgoing link.
    pub fn add_link(&mut self, link: LinkType, to: ResourceId) -> &mut Self {
        self.links.push(LinkChange::Add(link, to));
        self
    }

    /// Adds an incoming link.
    pub fn add_incoming_link(&mut self, link: LinkType, from: ResourceId) -> &mut Self {
        self.links.push(LinkChange::AddIncoming(link, from));
        self
    }

    /// Removes an outgoing link.
    pub fn remove_link(&mut self, link: LinkType, to: ResourceId) -> &mut Self {
        self.links.push(LinkChange::Remove(link, to));
        self
    }

    /// Properties to set.
    #[must_use]
    pub const fn sets(&self) -> &BTreeMap<String, PropValue> {
        &self.set
    }

    /// Properties to delete.
    #[must_use]
    pub fn deletes(&self) -> &[String] {
        &self.delete
    }

    /// Link changes, in recording order.
    #[must_use]
    pub fn link_changes(&self) -> &[LinkChange] {
        &self.links
    }

    /// Returns true when committing would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.target, UpdateTarget::Existing(_))
            && self.set.is_empty()
            && self.delete.is_empty()
            && self.links.is_empty()
    }
}

/// Asynchronous access to the local resource graph.
///
/// Implementations apply each [`ResourceUpdate`] atomically and keep
/// links exactly-once per `(from, to, type)`.
pub trait ResourceStore: Send + Sync {
    /// Loads a resource, `None` if it does not exist.
    fn load(&self, id: ResourceId) -> impl Future<Output = Result<Option<Resource>>> + Send;

    /// Finds resources of a type whose property equals a value,
    /// ordered by id.
    fn find_by_prop(
        &self,
        resource_type: ResourceType,
        name: &str,
        value: &PropValue,
    ) -> impl Future<Output = Result<Vec<ResourceId>>> + Send;

    /// Lists all resources of a type, ordered by id.
    fn list(&self, resource_type: ResourceType)
    -> impl Future<Output = Result<Vec<ResourceId>>> + Send;

    /// Follows links of a type from or to a resource, ordered by id.
    fn links(
        &self,
        id: ResourceId,
        link: LinkType,
        direction: Direction,
    ) -> impl Future<Output = Result<Vec<ResourceId>>> + Send;

    /// Commits an update and returns the id of its target.
    fn commit(&self, update: ResourceUpdate) -> impl Future<Output = Result<ResourceId>> + Send;

    /// Permanently deletes a resource together with its links.
    fn delete(&self, id: ResourceId) -> impl Future<Output = Result<()>> + Send;
}

/// Finds the single resource of a type carrying a property value.
///
/// Duplicates violate the uniqueness invariant; they are reported and
/// the oldest resource wins.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn find_unique<S: ResourceStore>(
    store: &S,
    resource_type: ResourceType,
    name: &str,
    value: &PropValue,
) -> Result<Option<ResourceId>> {
    let found = store.find_by_prop(resource_type, name, value).await?;
    if found.len() > 1 {
        warn!(
            "{} resources of type {} share {name}={value:?}; using {}",
            found.len(),
            resource_type.as_str(),
            found[0]
        );
    }
    Ok(found.first().copied())
}

/// Finds the resource of a type stamped with an external entry id.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn find_by_entry_id<S: ResourceStore>(
    store: &S,
    resource_type: ResourceType,
    entry_id: &EntryId,
) -> Result<Option<ResourceId>> {
    find_unique(store, resource_type, props::ENTRY_ID, &entry_id.into()).await
}

/// Returns true if the resource has at least one outgoing link of a type.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn has_link<S: ResourceStore>(store: &S, id: ResourceId, link: LinkType) -> Result<bool> {
    Ok(!store
        .links(id, link, Direction::Outgoing)
        .await?
        .is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_roundtrip() {
        for t in [
            ResourceType::Email,
            ResourceType::AddressBook,
            ResourceType::InfoStore,
        ] {
            assert_eq!(ResourceType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ResourceType::parse("Nope"), None);
    }

    #[test]
    fn test_set_then_delete_keeps_last_intent() {
        let mut update = ResourceUpdate::edit(ResourceId(1));
        update.set("Subject", "a").delete("Subject");
        assert!(update.sets().is_empty());
        assert_eq!(update.deletes(), ["Subject".to_string()]);

        update.set("Subject", "b");
        assert!(update.deletes().is_empty());
        assert_eq!(update.sets().get("Subject"), Some(&PropValue::from("b")));
    }

    #[test]
    fn test_empty_text_becomes_delete() {
        let mut update = ResourceUpdate::create(ResourceType::Email);
        update.set_text("Body", "");
        assert_eq!(update.deletes(), ["Body".to_string()]);
        assert!(!update.is_empty());
        assert!(ResourceUpdate::edit(ResourceId(3)).is_empty());
    }
}
