//! Folder descriptor.

use serde::{Deserialize, Serialize};

use crate::external::{PropTag, PropertyBag};
use crate::ids::{EntryId, EntryIdPair};

/// What a folder contains, from its container class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderKind {
    /// Mail (`IPF.Note`, or no class).
    Mail,
    /// Contacts (`IPF.Contact`).
    Contact,
    /// Tasks (`IPF.Task`).
    Task,
    /// Calendars, notes, journals, ...
    Other,
}

impl FolderKind {
    /// Classifies a container class.
    #[must_use]
    pub fn from_container_class(class: &str) -> Self {
        let class = class.to_ascii_uppercase();
        if class.is_empty() || class.starts_with("IPF.NOTE") {
            Self::Mail
        } else if class.starts_with("IPF.CONTACT") {
            Self::Contact
        } else if class.starts_with("IPF.TASK") {
            Self::Task
        } else {
            Self::Other
        }
    }
}

/// Snapshot of one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    /// Durable pair of the folder.
    pub folder: EntryIdPair,
    /// Parent folder, `None` for a store root.
    pub parent: Option<EntryId>,
    /// Display name.
    pub name: String,
    /// Container class.
    pub container_class: String,
    /// Classified container class.
    pub kind: FolderKind,
    /// Number of items.
    pub content_count: i64,
}

impl FolderDescriptor {
    /// Builds a descriptor from an opened folder.
    #[must_use]
    pub fn snapshot(folder: &EntryIdPair, bag: &PropertyBag) -> Self {
        let container_class = bag.string(&PropTag::ContainerClass);
        Self {
            folder: folder.clone(),
            parent: bag.opt_string(&PropTag::ParentEntryId).map(EntryId::new),
            name: bag.string(&PropTag::DisplayName),
            kind: FolderKind::from_container_class(&container_class),
            container_class,
            content_count: bag.int(&PropTag::ContentCount),
        }
    }

    /// Entry id of the folder.
    #[must_use]
    pub const fn entry_id(&self) -> &EntryId {
        &self.folder.entry_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_kind() {
        assert_eq!(FolderKind::from_container_class(""), FolderKind::Mail);
        assert_eq!(FolderKind::from_container_class("IPF.Note"), FolderKind::Mail);
        assert_eq!(
            FolderKind::from_container_class("IPF.Contact"),
            FolderKind::Contact
        );
        assert_eq!(FolderKind::from_container_class("IPF.Task"), FolderKind::Task);
        assert_eq!(
            FolderKind::from_container_class("IPF.Appointment"),
            FolderKind::Other
        );
    }
}
