//! # pimsync-core
//!
//! Change-reconciliation engine keeping a local resource graph in sync
//! with an external personal-information-manager store.
//!
//! This crate provides:
//! - Descriptors: point-in-time snapshots of external mail, contacts,
//!   tasks and folders
//! - The apply step merging descriptors into the resource graph, with
//!   the mail sync state machine
//! - Identity recovery for delete and move notifications
//! - Reply threading from headers and conversation indexes
//! - Address book naming
//! - A priority job queue with a single writer, delayed jobs and the
//!   task-export guard
//! - Resource stores: in-memory and `SQLite`
//! - An in-memory external store for tests and replays

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address_book;
pub mod apply;
pub mod config;
pub mod descriptor;
mod error;
pub mod external;
pub mod ids;
pub mod jobs;
pub mod recovery;
pub mod resource;
pub mod sync;
pub mod threading;

pub use apply::{Applier, MailSyncMode, MailTarget};
pub use config::{MailingListSettings, SyncSettings};
pub use descriptor::{
    ContactDescriptor, FolderDescriptor, ItemKind, MailDescriptor, TaskDescriptor,
    TaskExportDescriptor,
};
pub use error::{Error, Result};
pub use external::{
    ExternalStore, MemoryExternalStore, Notification, NotificationEvent, ObjectKind, StoreEvent,
};
pub use ids::{EntryId, EntryIdPair, RecordKey, ResourceId, StoreId};
pub use jobs::{ExportGuard, Job, JobPriority, JobQueue, JobScheduler, Shutdown};
pub use resource::{
    MemoryResourceStore, Resource, ResourceStore, ResourceType, ResourceUpdate,
    SqliteResourceStore,
};
pub use sync::Synchronizer;
