//! Identity recovery for delete and move notifications.
//!
//! A delete or move notification carries an entry id that was only
//! valid when the event happened. To find out what disappeared, the
//! children the resource graph knows for the parent container are
//! diffed against the external store:
//!
//! 1. Direct diff: every known child is reopened; the first one that
//!    cannot be reopened is the target.
//! 2. Live diff, only when the direct diff finds nothing: the parent's
//!    current children are enumerated and each reopenable one is removed
//!    from the known set. The remainder is resolved against the local
//!    resource kinds and the first hit is the target.
//!
//! The same helper serves item deletes, folder deletes and address book
//! pruning; callers supply the known children, the reopen check and the
//! live enumeration.

use std::collections::BTreeSet;

use tracing::debug;

use crate::Result;
use crate::ids::{EntryId, ResourceId};
use crate::resource::{self, Direction, LinkType, ResourceStore, ResourceType};

/// Which phase found a vanished child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// A known child could not be reopened.
    Direct,
    /// A known child is missing from the live enumeration.
    LiveDiff,
}

/// A vanished child resolved to a local resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vanished {
    /// Entry id the child was known under.
    pub entry_id: EntryId,
    /// Local resource.
    pub resource: ResourceId,
    /// Type of the local resource.
    pub resource_type: ResourceType,
    /// Phase that found it.
    pub phase: RecoveryPhase,
}

/// Resource kinds an item notification can refer to.
pub const ITEM_KINDS: [ResourceType; 3] =
    [ResourceType::Email, ResourceType::Task, ResourceType::Contact];

/// Phase 1: the first known child that can no longer be reopened.
pub fn direct_diff<'a>(
    known: &'a [EntryId],
    can_reopen: impl Fn(&EntryId) -> bool,
) -> Option<&'a EntryId> {
    known.iter().find(|id| !can_reopen(id))
}

/// Phase 2: known children minus the reopenable live ones, in the
/// order they are known.
pub fn live_diff(
    known: &[EntryId],
    live: &[EntryId],
    can_reopen: impl Fn(&EntryId) -> bool,
) -> Vec<EntryId> {
    let present: BTreeSet<&EntryId> = live.iter().filter(|id| can_reopen(id)).collect();
    known
        .iter()
        .filter(|id| !present.contains(id))
        .cloned()
        .collect()
}

/// Resolves an entry id against several resource kinds, first hit wins.
///
/// # Errors
///
/// Returns an error if a store query fails.
pub async fn resolve_entry_id<R: ResourceStore>(
    store: &R,
    entry_id: &EntryId,
    kinds: &[ResourceType],
) -> Result<Option<(ResourceType, ResourceId)>> {
    for kind in kinds {
        if let Some(id) = resource::find_by_entry_id(store, *kind, entry_id).await? {
            return Ok(Some((*kind, id)));
        }
    }
    Ok(None)
}

/// Runs both phases and returns the first vanished child that resolves
/// to a local resource of one of `kinds`.
///
/// `enumerate` is only called when phase 1 finds nothing.
///
/// # Errors
///
/// Returns an error if a store query fails or the live enumeration
/// cannot be read.
pub async fn recover_vanished<R, C, L>(
    store: &R,
    known: &[EntryId],
    can_reopen: C,
    enumerate: L,
    kinds: &[ResourceType],
) -> Result<Option<Vanished>>
where
    R: ResourceStore,
    C: Fn(&EntryId) -> bool,
    L: FnOnce() -> Result<Vec<EntryId>>,
{
    if let Some(entry_id) = direct_diff(known, &can_reopen).cloned() {
        debug!("direct diff: {entry_id} can no longer be opened");
        if let Some((resource_type, resource)) = resolve_entry_id(store, &entry_id, kinds).await? {
            return Ok(Some(Vanished {
                entry_id,
                resource,
                resource_type,
                phase: RecoveryPhase::Direct,
            }));
        }
    }

    let live = enumerate()?;
    let candidates = live_diff(known, &live, &can_reopen);
    debug!(
        "live diff: {} of {} known children vanished",
        candidates.len(),
        known.len()
    );
    for entry_id in candidates {
        if let Some((resource_type, resource)) = resolve_entry_id(store, &entry_id, kinds).await? {
            return Ok(Some(Vanished {
                entry_id,
                resource,
                resource_type,
                phase: RecoveryPhase::LiveDiff,
            }));
        }
    }
    Ok(None)
}

/// Entry ids of the local resources linked to `parent` by `link`.
///
/// # Errors
///
/// Returns an error if a store query fails.
pub async fn known_children<R: ResourceStore>(
    store: &R,
    parent: ResourceId,
    link: LinkType,
    kinds: &[ResourceType],
) -> Result<Vec<EntryId>> {
    let mut known = Vec::new();
    for child in store.links(parent, link, Direction::Incoming).await? {
        if let Some(resource) = store.load(child).await? {
            if kinds.contains(&resource.resource_type) {
                if let Some(entry_id) = resource.entry_id() {
                    known.push(entry_id);
                }
            }
        }
    }
    Ok(known)
}
