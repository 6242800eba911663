//! At-most-one-in-flight guard for export jobs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::ids::ResourceId;

/// Set of resources with an export job pending or running.
///
/// Owned by the synchronizer and handed to whatever builds export jobs.
#[derive(Debug, Clone, Default)]
pub struct ExportGuard {
    in_flight: Arc<Mutex<HashSet<ResourceId>>>,
}

impl ExportGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, HashSet<ResourceId>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims a resource. Returns `None` if an export for it is already
    /// in flight.
    #[must_use]
    pub fn try_acquire(&self, id: ResourceId) -> Option<ExportTicket> {
        if self.set().insert(id) {
            Some(ExportTicket {
                guard: self.clone(),
                id,
            })
        } else {
            debug!("export of resource {id} already in flight");
            None
        }
    }

    /// Returns true if an export for the resource is in flight.
    #[must_use]
    pub fn is_held(&self, id: ResourceId) -> bool {
        self.set().contains(&id)
    }
}

/// Claim on one resource; released when dropped.
#[derive(Debug)]
pub struct ExportTicket {
    guard: ExportGuard,
    id: ResourceId,
}

impl ExportTicket {
    /// The claimed resource.
    #[must_use]
    pub const fn resource(&self) -> ResourceId {
        self.id
    }
}

impl Drop for ExportTicket {
    fn drop(&mut self) {
        self.guard.set().remove(&self.id);
    }
}
