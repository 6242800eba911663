//! Mail apply state machine.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Applier;
use crate::Result;
use crate::config::SyncSettings;
use crate::descriptor::ExtractionDepth;
use crate::ids::{EntryId, RecordKey, ResourceId};
use crate::jobs::JobPriority;
use crate::resource::{self, LinkType, PropValue, ResourceStore, ResourceType, props};

/// How a mail snapshot is merged into the resource graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailSyncMode {
    /// First-time import: a new Email resource is created.
    Normal,
    /// The Email resource exists and is updated in place.
    Update,
    /// The mail moved between folders; its entry id may have rolled
    /// over, so identity falls back to the record key.
    Moved,
}

/// Outcome of resolving the target of a mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTarget {
    /// State after resolution.
    pub mode: MailSyncMode,
    /// Resource to update, `None` to create one.
    pub existing: Option<ResourceId>,
    /// Other resources sharing the record key; deleted after the merge.
    pub duplicates: Vec<ResourceId>,
    /// What the snapshot has to read.
    pub depth: ExtractionDepth,
}

impl MailSyncMode {
    /// Resolves the local resource a mail maps to.
    ///
    /// A hit by entry id moves `Normal` to `Update`. `Moved` additionally
    /// searches by record key when the entry id is unknown and keeps the
    /// most recently modified match, listing the others as duplicates.
    /// Nothing found means `Normal`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn resolve_target<R: ResourceStore>(
        self,
        store: &R,
        entry_id: &EntryId,
        record_key: Option<&RecordKey>,
    ) -> Result<MailTarget> {
        let by_entry = resource::find_by_entry_id(store, ResourceType::Email, entry_id).await?;

        let (mode, existing, duplicates) = match (self, by_entry) {
            (Self::Moved, Some(id)) => (Self::Moved, Some(id), Vec::new()),
            (_, Some(id)) => (Self::Update, Some(id), Vec::new()),
            (Self::Moved, None) => match record_key {
                Some(key) => {
                    let (keeper, duplicates) = most_recent_by_record_key(store, key).await?;
                    match keeper {
                        Some(id) => (Self::Moved, Some(id), duplicates),
                        None => (Self::Normal, None, Vec::new()),
                    }
                }
                None => (Self::Normal, None, Vec::new()),
            },
            (_, None) => (Self::Normal, None, Vec::new()),
        };

        // Attachments of an existing mail are only touched once it has a sender
        let full = match existing {
            None => true,
            Some(id) => resource::has_link(store, id, LinkType::From).await?,
        };
        let depth = if full {
            ExtractionDepth::Full
        } else {
            ExtractionDepth::RecipientsOnly
        };

        Ok(MailTarget {
            mode,
            existing,
            duplicates,
            depth,
        })
    }

    /// Picks the queue priority once a notification-driven snapshot is
    /// complete.
    #[must_use]
    pub const fn on_snapshot_complete(self, settings: &SyncSettings) -> JobPriority {
        match self {
            Self::Normal => settings.new_mail_priority,
            Self::Update | Self::Moved => settings.notification_priority,
        }
    }

    /// Finishes a merge: a move deletes the duplicates found while
    /// resolving.
    ///
    /// # Errors
    ///
    /// Returns an error if a duplicate cannot be deleted.
    pub async fn on_merge_complete<R: ResourceStore>(
        self,
        applier: &Applier<'_, R>,
        target: &MailTarget,
        id: ResourceId,
    ) -> Result<()> {
        match self {
            Self::Normal => debug!("created mail {id}"),
            Self::Update => debug!("updated mail {id}"),
            Self::Moved => {
                for duplicate in target.duplicates.iter().filter(|d| **d != id) {
                    applier.delete_item(*duplicate).await?;
                }
                if !target.duplicates.is_empty() {
                    info!(
                        "moved mail {id}: removed {} duplicate(s)",
                        target.duplicates.len()
                    );
                }
            }
        }
        Ok(())
    }
}

/// Finds the mails sharing a record key; returns the most recently
/// modified one (ties: highest id) and the rest.
async fn most_recent_by_record_key<R: ResourceStore>(
    store: &R,
    key: &RecordKey,
) -> Result<(Option<ResourceId>, Vec<ResourceId>)> {
    let matches = store
        .find_by_prop(
            ResourceType::Email,
            props::RECORD_KEY,
            &PropValue::from(key.as_str()),
        )
        .await?;

    let mut ranked = Vec::with_capacity(matches.len());
    for id in matches {
        let modified = store
            .load(id)
            .await?
            .and_then(|r| r.date_prop(props::MODIFIED));
        ranked.push((modified, id));
    }
    // None sorts before any date
    ranked.sort();
    let keeper = ranked.pop().map(|(_, id)| id);
    Ok((keeper, ranked.into_iter().map(|(_, id)| id).collect()))
}
