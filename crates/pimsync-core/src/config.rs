//! Synchronizer settings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;
use crate::jobs::JobPriority;

/// Default delay before a failed delete/move resolution is retried.
pub const DEFAULT_DELETION_RETRY_DELAY_SECS: u64 = 120;

/// Settings of the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Mirror external categories as local category links.
    pub sync_categories: bool,
    /// Names of folders excluded from synchronization (case-insensitive).
    pub ignored_folders: Vec<String>,
    /// Delay of the single deferred retry of identity recovery.
    pub deletion_retry_delay_secs: u64,
    /// Mailing-list sender heuristic.
    pub mailing_list: MailingListSettings,
    /// Priority of full-enumeration work.
    pub enumeration_priority: JobPriority,
    /// Priority of notification-driven work.
    pub notification_priority: JobPriority,
    /// Priority of newly arrived mail.
    pub new_mail_priority: JobPriority,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_categories: true,
            ignored_folders: Vec::new(),
            deletion_retry_delay_secs: DEFAULT_DELETION_RETRY_DELAY_SECS,
            mailing_list: MailingListSettings::default(),
            enumeration_priority: JobPriority::Lowest,
            notification_priority: JobPriority::Normal,
            new_mail_priority: JobPriority::AboveNormal,
        }
    }
}

impl SyncSettings {
    /// Returns true if a folder with this name is excluded.
    #[must_use]
    pub fn is_ignored_folder(&self, name: &str) -> bool {
        self.ignored_folders
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(name))
    }

    /// Loads settings from a JSON file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saves settings as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }
}

/// Heuristic deciding whether a sender is a mailing list.
///
/// A sender matches when its local part starts with one of the prefixes
/// or ends with one of the suffixes, or when its domain is listed. Any
/// address sharing a listed domain matches, including personal ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailingListSettings {
    /// Local-part prefixes, e.g. `owner-`.
    pub local_part_prefixes: Vec<String>,
    /// Local-part suffixes, e.g. `-request`.
    pub local_part_suffixes: Vec<String>,
    /// Domains whose every address is a list.
    pub domains: Vec<String>,
    /// Category given to matching contacts.
    pub category: String,
}

impl Default for MailingListSettings {
    fn default() -> Self {
        Self {
            local_part_prefixes: vec!["owner-".into(), "bounce-".into()],
            local_part_suffixes: vec!["-request".into(), "-bounces".into(), "-owner".into()],
            domains: Vec::new(),
            category: "Mailing Lists".into(),
        }
    }
}

impl MailingListSettings {
    /// Applies the heuristic to an address.
    #[must_use]
    pub fn matches(&self, address: &str) -> bool {
        let address = address.trim().to_lowercase();
        let Some((local, domain)) = address.rsplit_once('@') else {
            return false;
        };
        self.local_part_prefixes
            .iter()
            .any(|p| !p.is_empty() && local.starts_with(&p.to_lowercase()))
            || self
                .local_part_suffixes
                .iter()
                .any(|s| !s.is_empty() && local.ends_with(&s.to_lowercase()))
            || self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}
