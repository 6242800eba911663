//! Descriptors: point-in-time snapshots of external objects.
//!
//! A descriptor is built on the external access queue while the
//! external object is open, handed to the writer queue and applied there
//! exactly once. Construction never mutates either store; absent
//! properties become empty values (empty string, `MIN_UTC`) instead of
//! failing the snapshot.

mod contact;
mod folder;
mod mail;
mod task;

use chrono::{DateTime, Utc};

use crate::external::{PropTag, PropertyBag};

pub use contact::ContactDescriptor;
pub use folder::{FolderDescriptor, FolderKind};
pub use mail::{
    AttachmentDescriptor, ExtractionDepth, FlagState, FlagStatus, MailDescriptor,
    RecipientDescriptor, RecipientKind,
};
pub use task::{TASK_CLASS, TaskDescriptor, TaskExportDescriptor, TaskStatus};

/// Address type of SMTP addresses.
const SMTP: &str = "SMTP";

/// Item category derived from its message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// E-mail, meeting request, report, ...
    Mail,
    /// Contact or distribution list.
    Contact,
    /// Task.
    Task,
}

impl ItemKind {
    /// Classifies a message class.
    #[must_use]
    pub fn from_message_class(class: &str) -> Self {
        let class = class.to_ascii_uppercase();
        if class.starts_with("IPM.CONTACT") || class.starts_with("IPM.DISTLIST") {
            Self::Contact
        } else if class.starts_with("IPM.TASK") {
            Self::Task
        } else {
            Self::Mail
        }
    }
}

/// Lowercases and trims an address; `None` if it is not an address.
#[must_use]
pub fn normalize_address(address: &str) -> Option<String> {
    let address = address.trim().trim_matches(|c| c == '<' || c == '>');
    (address.contains('@') && !address.contains(char::is_whitespace))
        .then(|| address.to_lowercase())
}

/// Resolves one `type:address` proxy entry to an SMTP address.
fn resolve_proxy(entry: &str) -> Option<String> {
    let (kind, address) = entry.split_once(':')?;
    if kind.eq_ignore_ascii_case(SMTP) {
        normalize_address(address)
    } else {
        None
    }
}

/// Collects e-mail addresses, primary first.
///
/// With a proxy list the primary address is the first resolvable proxy
/// and the remaining resolvable proxies follow. Without one, `flat`
/// tags are read in order. Duplicates are dropped.
#[must_use]
pub fn collect_addresses(bag: &PropertyBag, proxy: &PropTag, flat: &[&PropTag]) -> Vec<String> {
    let proxies = bag.strings(proxy);
    let mut addresses: Vec<String> = if proxies.is_empty() {
        flat.iter()
            .filter_map(|tag| bag.opt_string(tag))
            .filter_map(|a| normalize_address(&a))
            .collect()
    } else {
        proxies.iter().filter_map(|p| resolve_proxy(p)).collect()
    };
    let mut seen = std::collections::HashSet::new();
    addresses.retain(|a| seen.insert(a.clone()));
    addresses
}

/// Resolves the SMTP address of a recipient or sender.
///
/// Prefers the explicit SMTP tag, then the flat address when its type
/// is SMTP, then the first resolvable proxy.
#[must_use]
pub fn smtp_address(
    bag: &PropertyBag,
    smtp: &PropTag,
    address: &PropTag,
    addr_type: &PropTag,
) -> Option<String> {
    if let Some(found) = bag.opt_string(smtp).and_then(|a| normalize_address(&a)) {
        return Some(found);
    }
    let kind = bag.string(addr_type);
    if kind.is_empty() || kind.eq_ignore_ascii_case(SMTP) {
        if let Some(found) = bag.opt_string(address).and_then(|a| normalize_address(&a)) {
            return Some(found);
        }
    }
    bag.strings(&PropTag::ProxyAddresses)
        .iter()
        .find_map(|p| resolve_proxy(p))
}

/// Category names of an item, trimmed, blanks dropped.
#[must_use]
pub fn categories(bag: &PropertyBag) -> Vec<String> {
    bag.strings(&PropTag::Categories)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Returns `None` for the `MIN_UTC` "absent" marker.
#[must_use]
pub fn present(date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (date != DateTime::<Utc>::MIN_UTC).then_some(date)
}
