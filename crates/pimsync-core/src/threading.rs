//! Reply and conversation threading.
//!
//! Reply links are derived data: they are recomputed from the header
//! fields and the conversation index every time a mail is applied, and
//! cycles produced by malformed headers are tolerated.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::ids::ResourceId;
use crate::resource::{self, LinkType, ResourceStore, ResourceType, ResourceUpdate, props};

/// Length of a root conversation index, in bytes.
pub const ROOT_INDEX_LEN: usize = 44;
/// Bytes appended per reply level.
pub const CHILD_BLOCK_LEN: usize = 10;

/// Validated conversation index, kept in textual (uppercase hex) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationIndex(String);

impl ConversationIndex {
    /// Returns true if a byte length is a valid conversation index length.
    #[must_use]
    pub const fn is_valid_len(len: usize) -> bool {
        len >= ROOT_INDEX_LEN && (len - ROOT_INDEX_LEN) % CHILD_BLOCK_LEN == 0
    }

    /// Validates raw index bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if !Self::is_valid_len(bytes.len()) {
            return None;
        }
        let mut text = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(text, "{b:02X}");
        }
        Some(Self(text))
    }

    /// Validates the textual form.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Self::is_valid_len(text.len() / 2).then(|| Self(text.to_ascii_uppercase()))
    }

    /// Textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }

    /// Reply depth, zero for a root.
    #[must_use]
    pub fn depth(&self) -> usize {
        (self.byte_len() - ROOT_INDEX_LEN) / CHILD_BLOCK_LEN
    }

    /// Index of the replied-to message; `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.depth() == 0 {
            return None;
        }
        let keep = (self.byte_len() - CHILD_BLOCK_LEN) * 2;
        Some(Self(self.0[..keep].to_string()))
    }
}

impl std::fmt::Display for ConversationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Splits a header value into `<...>` tokens.
fn angle_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        tokens.push(&rest[start..=start + len]);
        rest = &rest[start + len + 1..];
    }
    tokens
}

/// Normalizes a `Message-ID` header value.
#[must_use]
pub fn normalize_message_id(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(
        angle_tokens(value)
            .first()
            .map_or_else(|| value.to_string(), |t| (*t).to_string()),
    )
}

/// Picks the parent message id: the first `In-Reply-To` token, else the
/// last `<...>` token of `References`.
#[must_use]
pub fn parent_message_id(in_reply_to: &str, references: &str) -> Option<String> {
    let in_reply_to = in_reply_to.trim();
    if !in_reply_to.is_empty() {
        if let Some(first) = angle_tokens(in_reply_to).first() {
            return Some((*first).to_string());
        }
        return in_reply_to.split_whitespace().next().map(str::to_string);
    }
    angle_tokens(references).last().map(|t| (*t).to_string())
}

/// Threading keys of one mail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadKeys<'a> {
    /// Own `Message-ID`.
    pub message_id: Option<&'a str>,
    /// Parent `Message-ID`.
    pub reply_to: Option<&'a str>,
    /// Own conversation index.
    pub conversation_index: Option<&'a ConversationIndex>,
}

/// Looks up the replied-to mail, by message id first, then by the
/// parent conversation index.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn find_parent<R: ResourceStore>(
    store: &R,
    keys: &ThreadKeys<'_>,
) -> Result<Option<ResourceId>> {
    if let Some(reply_to) = keys.reply_to {
        let found =
            resource::find_unique(store, ResourceType::Email, props::MESSAGE_ID, &reply_to.into())
                .await?;
        if found.is_some() {
            return Ok(found);
        }
    }
    if let Some(parent) = keys.conversation_index.and_then(ConversationIndex::parent) {
        return resource::find_unique(
            store,
            ResourceType::Email,
            props::CONVERSATION_INDEX,
            &parent.as_str().into(),
        )
        .await;
    }
    Ok(None)
}

/// Finds the parent a mail's `Reply` link should point to.
///
/// `target` is the mail being applied, `None` while it is being created.
/// Self-links are skipped; cycles are not checked.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn reply_parent<R: ResourceStore>(
    store: &R,
    target: Option<ResourceId>,
    keys: &ThreadKeys<'_>,
) -> Result<Option<ResourceId>> {
    let Some(parent) = find_parent(store, keys).await? else {
        return Ok(None);
    };
    if Some(parent) == target {
        debug!("mail {parent} replies to itself, no link");
        return Ok(None);
    }
    Ok(Some(parent))
}

/// Links mails that arrived before their parent to the now-applied
/// parent. Returns the number of children examined.
///
/// # Errors
///
/// Returns an error if a store query or commit fails.
pub async fn link_children<R: ResourceStore>(
    store: &R,
    parent: ResourceId,
    keys: &ThreadKeys<'_>,
) -> Result<usize> {
    let mut children = Vec::new();
    if let Some(message_id) = keys.message_id {
        children.extend(
            store
                .find_by_prop(ResourceType::Email, props::REPLY_TO, &message_id.into())
                .await?,
        );
    }
    if let Some(index) = keys.conversation_index {
        children.extend(
            store
                .find_by_prop(
                    ResourceType::Email,
                    props::REPLY_TO_CONVERSATION_INDEX,
                    &index.as_str().into(),
                )
                .await?,
        );
    }
    children.sort_unstable();
    children.dedup();
    children.retain(|child| *child != parent);

    if !children.is_empty() {
        let mut update = ResourceUpdate::edit(parent);
        for child in &children {
            update.add_incoming_link(LinkType::Reply, *child);
        }
        store.commit(update).await?;
    }
    Ok(children.len())
}
