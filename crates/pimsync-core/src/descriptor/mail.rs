//! Mail descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{categories, smtp_address};
use crate::Result;
use crate::apply::MailSyncMode;
use crate::external::{ExternalStore, PropTag, PropertyBag, named};
use crate::ids::{EntryId, EntryIdPair, RecordKey};
use crate::threading::{self, ConversationIndex};

/// Message flag bit: the message has been read.
const MSGFLAG_READ: i64 = 0x0001;
/// Message flag bit: the message has attachments.
const MSGFLAG_HASATTACH: i64 = 0x0010;

/// How much of a message is read besides its scalar properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionDepth {
    /// Recipients and attachments.
    Full,
    /// Recipients only; attachments are left untouched on apply.
    RecipientsOnly,
}

/// Role of a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecipientKind {
    /// Sender.
    From,
    /// Primary recipient.
    To,
    /// Copied recipient.
    Cc,
    /// Blind copied recipient; never linked.
    Bcc,
}

impl RecipientKind {
    /// Maps the recipient table's type column.
    #[must_use]
    pub const fn from_table(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::To),
            2 => Some(Self::Cc),
            3 => Some(Self::Bcc),
            _ => None,
        }
    }
}

/// One resolved recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientDescriptor {
    /// Role.
    pub kind: RecipientKind,
    /// Display name, may be empty.
    pub name: String,
    /// Lowercase SMTP address.
    pub email: String,
}

/// One attachment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// Ordinal within the message.
    pub index: i64,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// MIME type, may be empty.
    pub content_type: String,
}

/// Follow-up flag status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlagStatus {
    /// Not flagged.
    #[default]
    None,
    /// Flagged for follow-up.
    Flagged,
    /// Follow-up completed.
    Complete,
}

/// Follow-up flag of a mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagState {
    /// Status.
    pub status: FlagStatus,
    /// Colour index (1 purple .. 6 red, 0 unset).
    pub icon: i64,
}

impl FlagState {
    /// Reads the flag properties.
    #[must_use]
    pub fn from_bag(bag: &PropertyBag) -> Self {
        let status = match bag.int(&PropTag::FlagStatus) {
            1 => FlagStatus::Complete,
            2 => FlagStatus::Flagged,
            _ => FlagStatus::None,
        };
        Self {
            status,
            icon: bag.int(&PropTag::FlagIcon),
        }
    }

    /// Name of the local flag resource; `None` when unflagged.
    #[must_use]
    pub const fn flag_name(self) -> Option<&'static str> {
        match self.status {
            FlagStatus::None => None,
            FlagStatus::Complete => Some("Completed Flag"),
            FlagStatus::Flagged => Some(match self.icon {
                1 => "Purple Flag",
                2 => "Orange Flag",
                3 => "Green Flag",
                4 => "Yellow Flag",
                5 => "Blue Flag",
                _ => "Red Flag",
            }),
        }
    }
}

/// Snapshot of one mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailDescriptor {
    /// Durable pair of the message.
    pub message: EntryIdPair,
    /// Containing folder.
    pub folder: EntryIdPair,
    /// Record key, if the store reports one.
    pub record_key: Option<RecordKey>,
    /// State the apply step starts in.
    pub mode: MailSyncMode,
    /// Message class.
    pub message_class: String,
    /// Subject.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// Received time, `MIN_UTC` when absent.
    pub received: DateTime<Utc>,
    /// Sent time, `MIN_UTC` when absent.
    pub sent: DateTime<Utc>,
    /// Last modification time, `MIN_UTC` when absent.
    pub modified: DateTime<Utc>,
    /// Unread state.
    pub unread: bool,
    /// Priority (-1, 0, 1).
    pub priority: i64,
    /// Importance (-1, 0, 1).
    pub importance: i64,
    /// Follow-up flag.
    pub flag: FlagState,
    /// Normalized `Message-ID`.
    pub message_id: Option<String>,
    /// Parent `Message-ID`.
    pub reply_to: Option<String>,
    /// Validated conversation index.
    pub conversation_index: Option<ConversationIndex>,
    /// Backslash-joined category paths.
    pub categories: Vec<String>,
    /// Hidden by the inbox-filtering overlay.
    pub overlay_deleted: bool,
    /// Whether the store reports attachments.
    pub has_attachments: bool,
    /// Resolved sender.
    pub sender: Option<RecipientDescriptor>,
    /// To, Cc and Bcc recipients.
    pub recipients: Vec<RecipientDescriptor>,
    /// Attachments; `None` leaves local attachments untouched.
    pub attachments: Option<Vec<AttachmentDescriptor>>,
}

impl MailDescriptor {
    /// Builds a descriptor from an opened message.
    ///
    /// The recipient table is always read; the attachment table only
    /// for [`ExtractionDepth::Full`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ExternalAccess`] if a table cannot be read.
    pub fn snapshot<E: ExternalStore + ?Sized>(
        external: &E,
        message: &EntryIdPair,
        bag: &PropertyBag,
        mode: MailSyncMode,
        depth: ExtractionDepth,
    ) -> Result<Self> {
        let folder = message.sibling(EntryId::new(bag.string(&PropTag::ParentEntryId)));
        let flags = bag.int(&PropTag::MessageFlags);

        let conversation_index = bag
            .binary(&PropTag::ConversationIndex)
            .and_then(ConversationIndex::from_bytes)
            .or_else(|| {
                bag.opt_string(&PropTag::ConversationIndex)
                    .and_then(|s| ConversationIndex::parse(&s))
            });

        let sender = smtp_address(
            bag,
            &PropTag::SenderSmtpAddress,
            &PropTag::SenderEmailAddress,
            &PropTag::SenderAddrType,
        )
        .map(|email| RecipientDescriptor {
            kind: RecipientKind::From,
            name: bag.string(&PropTag::SenderName),
            email,
        });

        let recipients = external
            .recipients(message)?
            .iter()
            .filter_map(|row| {
                let kind = RecipientKind::from_table(row.int(&PropTag::RecipientType))?;
                let email = smtp_address(
                    row,
                    &PropTag::SmtpAddress,
                    &PropTag::EmailAddress,
                    &PropTag::AddrType,
                )?;
                Some(RecipientDescriptor {
                    kind,
                    name: row.string(&PropTag::DisplayName),
                    email,
                })
            })
            .collect();

        let attachments = match depth {
            ExtractionDepth::Full => Some(
                external
                    .attachments(message)?
                    .iter()
                    .enumerate()
                    .map(|(position, row)| AttachmentDescriptor {
                        index: if row.has(&PropTag::AttachNum) {
                            row.int(&PropTag::AttachNum)
                        } else {
                            i64::try_from(position).unwrap_or(i64::MAX)
                        },
                        name: row
                            .opt_string(&PropTag::AttachLongFilename)
                            .unwrap_or_else(|| row.string(&PropTag::AttachFilename)),
                        size: row.int(&PropTag::AttachSize),
                        content_type: row.string(&PropTag::AttachMimeTag),
                    })
                    .collect(),
            ),
            ExtractionDepth::RecipientsOnly => None,
        };

        Ok(Self {
            message: message.clone(),
            folder,
            record_key: bag.opt_string(&PropTag::RecordKey).map(RecordKey::new),
            mode,
            message_class: bag.string(&PropTag::MessageClass),
            subject: bag.string(&PropTag::Subject),
            body: bag.string(&PropTag::Body),
            received: bag.date(&PropTag::MessageDeliveryTime),
            sent: bag.date(&PropTag::ClientSubmitTime),
            modified: bag.date(&PropTag::LastModificationTime),
            unread: flags & MSGFLAG_READ == 0,
            priority: bag.int(&PropTag::Priority).clamp(-1, 1),
            importance: (bag.int(&PropTag::Importance) - 1).clamp(-1, 1),
            flag: FlagState::from_bag(bag),
            message_id: threading::normalize_message_id(&bag.string(&PropTag::InternetMessageId)),
            reply_to: threading::parent_message_id(
                &bag.string(&PropTag::InReplyTo),
                &bag.string(&PropTag::InternetReferences),
            ),
            conversation_index,
            categories: categories(bag),
            overlay_deleted: bag.boolean(&named::OVERLAY_DELETED),
            has_attachments: flags & MSGFLAG_HASATTACH != 0,
            sender,
            recipients,
            attachments,
        })
    }

    /// Entry id of the message.
    #[must_use]
    pub const fn entry_id(&self) -> &EntryId {
        &self.message.entry_id
    }

    /// Recipients of one role.
    pub fn recipients_of(&self, kind: RecipientKind) -> impl Iterator<Item = &RecipientDescriptor> {
        self.recipients.iter().filter(move |r| r.kind == kind)
    }
}
