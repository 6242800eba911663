//! Property tags understood by the synchronizer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Property set of a named (GUID + id) property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropSet {
    /// Properties shared by all item types.
    Common,
    /// Contact properties.
    Address,
    /// Task properties.
    Task,
    /// Properties written by the inbox-filtering overlay.
    Overlay,
}

impl PropSet {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Address => "address",
            Self::Task => "task",
            Self::Overlay => "overlay",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Self::Common),
            "address" => Some(Self::Address),
            "task" => Some(Self::Task),
            "overlay" => Some(Self::Overlay),
            _ => None,
        }
    }
}

macro_rules! prop_tags {
    ($($(#[$doc:meta])* $variant:ident),+ $(,)?) => {
        /// Tag of an external property.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub enum PropTag {
            $($(#[$doc])* $variant,)+
            /// Named property addressed by property set and id.
            Named {
                /// Property set.
                set: PropSet,
                /// Id within the set.
                id: u32,
            },
        }

        impl PropTag {
            fn simple_name(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some(stringify!($variant)),)+
                    Self::Named { .. } => None,
                }
            }

            fn from_simple_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

prop_tags! {
    /// Entry id of the object.
    EntryId,
    /// Record key.
    RecordKey,
    /// Entry id of the containing folder.
    ParentEntryId,
    /// Message class (`IPM.Note`, `IPM.Contact`, `IPM.Task`).
    MessageClass,
    /// Subject.
    Subject,
    /// Plain text body.
    Body,
    /// Display name.
    DisplayName,
    /// Folder container class (`IPF.Note`, ...).
    ContainerClass,
    /// Number of items in a folder.
    ContentCount,
    /// Last modification time.
    LastModificationTime,
    /// Delivery (received) time.
    MessageDeliveryTime,
    /// Submit (sent) time.
    ClientSubmitTime,
    /// Message flag bits.
    MessageFlags,
    /// Priority (-1, 0, 1).
    Priority,
    /// Importance (0, 1, 2).
    Importance,
    /// Follow-up flag status.
    FlagStatus,
    /// Follow-up flag colour.
    FlagIcon,
    /// Internet `Message-ID` header.
    InternetMessageId,
    /// Internet `In-Reply-To` header.
    InReplyTo,
    /// Internet `References` header.
    InternetReferences,
    /// Conversation index bytes.
    ConversationIndex,
    /// Category names.
    Categories,
    /// Sender display name.
    SenderName,
    /// Sender address.
    SenderEmailAddress,
    /// Sender address type (`SMTP`, `EX`).
    SenderAddrType,
    /// Sender SMTP address.
    SenderSmtpAddress,
    /// Recipient kind (1 To, 2 Cc, 3 Bcc).
    RecipientType,
    /// Address of a recipient or contact.
    EmailAddress,
    /// Address type of a recipient.
    AddrType,
    /// SMTP address of a recipient.
    SmtpAddress,
    /// Proxy address list (`SMTP:a@b`, `smtp:alias@b`, `X500:...`).
    ProxyAddresses,
    /// Attachment ordinal.
    AttachNum,
    /// Short attachment file name.
    AttachFilename,
    /// Long attachment file name.
    AttachLongFilename,
    /// Attachment size in bytes.
    AttachSize,
    /// Attachment content type.
    AttachMimeTag,
    /// Given name.
    GivenName,
    /// Middle name.
    MiddleName,
    /// Surname.
    Surname,
    /// Name prefix (title).
    DisplayNamePrefix,
    /// Name suffix.
    Generation,
    /// Company name.
    CompanyName,
    /// Job title.
    Title,
    /// Business phone.
    BusinessTelephoneNumber,
    /// Home phone.
    HomeTelephoneNumber,
    /// Mobile phone.
    MobileTelephoneNumber,
    /// Business fax.
    BusinessFaxNumber,
    /// Birthday.
    Birthday,
    /// Personal home page.
    PersonalHomePage,
    /// Postal address.
    PostalAddress,
    /// Whether a reminder is set.
    ReminderSet,
}

/// Named properties used by the synchronizer.
pub mod named {
    use super::{PropSet, PropTag};

    /// First contact e-mail address.
    pub const EMAIL1_ADDRESS: PropTag = PropTag::Named {
        set: PropSet::Address,
        id: 0x8083,
    };
    /// Second contact e-mail address.
    pub const EMAIL2_ADDRESS: PropTag = PropTag::Named {
        set: PropSet::Address,
        id: 0x8093,
    };
    /// Third contact e-mail address.
    pub const EMAIL3_ADDRESS: PropTag = PropTag::Named {
        set: PropSet::Address,
        id: 0x80A3,
    };
    /// Task status.
    pub const TASK_STATUS: PropTag = PropTag::Named {
        set: PropSet::Task,
        id: 0x8101,
    };
    /// Task completion, 0.0 to 1.0 stored as per-mille integer.
    pub const TASK_PERCENT_COMPLETE: PropTag = PropTag::Named {
        set: PropSet::Task,
        id: 0x8102,
    };
    /// Task start date.
    pub const TASK_START_DATE: PropTag = PropTag::Named {
        set: PropSet::Task,
        id: 0x8104,
    };
    /// Task due date.
    pub const TASK_DUE_DATE: PropTag = PropTag::Named {
        set: PropSet::Task,
        id: 0x8105,
    };
    /// Task completion date.
    pub const TASK_DATE_COMPLETED: PropTag = PropTag::Named {
        set: PropSet::Task,
        id: 0x810F,
    };
    /// Reminder time.
    pub const REMINDER_TIME: PropTag = PropTag::Named {
        set: PropSet::Common,
        id: 0x8502,
    };
    /// Set when the inbox-filtering overlay hides the item as deleted.
    pub const OVERLAY_DELETED: PropTag = PropTag::Named {
        set: PropSet::Overlay,
        id: 0x0001,
    };
}

impl std::fmt::Display for PropTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named { set, id } => write!(f, "named:{}:{id:#06x}", set.as_str()),
            other => f.write_str(other.simple_name().unwrap_or_default()),
        }
    }
}

impl FromStr for PropTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("named:") {
            let (set, id) = rest
                .split_once(':')
                .ok_or_else(|| format!("malformed named property: {s}"))?;
            let set = PropSet::parse(set).ok_or_else(|| format!("unknown property set: {set}"))?;
            let id = id.trim_start_matches("0x");
            let id = u32::from_str_radix(id, 16).map_err(|e| format!("bad property id {id}: {e}"))?;
            return Ok(Self::Named { set, id });
        }
        Self::from_simple_name(s).ok_or_else(|| format!("unknown property tag: {s}"))
    }
}

impl From<PropTag> for String {
    fn from(tag: PropTag) -> Self {
        tag.to_string()
    }
}

impl TryFrom<String> for PropTag {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_named_tag_string_form() {
        assert_eq!(named::TASK_DUE_DATE.to_string(), "named:task:0x8105");
        assert_eq!(
            "named:task:0x8105".parse::<PropTag>().unwrap(),
            named::TASK_DUE_DATE
        );
    }

    #[test]
    fn test_simple_tag_string_form() {
        assert_eq!(PropTag::InReplyTo.to_string(), "InReplyTo");
        assert_eq!("Subject".parse::<PropTag>().unwrap(), PropTag::Subject);
        assert!("NoSuchTag".parse::<PropTag>().is_err());
    }

    #[test]
    fn test_tags_serialize_as_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(named::EMAIL2_ADDRESS, 1);
        map.insert(PropTag::Subject, 2);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<PropTag, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
