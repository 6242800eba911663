//! Property names stamped on local resources.

/// External entry id; unique per resource type.
pub const ENTRY_ID: &str = "EntryID";
/// External record key.
pub const RECORD_KEY: &str = "RecordKey";
/// External store id.
pub const STORE_ID: &str = "StoreID";
/// Display name of folders, stores, categories, flags, address books.
pub const NAME: &str = "Name";
/// Subject of e-mails and tasks.
pub const SUBJECT: &str = "Subject";
/// Plain text body or notes.
pub const BODY: &str = "Body";
/// Message class.
pub const MESSAGE_CLASS: &str = "MessageClass";
/// Received date.
pub const RECEIVED: &str = "Date";
/// Sent date.
pub const SENT: &str = "SentOn";
/// Last modification time in the external store.
pub const MODIFIED: &str = "LastModifiedTime";
/// Unread state.
pub const UNREAD: &str = "IsUnread";
/// Priority (-1, 0, 1).
pub const PRIORITY: &str = "Priority";
/// Importance (-1, 0, 1).
pub const IMPORTANCE: &str = "Importance";
/// Internet `Message-ID`.
pub const MESSAGE_ID: &str = "MessageId";
/// Parent `Message-ID` derived from the reply headers.
pub const REPLY_TO: &str = "ReplyTo";
/// Conversation index, textual form.
pub const CONVERSATION_INDEX: &str = "ConversationIndex";
/// Conversation index of the parent message.
pub const REPLY_TO_CONVERSATION_INDEX: &str = "ReplyToConversationIndex";
/// Whether the e-mail has attachments.
pub const HAS_ATTACHMENTS: &str = "HasAttachments";
/// Local deleted state toggled by the inbox-filtering overlay.
pub const IS_DELETED: &str = "IsDeleted";

/// Folder container class.
pub const CONTAINER_CLASS: &str = "ContainerClass";
/// Folder excluded from synchronization.
pub const IGNORED_FOLDER: &str = "IgnoredFolder";
/// Number of items in a folder.
pub const CONTENT_COUNT: &str = "ContentCount";

/// Store checked for support.
pub const STORE_TYPE_CHECKED: &str = "StoreTypeChecked";
/// Store is synchronized.
pub const STORE_SUPPORTED: &str = "StoreSupported";

/// Durable source id of an address book (contact folder entry id).
pub const ADDRESS_BOOK_SOURCE: &str = "AddressBookSource";

/// E-mail address of an account, lowercase.
pub const EMAIL_ADDRESS: &str = "EmailAddress";
/// Display name of a contact or account.
pub const DISPLAY_NAME: &str = "DisplayName";
/// Name prefix.
pub const TITLE: &str = "Title";
/// Given name.
pub const FIRST_NAME: &str = "FirstName";
/// Middle name.
pub const MIDDLE_NAME: &str = "MiddleName";
/// Surname.
pub const LAST_NAME: &str = "LastName";
/// Name suffix.
pub const SUFFIX: &str = "Suffix";
/// Company.
pub const COMPANY: &str = "Company";
/// Job title.
pub const JOB_TITLE: &str = "JobTitle";
/// Birthday.
pub const BIRTHDAY: &str = "Birthday";
/// Home page.
pub const HOME_PAGE: &str = "HomePage";
/// Postal address.
pub const ADDRESS: &str = "Address";
/// Prefix of phone properties, followed by the phone name.
pub const PHONE_PREFIX: &str = "Phone:";

/// Task start date.
pub const START_DATE: &str = "StartDate";
/// Task due date.
pub const DUE_DATE: &str = "DueDate";
/// Task completion date.
pub const COMPLETED_DATE: &str = "CompletedDate";
/// Task reminder.
pub const REMIND_DATE: &str = "RemindDate";
/// Task status.
pub const STATUS: &str = "Status";
/// Task completion percentage.
pub const PERCENT_COMPLETE: &str = "PercentComplete";

/// Attachment ordinal within its e-mail.
pub const ATTACHMENT_INDEX: &str = "AttachmentIndex";
/// Attachment size in bytes.
pub const SIZE: &str = "Size";
/// Attachment content type.
pub const CONTENT_TYPE: &str = "ContentType";
