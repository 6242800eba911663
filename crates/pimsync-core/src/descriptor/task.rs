//! Task descriptors, inbound and outbound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{categories, present};
use crate::external::{ExternalValue, PropTag, PropertyBag, named};
use crate::ids::{EntryId, EntryIdPair, RecordKey, ResourceId, StoreId};
use crate::resource::{Resource, props};

/// Message class of new tasks.
pub const TASK_CLASS: &str = "IPM.Task";

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    NotStarted,
    /// In progress.
    InProgress,
    /// Completed.
    Completed,
    /// Waiting on someone else.
    Waiting,
    /// Deferred.
    Deferred,
}

impl TaskStatus {
    /// Maps the external status value.
    #[must_use]
    pub const fn from_external(value: i64) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Completed,
            3 => Self::Waiting,
            4 => Self::Deferred,
            _ => Self::NotStarted,
        }
    }

    /// External status value.
    #[must_use]
    pub const fn to_external(self) -> i64 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
            Self::Waiting => 3,
            Self::Deferred => 4,
        }
    }

    /// Local property value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Waiting => "Waiting",
            Self::Deferred => "Deferred",
        }
    }

    /// Parses the local property value, `NotStarted` when unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        [
            Self::InProgress,
            Self::Completed,
            Self::Waiting,
            Self::Deferred,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .unwrap_or_default()
    }
}

/// Snapshot of one external task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Durable pair of the task item.
    pub item: EntryIdPair,
    /// Containing folder.
    pub folder: EntryIdPair,
    /// Record key, if the store reports one.
    pub record_key: Option<RecordKey>,
    /// Subject.
    pub subject: String,
    /// Notes.
    pub body: String,
    /// Start date, `MIN_UTC` when absent.
    pub start: DateTime<Utc>,
    /// Due date, `MIN_UTC` when absent.
    pub due: DateTime<Utc>,
    /// Completion date, `MIN_UTC` when absent.
    pub completed: DateTime<Utc>,
    /// Reminder, `MIN_UTC` when no reminder is set.
    pub remind: DateTime<Utc>,
    /// Status.
    pub status: TaskStatus,
    /// Priority (-1, 0, 1).
    pub priority: i64,
    /// Percent complete, 0 to 100.
    pub percent_complete: i64,
    /// Backslash-joined category paths.
    pub categories: Vec<String>,
    /// Last modification time, `MIN_UTC` when absent.
    pub modified: DateTime<Utc>,
}

impl TaskDescriptor {
    /// Builds a descriptor from an opened task.
    #[must_use]
    pub fn snapshot(item: &EntryIdPair, bag: &PropertyBag) -> Self {
        let remind = if bag.boolean(&PropTag::ReminderSet) {
            bag.date(&named::REMINDER_TIME)
        } else {
            DateTime::<Utc>::MIN_UTC
        };
        Self {
            item: item.clone(),
            folder: item.sibling(EntryId::new(bag.string(&PropTag::ParentEntryId))),
            record_key: bag.opt_string(&PropTag::RecordKey).map(RecordKey::new),
            subject: bag.string(&PropTag::Subject),
            body: bag.string(&PropTag::Body),
            start: bag.date(&named::TASK_START_DATE),
            due: bag.date(&named::TASK_DUE_DATE),
            completed: bag.date(&named::TASK_DATE_COMPLETED),
            remind,
            status: TaskStatus::from_external(bag.int(&named::TASK_STATUS)),
            priority: (bag.int(&PropTag::Importance) - 1).clamp(-1, 1),
            percent_complete: bag.int(&named::TASK_PERCENT_COMPLETE).clamp(0, 100),
            categories: categories(bag),
            modified: bag.date(&PropTag::LastModificationTime),
        }
    }

    /// Entry id of the task item.
    #[must_use]
    pub const fn entry_id(&self) -> &EntryId {
        &self.item.entry_id
    }
}

/// Snapshot of a local task to be written to the external store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExportDescriptor {
    /// Local task.
    pub task: ResourceId,
    /// External item, `None` if the task was never exported.
    pub target: Option<EntryIdPair>,
    /// Subject.
    pub subject: String,
    /// Notes.
    pub body: String,
    /// Start date.
    pub start: Option<DateTime<Utc>>,
    /// Due date.
    pub due: Option<DateTime<Utc>>,
    /// Completion date.
    pub completed: Option<DateTime<Utc>>,
    /// Reminder.
    pub remind: Option<DateTime<Utc>>,
    /// Status.
    pub status: TaskStatus,
    /// Priority (-1, 0, 1).
    pub priority: i64,
    /// Percent complete, 0 to 100.
    pub percent_complete: i64,
    /// Category paths.
    pub categories: Vec<String>,
}

impl TaskExportDescriptor {
    /// Snapshots a local task.
    #[must_use]
    pub fn from_resource(task: &Resource, categories: Vec<String>) -> Self {
        let target = match (task.entry_id(), task.str_prop(props::STORE_ID)) {
            (Some(entry), Some(store)) if !entry.is_empty() => {
                Some(EntryIdPair::new(entry, StoreId::new(store)))
            }
            _ => None,
        };
        let int = |name: &str| task.prop(name).and_then(|v| v.as_int()).unwrap_or(0);
        Self {
            task: task.id,
            target,
            subject: task.str_prop(props::SUBJECT).unwrap_or_default().to_string(),
            body: task.str_prop(props::BODY).unwrap_or_default().to_string(),
            start: task.date_prop(props::START_DATE),
            due: task.date_prop(props::DUE_DATE),
            completed: task.date_prop(props::COMPLETED_DATE),
            remind: task.date_prop(props::REMIND_DATE),
            status: TaskStatus::parse(task.str_prop(props::STATUS).unwrap_or_default()),
            priority: int(props::PRIORITY).clamp(-1, 1),
            percent_complete: int(props::PERCENT_COMPLETE).clamp(0, 100),
            categories,
        }
    }

    /// Property changes to write to the external item.
    #[must_use]
    pub fn changes(&self) -> Vec<(PropTag, ExternalValue)> {
        let mut changes = vec![
            (PropTag::Subject, ExternalValue::Str(self.subject.clone())),
            (PropTag::Body, ExternalValue::Str(self.body.clone())),
            (
                named::TASK_STATUS,
                ExternalValue::Int(self.status.to_external()),
            ),
            (
                named::TASK_PERCENT_COMPLETE,
                ExternalValue::Int(self.percent_complete),
            ),
            (PropTag::Importance, ExternalValue::Int(self.priority + 1)),
            (
                PropTag::Categories,
                ExternalValue::StrList(self.categories.clone()),
            ),
            (
                PropTag::ReminderSet,
                ExternalValue::Bool(self.remind.is_some()),
            ),
        ];
        let dates = [
            (named::TASK_START_DATE, self.start),
            (named::TASK_DUE_DATE, self.due),
            (named::TASK_DATE_COMPLETED, self.completed),
            (named::REMINDER_TIME, self.remind),
        ];
        for (tag, date) in dates {
            if let Some(date) = date.and_then(present) {
                changes.push((tag, ExternalValue::Date(date)));
            }
        }
        changes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;
    use crate::resource::{PropValue, ResourceType};

    #[test]
    fn test_snapshot_reads_task_fields() {
        let due = Utc.with_ymd_and_hms(2025, 1, 31, 17, 0, 0).unwrap();
        let pair = EntryIdPair::new(EntryId::new("T1"), StoreId::new("S"));
        let bag = PropertyBag::new(EntryId::new("T1"))
            .with(PropTag::Subject, ExternalValue::Str("File taxes".into()))
            .with(named::TASK_DUE_DATE, ExternalValue::Date(due))
            .with(named::TASK_STATUS, ExternalValue::Int(1))
            .with(named::TASK_PERCENT_COMPLETE, ExternalValue::Int(150))
            .with(named::REMINDER_TIME, ExternalValue::Date(due));

        let d = TaskDescriptor::snapshot(&pair, &bag);

        assert_eq!(d.due, due);
        assert_eq!(d.status, TaskStatus::InProgress);
        assert_eq!(d.percent_complete, 100);
        // Reminder time without the reminder flag is ignored
        assert_eq!(d.remind, DateTime::<Utc>::MIN_UTC);
        assert_eq!(d.priority, -1);
    }

    #[test]
    fn test_status_roundtrip() {
        for value in 0..5 {
            let status = TaskStatus::from_external(value);
            assert_eq!(status.to_external(), value);
            assert_eq!(TaskStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_export_descriptor_from_local_task() {
        let due = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        let mut resource_props = BTreeMap::new();
        resource_props.insert(props::SUBJECT.to_string(), PropValue::from("Call"));
        resource_props.insert(props::DUE_DATE.to_string(), PropValue::from(due));
        resource_props.insert(props::STATUS.to_string(), PropValue::from("Completed"));
        let task = Resource {
            id: ResourceId(4),
            resource_type: ResourceType::Task,
            props: resource_props,
        };

        let export = TaskExportDescriptor::from_resource(&task, vec!["Work".into()]);

        assert!(export.target.is_none());
        let changes = export.changes();
        assert!(changes.contains(&(named::TASK_DUE_DATE, ExternalValue::Date(due))));
        assert!(changes.contains(&(named::TASK_STATUS, ExternalValue::Int(2))));
        assert!(changes.contains(&(PropTag::ReminderSet, ExternalValue::Bool(false))));
        assert!(!changes.iter().any(|(tag, _)| *tag == named::TASK_START_DATE));
    }
}
