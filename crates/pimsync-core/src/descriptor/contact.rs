//! Contact descriptor.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{categories, collect_addresses};
use crate::external::{PropTag, PropertyBag, named};
use crate::ids::{EntryId, EntryIdPair, RecordKey};

/// Phone tags and the names they are stored under.
const PHONES: [(PropTag, &str); 4] = [
    (PropTag::BusinessTelephoneNumber, "Business"),
    (PropTag::HomeTelephoneNumber, "Home"),
    (PropTag::MobileTelephoneNumber, "Mobile"),
    (PropTag::BusinessFaxNumber, "BusinessFax"),
];

/// Snapshot of one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDescriptor {
    /// Durable pair of the contact item.
    pub item: EntryIdPair,
    /// Containing contact folder.
    pub folder: EntryIdPair,
    /// Record key, if the store reports one.
    pub record_key: Option<RecordKey>,
    /// Full display name.
    pub display_name: String,
    /// Name prefix.
    pub title: String,
    /// Given name.
    pub first_name: String,
    /// Middle name.
    pub middle_name: String,
    /// Surname.
    pub last_name: String,
    /// Name suffix.
    pub suffix: String,
    /// Company.
    pub company: String,
    /// Job title.
    pub job_title: String,
    /// Addresses, primary first.
    pub emails: Vec<String>,
    /// Phone numbers by name.
    pub phones: BTreeMap<String, String>,
    /// Birthday, `MIN_UTC` when absent.
    pub birthday: DateTime<Utc>,
    /// Home page.
    pub home_page: String,
    /// Postal address.
    pub address: String,
    /// Notes.
    pub notes: String,
    /// Backslash-joined category paths.
    pub categories: Vec<String>,
    /// Last modification time, `MIN_UTC` when absent.
    pub modified: DateTime<Utc>,
}

impl ContactDescriptor {
    /// Builds a descriptor from an opened contact.
    #[must_use]
    pub fn snapshot(item: &EntryIdPair, bag: &PropertyBag) -> Self {
        let phones = PHONES
            .iter()
            .filter_map(|(tag, name)| bag.opt_string(tag).map(|n| ((*name).to_string(), n)))
            .collect();

        Self {
            item: item.clone(),
            folder: item.sibling(EntryId::new(bag.string(&PropTag::ParentEntryId))),
            record_key: bag.opt_string(&PropTag::RecordKey).map(RecordKey::new),
            display_name: bag.string(&PropTag::DisplayName),
            title: bag.string(&PropTag::DisplayNamePrefix),
            first_name: bag.string(&PropTag::GivenName),
            middle_name: bag.string(&PropTag::MiddleName),
            last_name: bag.string(&PropTag::Surname),
            suffix: bag.string(&PropTag::Generation),
            company: bag.string(&PropTag::CompanyName),
            job_title: bag.string(&PropTag::Title),
            emails: collect_addresses(
                bag,
                &PropTag::ProxyAddresses,
                &[
                    &named::EMAIL1_ADDRESS,
                    &named::EMAIL2_ADDRESS,
                    &named::EMAIL3_ADDRESS,
                ],
            ),
            phones,
            birthday: bag.date(&PropTag::Birthday),
            home_page: bag.string(&PropTag::PersonalHomePage),
            address: bag.string(&PropTag::PostalAddress),
            notes: bag.string(&PropTag::Body),
            categories: categories(bag),
            modified: bag.date(&PropTag::LastModificationTime),
        }
    }

    /// Entry id of the contact item.
    #[must_use]
    pub const fn entry_id(&self) -> &EntryId {
        &self.item.entry_id
    }

    /// Display name, or a name assembled from its parts.
    #[must_use]
    pub fn full_name(&self) -> String {
        if !self.display_name.trim().is_empty() {
            return self.display_name.clone();
        }
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
