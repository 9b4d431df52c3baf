//! Registry and directory entity types.
//!
//! All entities are built fresh at the start of a run from live reads and
//! are never mutated afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A mailing list as configured in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingList {
    /// Registry list key.
    pub id: String,
    /// Display title.
    pub title: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Alias addresses, in registry order, deduplicated.
    pub aliases: Vec<String>,
    /// Lower-cased member addresses.
    pub members: BTreeSet<String>,
}

impl MailingList {
    /// Creates an empty list with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            aliases: Vec::new(),
            members: BTreeSet::new(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends an alias unless already present.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    /// Adds a member address.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.insert(member.into());
        self
    }
}

/// A directory group, either desired (built from the registry) or observed.
///
/// `address` is the unique key within a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryGroup {
    /// Primary address.
    pub address: String,
    /// Alias addresses.
    pub aliases: BTreeSet<String>,
    /// Member addresses.
    pub members: BTreeSet<String>,
    /// Display name.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
}

impl DirectoryGroup {
    /// Creates a group with no aliases, members, title or description.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            aliases: BTreeSet::new(),
            members: BTreeSet::new(),
            title: None,
            description: None,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    /// Adds a member.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.insert(member.into());
        self
    }

    /// Adds several members.
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }
}

/// A user account in the directory. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Primary address.
    pub primary_email: String,
    /// Alternate address.
    pub alternate_email: Option<String>,
    /// Guardian address.
    pub email_mum: Option<String>,
    /// Guardian address.
    pub email_dad: Option<String>,
    /// Registry unit.
    pub unit: Option<String>,
    /// Mobile number.
    pub mobile: Option<String>,
}

impl DirectoryUser {
    /// Creates a user with the required fields.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        primary_email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            primary_email: primary_email.into(),
            alternate_email: None,
            email_mum: None,
            email_dad: None,
            unit: None,
            mobile: None,
        }
    }
}

/// A member record from the registry.
///
/// `member_no` is the stable identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryUser {
    /// Member number.
    pub member_no: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Primary contact address.
    pub email_primary: Option<String>,
    /// Alternate contact address.
    pub email_alternate: Option<String>,
    /// Guardian contact address.
    pub email_mum: Option<String>,
    /// Guardian contact address.
    pub email_dad: Option<String>,
    /// Unit (patrol/section) name.
    pub unit: Option<String>,
    /// Mobile number.
    pub mobile: Option<String>,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Role in the group.
    pub role: Option<String>,
}

impl RegistryUser {
    /// Creates a user with the required fields.
    pub fn new(
        member_no: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            member_no: member_no.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email_primary: None,
            email_alternate: None,
            email_mum: None,
            email_dad: None,
            unit: None,
            mobile: None,
            date_of_birth: None,
            role: None,
        }
    }

    /// Sets the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the date of birth.
    pub fn with_date_of_birth(mut self, date: NaiveDate) -> Self {
        self.date_of_birth = Some(date);
        self
    }

    /// Sets the primary address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email_primary = Some(email.into());
        self
    }
}
