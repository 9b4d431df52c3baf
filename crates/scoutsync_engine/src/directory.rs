//! Directory abstraction and paginated readers.

use crate::error::{EngineError, EngineResult};
use regex::Regex;
use scoutsync_core::address::normalize;
use scoutsync_core::{collect_pages, CoreError, DirectoryGroup, DirectoryUser, Page};
use std::collections::BTreeSet;
use tracing::debug;

/// The group fields the directory stores directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Primary address.
    pub address: String,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
}

impl GroupRecord {
    /// Creates a record.
    pub fn new(
        address: impl Into<String>,
        name: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            address: address.into(),
            name,
            description,
        }
    }

    /// The record a desired group should have.
    pub fn from_group(group: &DirectoryGroup) -> Self {
        Self::new(
            group.address.clone(),
            group.title.clone(),
            group.description.clone(),
        )
    }

    /// Returns true if name and description agree with `group`.
    ///
    /// An empty string and an absent value are treated as equal.
    pub fn matches(&self, group: &DirectoryGroup) -> bool {
        same_text(self.name.as_deref(), group.title.as_deref())
            && same_text(self.description.as_deref(), group.description.as_deref())
    }
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or_default() == b.unwrap_or_default()
}

/// Result of looking a group up by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The group exists.
    Found(T),
    /// The directory has no such group.
    NotFound,
}

impl<T> Lookup<T> {
    /// Returns true for `Found`.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// The remote directory.
///
/// Every method is one blocking remote call. Listing methods return a single
/// page; use [`DirectoryReader`] to walk all pages.
pub trait DirectoryApi {
    /// Lists one page of groups in the domain.
    fn list_groups(&self, page_token: Option<&str>, max_results: u32)
        -> EngineResult<Page<GroupRecord>>;

    /// Looks a group up by address.
    fn get_group(&self, address: &str) -> EngineResult<Lookup<GroupRecord>>;

    /// Creates a group.
    fn insert_group(&self, group: &GroupRecord) -> EngineResult<()>;

    /// Replaces a group's name and description.
    fn update_group(&self, group: &GroupRecord) -> EngineResult<()>;

    /// Deletes a group.
    fn delete_group(&self, address: &str) -> EngineResult<()>;

    /// Lists a group's aliases.
    fn list_aliases(&self, group: &str) -> EngineResult<Vec<String>>;

    /// Adds an alias to a group.
    fn insert_alias(&self, group: &str, alias: &str) -> EngineResult<()>;

    /// Removes an alias from a group.
    fn delete_alias(&self, group: &str, alias: &str) -> EngineResult<()>;

    /// Lists one page of a group's member addresses.
    fn list_members(
        &self,
        group: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<String>>;

    /// Adds a member to a group.
    fn insert_member(&self, group: &str, member: &str) -> EngineResult<()>;

    /// Removes a member from a group.
    fn delete_member(&self, group: &str, member: &str) -> EngineResult<()>;

    /// Lists one page of users in the domain.
    fn list_users(&self, page_token: Option<&str>, max_results: u32)
        -> EngineResult<Page<DirectoryUser>>;
}

impl<D: DirectoryApi + ?Sized> DirectoryApi for &D {
    fn list_groups(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<GroupRecord>> {
        (**self).list_groups(page_token, max_results)
    }
    fn get_group(&self, address: &str) -> EngineResult<Lookup<GroupRecord>> {
        (**self).get_group(address)
    }
    fn insert_group(&self, group: &GroupRecord) -> EngineResult<()> {
        (**self).insert_group(group)
    }
    fn update_group(&self, group: &GroupRecord) -> EngineResult<()> {
        (**self).update_group(group)
    }
    fn delete_group(&self, address: &str) -> EngineResult<()> {
        (**self).delete_group(address)
    }
    fn list_aliases(&self, group: &str) -> EngineResult<Vec<String>> {
        (**self).list_aliases(group)
    }
    fn insert_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        (**self).insert_alias(group, alias)
    }
    fn delete_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        (**self).delete_alias(group, alias)
    }
    fn list_members(
        &self,
        group: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<String>> {
        (**self).list_members(group, page_token, max_results)
    }
    fn insert_member(&self, group: &str, member: &str) -> EngineResult<()> {
        (**self).insert_member(group, member)
    }
    fn delete_member(&self, group: &str, member: &str) -> EngineResult<()> {
        (**self).delete_member(group, member)
    }
    fn list_users(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<DirectoryUser>> {
        (**self).list_users(page_token, max_results)
    }
}

/// Builds the regex that recognizes managed group names: the name must end
/// with `tag`.
pub fn managed_filter(tag: &str) -> EngineResult<Regex> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(CoreError::InvalidManagedTag(tag.to_string()).into());
    }
    Regex::new(&format!("{}$", regex::escape(tag)))
        .map_err(|e| EngineError::Config(format!("managed tag {tag:?}: {e}")))
}

/// Walks paginated directory listings.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryReader<'a, D: ?Sized> {
    api: &'a D,
    page_size: u32,
}

impl<'a, D: DirectoryApi + ?Sized> DirectoryReader<'a, D> {
    /// Creates a reader.
    pub fn new(api: &'a D, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// All groups whose name matches `filter` (every group when `None`).
    pub fn groups(&self, filter: Option<&Regex>) -> EngineResult<Vec<GroupRecord>> {
        let all = collect_pages(|token| self.api.list_groups(token, self.page_size))?;
        Ok(all
            .into_iter()
            .filter(|group| {
                let include = match filter {
                    Some(re) => group.name.as_deref().is_some_and(|name| re.is_match(name)),
                    None => true,
                };
                if include {
                    debug!(group = %group.address, "including group");
                } else {
                    debug!(group = %group.address, "excluding unmanaged group");
                }
                include
            })
            .collect())
    }

    /// Normalized addresses of every managed group.
    pub fn managed_addresses(&self, filter: &Regex) -> EngineResult<BTreeSet<String>> {
        Ok(self
            .groups(Some(filter))?
            .iter()
            .map(|group| normalize(&group.address))
            .collect())
    }

    /// A group's aliases, lower-cased.
    pub fn aliases(&self, group: &str) -> EngineResult<BTreeSet<String>> {
        Ok(self
            .api
            .list_aliases(group)?
            .iter()
            .map(|alias| normalize(alias))
            .collect())
    }

    /// A group's member addresses, lower-cased.
    pub fn members(&self, group: &str) -> EngineResult<BTreeSet<String>> {
        let members = collect_pages(|token| self.api.list_members(group, token, self.page_size))?;
        Ok(members.iter().map(|member| normalize(member)).collect())
    }

    /// Every user in the domain.
    pub fn users(&self) -> EngineResult<Vec<DirectoryUser>> {
        collect_pages(|token| self.api.list_users(token, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_matching_ignores_empty_vs_absent() {
        let group = DirectoryGroup::new("a@d.com").with_title("A (Scoutnet)");
        let record = GroupRecord::new(
            "a@d.com",
            Some("A (Scoutnet)".into()),
            Some(String::new()),
        );
        assert!(record.matches(&group));

        let record = GroupRecord::new("a@d.com", Some("A".into()), None);
        assert!(!record.matches(&group));

        let described = group.clone().with_description("about");
        assert!(!GroupRecord::from_group(&group).matches(&described));
        assert!(GroupRecord::from_group(&described).matches(&described));
    }

    #[test]
    fn managed_filter_requires_suffix() {
        let re = managed_filter("(Scoutnet)").unwrap();
        assert!(re.is_match("Leaders (Scoutnet)"));
        assert!(!re.is_match("Leaders (Scoutnet) old"));
        assert!(!re.is_match("Leaders"));
        assert!(managed_filter(" (Scoutnet) ").unwrap().is_match("Leaders (Scoutnet)"));
        assert!(matches!(
            managed_filter("   "),
            Err(EngineError::Core(CoreError::InvalidManagedTag(_)))
        ));
    }

    #[test]
    fn lookup_helpers() {
        assert!(Lookup::Found(1).is_found());
        assert!(!Lookup::<u8>::NotFound.is_found());
    }
}
