//! In-memory directory.
//!
//! Behaves like the remote directory closely enough to test the engine
//! against: token pagination with a server-side page cap, 404 for unknown
//! groups, configurable creation lag, and per-call failure injection. Every
//! call is recorded.

use crate::directory::{DirectoryApi, GroupRecord, Lookup};
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use scoutsync_core::address::normalize;
use scoutsync_core::{DirectoryGroup, DirectoryUser, HttpError, Page};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One call made against a [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirectoryCall {
    /// `groups.list`.
    ListGroups {
        /// Page token sent.
        page_token: Option<String>,
    },
    /// `groups.get`.
    GetGroup(String),
    /// `groups.insert`.
    InsertGroup(String),
    /// `groups.update`.
    UpdateGroup(String),
    /// `groups.delete`.
    DeleteGroup(String),
    /// `groups.aliases.list`.
    ListAliases(String),
    /// `groups.aliases.insert`.
    InsertAlias {
        /// Group address.
        group: String,
        /// Alias address.
        alias: String,
    },
    /// `groups.aliases.delete`.
    DeleteAlias {
        /// Group address.
        group: String,
        /// Alias address.
        alias: String,
    },
    /// `members.list`.
    ListMembers {
        /// Group address.
        group: String,
        /// Page token sent.
        page_token: Option<String>,
    },
    /// `members.insert`.
    InsertMember {
        /// Group address.
        group: String,
        /// Member address.
        member: String,
    },
    /// `members.delete`.
    DeleteMember {
        /// Group address.
        group: String,
        /// Member address.
        member: String,
    },
    /// `users.list`.
    ListUsers {
        /// Page token sent.
        page_token: Option<String>,
    },
}

impl DirectoryCall {
    /// Returns true for calls that change directory state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DirectoryCall::InsertGroup(_)
                | DirectoryCall::UpdateGroup(_)
                | DirectoryCall::DeleteGroup(_)
                | DirectoryCall::InsertAlias { .. }
                | DirectoryCall::DeleteAlias { .. }
                | DirectoryCall::InsertMember { .. }
                | DirectoryCall::DeleteMember { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct StoredGroup {
    record: GroupRecord,
    aliases: BTreeSet<String>,
    members: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, StoredGroup>,
    users: Vec<DirectoryUser>,
    /// Remaining `get_group` calls for which a new group stays invisible.
    invisible: BTreeMap<String, u32>,
}

/// An in-memory directory for tests and offline runs.
#[derive(Debug)]
pub struct MemoryDirectory {
    state: Mutex<State>,
    calls: Mutex<Vec<DirectoryCall>>,
    failing: Mutex<HashSet<DirectoryCall>>,
    page_cap: Mutex<usize>,
    creation_lag: Mutex<u32>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            page_cap: Mutex::new(usize::MAX),
            creation_lag: Mutex::new(0),
        }
    }

    /// Seeds a group (not recorded as a call).
    pub fn with_group(self, group: &DirectoryGroup) -> Self {
        self.seed_group(group);
        self
    }

    /// Seeds a group (not recorded as a call).
    pub fn seed_group(&self, group: &DirectoryGroup) {
        let key = normalize(&group.address);
        let aliases = group
            .aliases
            .iter()
            .map(|a| normalize(a))
            .filter(|a| *a != key)
            .collect();
        self.state.lock().groups.insert(
            key.clone(),
            StoredGroup {
                record: GroupRecord::new(key, group.title.clone(), group.description.clone()),
                aliases,
                members: group.members.iter().map(|m| normalize(m)).collect(),
            },
        );
    }

    /// Seeds a user.
    pub fn seed_user(&self, user: DirectoryUser) {
        self.state.lock().users.push(user);
    }

    /// Caps every listing page at `size` items regardless of the requested
    /// maximum.
    pub fn set_page_cap(&self, size: usize) {
        *self.page_cap.lock() = size.max(1);
    }

    /// Newly inserted groups stay invisible to the next `gets` lookups.
    pub fn set_creation_lag(&self, gets: u32) {
        *self.creation_lag.lock() = gets;
    }

    /// Makes every call equal to `call` fail.
    pub fn fail_on(&self, call: DirectoryCall) {
        self.failing.lock().insert(call);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().clone()
    }

    /// The mutating calls made so far, in order.
    pub fn mutations(&self) -> Vec<DirectoryCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Addresses of every stored group.
    pub fn group_addresses(&self) -> BTreeSet<String> {
        self.state.lock().groups.keys().cloned().collect()
    }

    /// Snapshot of a stored group.
    pub fn group(&self, address: &str) -> Option<DirectoryGroup> {
        let state = self.state.lock();
        state.groups.get(&normalize(address)).map(|stored| DirectoryGroup {
            address: stored.record.address.clone(),
            aliases: stored.aliases.clone(),
            members: stored.members.clone(),
            title: stored.record.name.clone(),
            description: stored.record.description.clone(),
        })
    }

    fn record(
        &self,
        call: DirectoryCall,
        operation: &'static str,
        target: &str,
    ) -> EngineResult<()> {
        let failing = self.failing.lock().contains(&call);
        self.calls.lock().push(call);
        if failing {
            Err(EngineError::rejected(operation, target, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn paginate<T: Clone>(
        &self,
        items: &[T],
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<T>> {
        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| EngineError::Protocol(format!("bad page token {token:?}")))?,
            None => 0,
        };
        let size = (max_results.max(1) as usize).min(*self.page_cap.lock());
        let end = start.saturating_add(size).min(items.len());
        let page = items.get(start..end).unwrap_or_default().to_vec();
        let next = (end < items.len()).then(|| end.to_string());
        Ok(Page::new(page, next))
    }

    fn missing(operation: &'static str, target: &str) -> EngineError {
        EngineError::request(
            operation,
            target,
            HttpError::status(404, "Resource Not Found: groupKey"),
        )
    }
}

impl DirectoryApi for MemoryDirectory {
    fn list_groups(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<GroupRecord>> {
        self.record(
            DirectoryCall::ListGroups {
                page_token: page_token.map(str::to_string),
            },
            "groups.list",
            "domain",
        )?;
        let records: Vec<GroupRecord> = {
            let state = self.state.lock();
            state
                .groups
                .iter()
                .filter(|(key, _)| !state.invisible.contains_key(*key))
                .map(|(_, g)| g.record.clone())
                .collect()
        };
        self.paginate(&records, page_token, max_results)
    }

    fn get_group(&self, address: &str) -> EngineResult<Lookup<GroupRecord>> {
        self.record(DirectoryCall::GetGroup(address.to_string()), "groups.get", address)?;
        let key = normalize(address);
        let mut state = self.state.lock();
        if let Some(remaining) = state.invisible.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Lookup::NotFound);
            }
            state.invisible.remove(&key);
        }
        Ok(match state.groups.get(&key) {
            Some(stored) => Lookup::Found(stored.record.clone()),
            None => Lookup::NotFound,
        })
    }

    fn insert_group(&self, group: &GroupRecord) -> EngineResult<()> {
        self.record(
            DirectoryCall::InsertGroup(group.address.clone()),
            "groups.insert",
            &group.address,
        )?;
        let key = normalize(&group.address);
        let lag = *self.creation_lag.lock();
        let mut state = self.state.lock();
        if state.groups.contains_key(&key) {
            return Err(EngineError::request(
                "groups.insert",
                &group.address,
                HttpError::status(409, "Entity already exists."),
            ));
        }
        state.groups.insert(
            key.clone(),
            StoredGroup {
                record: GroupRecord::new(
                    key.clone(),
                    group.name.clone(),
                    group.description.clone(),
                ),
                aliases: BTreeSet::new(),
                members: BTreeSet::new(),
            },
        );
        if lag > 0 {
            state.invisible.insert(key, lag);
        }
        Ok(())
    }

    fn update_group(&self, group: &GroupRecord) -> EngineResult<()> {
        self.record(
            DirectoryCall::UpdateGroup(group.address.clone()),
            "groups.update",
            &group.address,
        )?;
        let mut state = self.state.lock();
        let stored = state
            .groups
            .get_mut(&normalize(&group.address))
            .ok_or_else(|| Self::missing("groups.update", &group.address))?;
        stored.record.name = group.name.clone();
        stored.record.description = group.description.clone();
        Ok(())
    }

    fn delete_group(&self, address: &str) -> EngineResult<()> {
        self.record(DirectoryCall::DeleteGroup(address.to_string()), "groups.delete", address)?;
        self.state
            .lock()
            .groups
            .remove(&normalize(address))
            .map(|_| ())
            .ok_or_else(|| Self::missing("groups.delete", address))
    }

    fn list_aliases(&self, group: &str) -> EngineResult<Vec<String>> {
        self.record(DirectoryCall::ListAliases(group.to_string()), "groups.aliases.list", group)?;
        let state = self.state.lock();
        state
            .groups
            .get(&normalize(group))
            .map(|stored| stored.aliases.iter().cloned().collect())
            .ok_or_else(|| Self::missing("groups.aliases.list", group))
    }

    fn insert_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        self.record(
            DirectoryCall::InsertAlias { group: group.to_string(), alias: alias.to_string() },
            "groups.aliases.insert",
            alias,
        )?;
        let mut state = self.state.lock();
        let stored = state
            .groups
            .get_mut(&normalize(group))
            .ok_or_else(|| Self::missing("groups.aliases.insert", group))?;
        stored.aliases.insert(normalize(alias));
        Ok(())
    }

    fn delete_alias(&self, group: &str, alias: &str) -> EngineResult<()> {
        self.record(
            DirectoryCall::DeleteAlias { group: group.to_string(), alias: alias.to_string() },
            "groups.aliases.delete",
            alias,
        )?;
        let mut state = self.state.lock();
        let stored = state
            .groups
            .get_mut(&normalize(group))
            .ok_or_else(|| Self::missing("groups.aliases.delete", group))?;
        stored.aliases.remove(&normalize(alias));
        Ok(())
    }

    fn list_members(
        &self,
        group: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<String>> {
        self.record(
            DirectoryCall::ListMembers {
                group: group.to_string(),
                page_token: page_token.map(str::to_string),
            },
            "members.list",
            group,
        )?;
        let members: Vec<String> = {
            let state = self.state.lock();
            state
                .groups
                .get(&normalize(group))
                .map(|stored| stored.members.iter().cloned().collect())
                .ok_or_else(|| Self::missing("members.list", group))?
        };
        self.paginate(&members, page_token, max_results)
    }

    fn insert_member(&self, group: &str, member: &str) -> EngineResult<()> {
        self.record(
            DirectoryCall::InsertMember { group: group.to_string(), member: member.to_string() },
            "members.insert",
            member,
        )?;
        let mut state = self.state.lock();
        let stored = state
            .groups
            .get_mut(&normalize(group))
            .ok_or_else(|| Self::missing("members.insert", group))?;
        if !stored.members.insert(normalize(member)) {
            return Err(EngineError::request(
                "members.insert",
                member,
                HttpError::status(409, "Member already exists."),
            ));
        }
        Ok(())
    }

    fn delete_member(&self, group: &str, member: &str) -> EngineResult<()> {
        self.record(
            DirectoryCall::DeleteMember { group: group.to_string(), member: member.to_string() },
            "members.delete",
            member,
        )?;
        let mut state = self.state.lock();
        let stored = state
            .groups
            .get_mut(&normalize(group))
            .ok_or_else(|| Self::missing("members.delete", group))?;
        if !stored.members.remove(&normalize(member)) {
            return Err(Self::missing("members.delete", member));
        }
        Ok(())
    }

    fn list_users(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> EngineResult<Page<DirectoryUser>> {
        self.record(
            DirectoryCall::ListUsers {
                page_token: page_token.map(str::to_string),
            },
            "users.list",
            "domain",
        )?;
        let users = self.state.lock().users.clone();
        self.paginate(&users, page_token, max_results)
    }
}
