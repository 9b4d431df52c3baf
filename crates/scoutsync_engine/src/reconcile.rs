//! The reconciliation engine.
//!
//! A run is strictly ordered: first every stale managed group is deleted,
//! then each desired group has its name and description synced, followed by
//! its aliases and its members. Each step diffs the desired state against
//! state read fresh from the directory, so running twice is a no-op and an
//! interrupted run converges on the next one.

use crate::config::ReconcileConfig;
use crate::directory::{managed_filter, DirectoryApi, DirectoryReader, GroupRecord, Lookup};
use crate::error::EngineResult;
use regex::Regex;
use scoutsync_core::address::{member_key, normalize};
use scoutsync_core::DirectoryGroup;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::thread;
use tracing::{debug, error, info, info_span, warn};

/// A kind of directory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Delete a stale managed group.
    DeleteGroup,
    /// Create a missing group.
    CreateGroup,
    /// Update a group's name or description.
    UpdateGroup,
    /// Add an alias.
    AddAlias,
    /// Remove an alias.
    RemoveAlias,
    /// Add a member.
    AddMember,
    /// Remove a member.
    RemoveMember,
}

impl Operation {
    /// Short verb phrase used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DeleteGroup => "delete group",
            Operation::CreateGroup => "create group",
            Operation::UpdateGroup => "update group",
            Operation::AddAlias => "add alias",
            Operation::RemoveAlias => "remove alias",
            Operation::AddMember => "add member",
            Operation::RemoveMember => "remove member",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write that the directory refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    /// Group the write belonged to.
    pub group: String,
    /// What was attempted.
    pub operation: Operation,
    /// Alias, member or group address written.
    pub target: String,
    /// Error text.
    pub message: String,
}

/// Outcome of a reconciliation run.
///
/// In dry-run mode the counters describe what would have been written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Stale managed groups deleted.
    pub groups_deleted: usize,
    /// Groups created.
    pub groups_created: usize,
    /// Groups whose name or description was updated.
    pub groups_updated: usize,
    /// Groups created but not yet visible after every re-fetch.
    pub groups_unverified: usize,
    /// Aliases added.
    pub aliases_added: usize,
    /// Aliases removed.
    pub aliases_removed: usize,
    /// Members added.
    pub members_added: usize,
    /// Members removed.
    pub members_removed: usize,
    /// Writes that failed.
    pub failures: Vec<FailedOperation>,
}

impl ReconcileReport {
    /// Total successful (or planned) writes.
    pub fn mutations(&self) -> usize {
        self.groups_deleted
            + self.groups_created
            + self.groups_updated
            + self.aliases_added
            + self.aliases_removed
            + self.members_added
            + self.members_removed
    }

    /// Returns true if no write failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn count(&mut self, operation: Operation) {
        match operation {
            Operation::DeleteGroup => self.groups_deleted += 1,
            Operation::CreateGroup => self.groups_created += 1,
            Operation::UpdateGroup => self.groups_updated += 1,
            Operation::AddAlias => self.aliases_added += 1,
            Operation::RemoveAlias => self.aliases_removed += 1,
            Operation::AddMember => self.members_added += 1,
            Operation::RemoveMember => self.members_removed += 1,
        }
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            f.write_str("dry run: ")?;
        }
        write!(
            f,
            "groups -{} +{} ~{} ({} unverified), aliases +{} -{}, members +{} -{}, {} failed",
            self.groups_deleted,
            self.groups_created,
            self.groups_updated,
            self.groups_unverified,
            self.aliases_added,
            self.aliases_removed,
            self.members_added,
            self.members_removed,
            self.failures.len()
        )
    }
}

/// Where a desired group stands after its info sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    /// Already existed.
    Present,
    /// Created and visible.
    Created,
    /// Absent, creation suppressed by dry-run.
    Planned,
    /// Created but still invisible.
    Unverified,
    /// Creation failed.
    Failed,
}

impl GroupState {
    fn can_sync_contents(self) -> bool {
        matches!(self, GroupState::Present | GroupState::Created | GroupState::Planned)
    }
}

/// Reconciles a directory against a desired group set.
#[derive(Debug)]
pub struct Reconciler<D> {
    config: ReconcileConfig,
    directory: D,
    filter: Regex,
}

impl<D: DirectoryApi> Reconciler<D> {
    /// Creates a reconciler. Fails if the managed tag is empty.
    pub fn new(config: ReconcileConfig, directory: D) -> EngineResult<Self> {
        let filter = managed_filter(&config.managed_tag)?;
        Ok(Self {
            config,
            directory,
            filter,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// The directory being reconciled.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn reader(&self) -> DirectoryReader<'_, D> {
        DirectoryReader::new(&self.directory, self.config.page_size)
    }

    /// Brings the directory in line with `desired`.
    ///
    /// Read failures abort the run and are returned. Write failures are
    /// logged, recorded in the report and do not stop the run.
    pub fn reconcile(&self, desired: &[DirectoryGroup]) -> EngineResult<ReconcileReport> {
        let span = info_span!("reconcile", dry_run = self.config.dry_run);
        let _guard = span.enter();

        let desired = dedupe(desired);
        let mut report = ReconcileReport {
            dry_run: self.config.dry_run,
            ..ReconcileReport::default()
        };

        self.delete_stale(&desired, &mut report)?;
        for group in &desired {
            let state = self.sync_info(group, &mut report)?;
            if !state.can_sync_contents() {
                debug!(group = %group.address, ?state, "skipping aliases and members");
                continue;
            }
            self.sync_aliases(group, state, &mut report)?;
            self.sync_members(group, state, &mut report)?;
        }

        info!(%report, "reconcile finished");
        Ok(report)
    }

    fn delete_stale(
        &self,
        desired: &[DirectoryGroup],
        report: &mut ReconcileReport,
    ) -> EngineResult<()> {
        let wanted: BTreeSet<String> = desired.iter().map(|g| normalize(&g.address)).collect();
        let managed = self.reader().managed_addresses(&self.filter)?;

        for address in managed.difference(&wanted) {
            self.write(report, address, Operation::DeleteGroup, address, || {
                self.directory.delete_group(address)
            });
        }
        Ok(())
    }

    fn sync_info(
        &self,
        group: &DirectoryGroup,
        report: &mut ReconcileReport,
    ) -> EngineResult<GroupState> {
        let address = group.address.as_str();
        let record = GroupRecord::from_group(group);

        match self.directory.get_group(address)? {
            Lookup::Found(current) if current.matches(group) => {
                debug!(group = address, "group info up to date");
                Ok(GroupState::Present)
            }
            Lookup::Found(current) => {
                debug!(
                    group = address,
                    current_name = ?current.name,
                    desired_name = ?record.name,
                    "group info differs"
                );
                self.write(report, address, Operation::UpdateGroup, address, || {
                    self.directory.update_group(&record)
                });
                Ok(GroupState::Present)
            }
            Lookup::NotFound => {
                let created = self.write(report, address, Operation::CreateGroup, address, || {
                    self.directory.insert_group(&record)
                });
                if !created {
                    return Ok(GroupState::Failed);
                }
                if self.config.dry_run {
                    return Ok(GroupState::Planned);
                }
                self.await_creation(address, report)
            }
        }
    }

    /// Re-fetches a new group until it is visible or the retry budget is spent.
    fn await_creation(
        &self,
        address: &str,
        report: &mut ReconcileReport,
    ) -> EngineResult<GroupState> {
        if self.directory.get_group(address)?.is_found() {
            return Ok(GroupState::Created);
        }

        let retry = &self.config.creation_retry;
        for attempt in 1..=retry.attempts {
            info!(group = address, attempt, delay = ?retry.delay, "group not visible yet, waiting");
            thread::sleep(retry.delay);
            if self.directory.get_group(address)?.is_found() {
                return Ok(GroupState::Created);
            }
        }

        warn!(group = address, "group created but could not be verified");
        report.groups_unverified += 1;
        Ok(GroupState::Unverified)
    }

    fn sync_aliases(
        &self,
        group: &DirectoryGroup,
        state: GroupState,
        report: &mut ReconcileReport,
    ) -> EngineResult<()> {
        let address = group.address.as_str();
        let primary = normalize(address);
        let desired: BTreeSet<String> = group
            .aliases
            .iter()
            .map(|alias| normalize(alias))
            .filter(|alias| *alias != primary)
            .collect();
        let mut current = match state {
            GroupState::Planned => BTreeSet::new(),
            _ => self.reader().aliases(address)?,
        };
        current.remove(&primary);

        for alias in desired.difference(&current) {
            self.write(report, address, Operation::AddAlias, alias, || {
                self.directory.insert_alias(address, alias)
            });
        }
        for alias in current.difference(&desired) {
            self.write(report, address, Operation::RemoveAlias, alias, || {
                self.directory.delete_alias(address, alias)
            });
        }
        Ok(())
    }

    fn sync_members(
        &self,
        group: &DirectoryGroup,
        state: GroupState,
        report: &mut ReconcileReport,
    ) -> EngineResult<()> {
        let address = group.address.as_str();
        let desired: BTreeSet<String> = group.members.iter().map(|m| member_key(m)).collect();
        let current = match state {
            GroupState::Planned => BTreeSet::new(),
            _ => self.reader().members(address)?,
        };

        for member in desired.difference(&current) {
            self.write(report, address, Operation::AddMember, member, || {
                self.directory.insert_member(address, member)
            });
        }
        for member in current.difference(&desired) {
            self.write(report, address, Operation::RemoveMember, member, || {
                self.directory.delete_member(address, member)
            });
        }
        Ok(())
    }

    /// Performs one write, or logs it in dry-run mode. Returns false if the
    /// write failed.
    fn write<F>(
        &self,
        report: &mut ReconcileReport,
        group: &str,
        operation: Operation,
        target: &str,
        apply: F,
    ) -> bool
    where
        F: FnOnce() -> EngineResult<()>,
    {
        if self.config.dry_run {
            info!(dry_run = true, group, item = target, "would {operation}");
            report.count(operation);
            return true;
        }

        match apply() {
            Ok(()) => {
                info!(group, item = target, "{operation}");
                report.count(operation);
                true
            }
            Err(e) => {
                error!(group, item = target, error = %e, "failed to {operation}");
                report.failures.push(FailedOperation {
                    group: group.to_string(),
                    operation,
                    target: target.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// Drops later groups that reuse an address already seen.
fn dedupe(groups: &[DirectoryGroup]) -> Vec<DirectoryGroup> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .filter(|group| {
            let fresh = seen.insert(normalize(&group.address));
            if !fresh {
                warn!(group = %group.address, "duplicate desired group ignored");
            }
            fresh
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreationRetry;
    use crate::memory::{DirectoryCall, MemoryDirectory};
    use std::time::Duration;

    fn managed(address: &str) -> DirectoryGroup {
        DirectoryGroup::new(address)
            .with_title(format!("{} (Scoutnet)", address))
            .with_alias(address)
    }

    fn quick() -> ReconcileConfig {
        ReconcileConfig::new().with_creation_retry(CreationRetry::new(1, Duration::ZERO))
    }

    #[test]
    fn deletes_only_stale_managed_groups() {
        let directory = MemoryDirectory::new()
            .with_group(&managed("old@d.com"))
            .with_group(&DirectoryGroup::new("manual@d.com").with_title("Manual"));
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[]).unwrap();

        assert_eq!(report.groups_deleted, 1);
        assert_eq!(
            directory.group_addresses(),
            BTreeSet::from(["manual@d.com".to_string()])
        );
    }

    #[test]
    fn updates_mismatched_info() {
        let directory = MemoryDirectory::new().with_group(&managed("a@d.com"));
        let desired = managed("a@d.com").with_description("Leaders");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[desired]).unwrap();

        assert_eq!(report.groups_updated, 1);
        assert_eq!(
            directory.group("a@d.com").unwrap().description.as_deref(),
            Some("Leaders")
        );
    }

    #[test]
    fn primary_address_is_not_an_alias() {
        let directory = MemoryDirectory::new().with_group(&managed("a@d.com"));
        let desired = managed("a@d.com").with_alias("extra@d.com");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[desired]).unwrap();

        assert_eq!(report.aliases_added, 1);
        assert_eq!(
            directory.mutations(),
            vec![DirectoryCall::InsertAlias {
                group: "a@d.com".into(),
                alias: "extra@d.com".into(),
            }]
        );
    }

    #[test]
    fn stray_aliases_are_removed() {
        let directory =
            MemoryDirectory::new().with_group(&managed("a@d.com").with_alias("stray@d.com"));
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[managed("a@d.com")]).unwrap();

        assert_eq!(report.aliases_removed, 1);
        assert!(directory.group("a@d.com").unwrap().aliases.is_empty());
    }

    #[test]
    fn members_are_compared_without_tags() {
        let directory =
            MemoryDirectory::new().with_group(&managed("a@d.com").with_member("kim@x.com"));
        let desired = managed("a@d.com").with_member("Kim+scouts@X.com");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[desired]).unwrap();

        assert_eq!(report.mutations(), 0);
        assert!(directory.mutations().is_empty());
    }

    #[test]
    fn failed_create_skips_contents() {
        let directory = MemoryDirectory::new();
        directory.fail_on(DirectoryCall::InsertGroup("a@d.com".into()));
        let desired = managed("a@d.com").with_member("x@d.com");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[desired]).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].operation, Operation::CreateGroup);
        assert_eq!(report.members_added, 0);
        assert!(!directory
            .calls()
            .iter()
            .any(|c| matches!(c, DirectoryCall::ListMembers { .. })));
    }

    #[test]
    fn unverified_group_is_reported() {
        let directory = MemoryDirectory::new();
        directory.set_creation_lag(5);
        let desired = managed("a@d.com").with_member("x@d.com");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[desired]).unwrap();

        assert_eq!(report.groups_created, 1);
        assert_eq!(report.groups_unverified, 1);
        assert_eq!(report.members_added, 0);
    }

    #[test]
    fn duplicate_desired_addresses_are_ignored() {
        let directory = MemoryDirectory::new();
        let first = managed("a@d.com").with_member("one@d.com");
        let second = managed("A@d.com").with_member("two@d.com");
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        let report = reconciler.reconcile(&[first, second]).unwrap();

        assert_eq!(report.groups_created, 1);
        let members = directory.group("a@d.com").unwrap().members;
        assert_eq!(members, BTreeSet::from(["one@d.com".to_string()]));
    }

    #[test]
    fn read_failures_abort_the_run() {
        let directory = MemoryDirectory::new();
        directory.fail_on(DirectoryCall::ListGroups { page_token: None });
        let reconciler = Reconciler::new(quick(), &directory).unwrap();

        assert!(reconciler.reconcile(&[managed("a@d.com")]).is_err());
        assert!(directory.mutations().is_empty());
    }

    #[test]
    fn empty_tag_is_rejected() {
        let config = ReconcileConfig::new().with_managed_tag("");
        assert!(Reconciler::new(config, MemoryDirectory::new()).is_err());
    }

    #[test]
    fn report_summary() {
        let report = ReconcileReport {
            dry_run: true,
            groups_deleted: 1,
            groups_created: 2,
            members_added: 3,
            ..ReconcileReport::default()
        };
        assert_eq!(report.mutations(), 6);
        assert_eq!(
            report.to_string(),
            "dry run: groups -1 +2 ~0 (0 unverified), aliases +0 -0, members +3 -0, 0 failed"
        );
    }
}
