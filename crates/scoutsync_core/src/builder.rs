//! Desired-state builder: registry mailing lists to directory groups.

use crate::address::{in_domain, normalize, rewrite, RewriteRule};
use crate::error::CoreResult;
use crate::model::{DirectoryGroup, MailingList};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Tag appended to the title of every group this tool manages.
pub const DEFAULT_MANAGED_TAG: &str = "(Scoutnet)";

/// Configuration for [`GroupBuilder`].
#[derive(Debug, Clone)]
pub struct GroupBuilderConfig {
    /// Directory domain; aliases outside it are rejected.
    pub domain: String,
    /// Tag appended to group titles.
    pub managed_tag: String,
    /// Member rewrite rules, applied in order.
    pub rewrites: Vec<RewriteRule>,
}

impl GroupBuilderConfig {
    /// Creates a configuration with the default tag and the `googlemail.com`
    /// rewrite.
    pub fn new(domain: impl Into<String>) -> CoreResult<Self> {
        Ok(Self {
            domain: domain.into(),
            managed_tag: DEFAULT_MANAGED_TAG.to_string(),
            rewrites: vec![RewriteRule::googlemail()?],
        })
    }

    /// Sets the managed tag. Surrounding whitespace is dropped.
    pub fn with_managed_tag(mut self, tag: impl Into<String>) -> Self {
        self.managed_tag = tag.into().trim().to_string();
        self
    }

    /// Replaces the rewrite rules.
    pub fn with_rewrites(mut self, rewrites: Vec<RewriteRule>) -> Self {
        self.rewrites = rewrites;
        self
    }
}

/// Turns mailing lists into the desired directory groups.
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    config: GroupBuilderConfig,
}

impl GroupBuilder {
    /// Creates a builder.
    pub fn new(config: GroupBuilderConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GroupBuilderConfig {
        &self.config
    }

    /// Builds one group per in-domain alias of `list`.
    ///
    /// A list without aliases yields no groups.
    pub fn build_groups(&self, list: &MailingList) -> Vec<DirectoryGroup> {
        let title = format!(
            "{} {}",
            list.title.as_deref().unwrap_or(&list.id),
            self.config.managed_tag
        );
        let description = list.description.as_deref().and_then(sanitize_description);
        let members: BTreeSet<String> = list
            .members
            .iter()
            .map(|member| rewrite(&self.config.rewrites, &normalize(member)))
            .collect();

        let mut seen = BTreeSet::new();
        let mut groups = Vec::new();
        for alias in &list.aliases {
            let address = normalize(alias);
            if !in_domain(&address, &self.config.domain) {
                warn!(list = %list.id, alias = %alias, "invalid domain in alias, rejected");
                continue;
            }
            if !seen.insert(address.clone()) {
                continue;
            }

            let mut group = DirectoryGroup::new(address.clone()).with_title(title.clone());
            group.description = description.clone();
            group.aliases.insert(address);
            group.members = members.clone();
            groups.push(group);
        }

        if groups.is_empty() {
            debug!(list = %list.id, "excluding list without usable aliases");
        }
        groups
    }

    /// Builds groups for every list. When two lists claim the same address the
    /// first one wins.
    pub fn build_all(&self, lists: &[MailingList]) -> Vec<DirectoryGroup> {
        let mut addresses = BTreeSet::new();
        let mut groups = Vec::new();
        for list in lists {
            for group in self.build_groups(list) {
                if addresses.insert(group.address.clone()) {
                    groups.push(group);
                } else {
                    warn!(
                        list = %list.id,
                        address = %group.address,
                        "address already claimed by another list, skipped"
                    );
                }
            }
        }
        groups
    }
}

/// Strips characters the directory rejects from a description. A description
/// that ends up empty is treated as absent.
pub fn sanitize_description(description: &str) -> Option<String> {
    let cleaned: String = description
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '='))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
