//! Configuration for the reconciliation engine.

use scoutsync_core::DEFAULT_MANAGED_TAG;
use std::time::Duration;

/// Default page size for directory listings.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Read and diff, but suppress every write.
    pub dry_run: bool,
    /// Title suffix marking groups this tool owns.
    pub managed_tag: String,
    /// Maximum items per listing page.
    pub page_size: u32,
    /// Re-fetch policy after creating a group.
    pub creation_retry: CreationRetry,
}

impl ReconcileConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            dry_run: false,
            managed_tag: DEFAULT_MANAGED_TAG.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            creation_retry: CreationRetry::default(),
        }
    }

    /// Enables or disables dry-run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the managed tag. Surrounding whitespace is dropped.
    pub fn with_managed_tag(mut self, tag: impl Into<String>) -> Self {
        self.managed_tag = tag.into().trim().to_string();
        self
    }

    /// Sets the page size. Zero is raised to one.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the creation retry policy.
    pub fn with_creation_retry(mut self, retry: CreationRetry) -> Self {
        self.creation_retry = retry;
        self
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How long to wait for a freshly created group to become visible.
///
/// After creation the group is fetched once immediately; if it is still
/// absent the engine sleeps `delay` and fetches again, up to `attempts`
/// times, before reporting it as unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationRetry {
    /// Number of delayed re-fetches.
    pub attempts: u32,
    /// Wait before each re-fetch.
    pub delay: Duration,
}

impl CreationRetry {
    /// Creates a policy.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// No delayed re-fetch at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Sets the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for CreationRetry {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(10))
    }
}
