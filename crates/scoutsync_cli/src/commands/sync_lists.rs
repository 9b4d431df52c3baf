//! Sync-lists command implementation.

use crate::auth::token_source;
use crate::config::AppConfig;
use crate::http::ReqwestClient;
use scoutsync_core::{DirectoryGroup, GroupBuilder, MailingList};
use scoutsync_engine::{DirectoryApi, HttpDirectory, ReconcileReport, Reconciler};
use scoutsync_registry::RegistryClient;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Options for one `sync-lists` run.
#[derive(Debug, Clone, Default)]
pub struct SyncListsOptions<'a> {
    /// Maximum number of lists to fetch.
    pub limit: Option<usize>,
    /// Where to dump the fetched lists as JSON.
    pub output: Option<&'a Path>,
    /// Fetch and build only; do not touch the directory.
    pub skip_directory: bool,
    /// Compute and log changes without writing them.
    pub dry_run: bool,
}

/// Runs the sync-lists command.
pub fn run(
    config: &AppConfig,
    client: ReqwestClient,
    options: &SyncListsOptions<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let builder = GroupBuilder::new(config.builder_config()?);

    let registry = RegistryClient::new(client.clone(), config.registry_config());
    let lists = registry.fetch_lists(options.limit.or(config.registry.limit))?;

    if let Some(path) = options.output {
        write_dump(path, &lists)?;
        info!(path = %path.display(), lists = lists.len(), "wrote list dump");
    }

    let groups = builder.build_all(&lists);
    if options.skip_directory {
        println!(
            "Fetched {} lists, built {} groups (directory skipped)",
            lists.len(),
            groups.len()
        );
        return Ok(());
    }

    let tokens = token_source(&config.directory, client.clone())?;
    let directory = HttpDirectory::new(client, tokens, config.domain()?);
    let report = reconcile(config, directory, &groups, options.dry_run)?;
    println!("{report}");
    Ok(())
}

/// Reconciles `directory` against `groups` with the configured engine
/// settings.
pub fn reconcile<D: DirectoryApi>(
    config: &AppConfig,
    directory: D,
    groups: &[DirectoryGroup],
    dry_run: bool,
) -> Result<ReconcileReport, Box<dyn std::error::Error>> {
    let reconciler = Reconciler::new(config.reconcile_config(dry_run), directory)?;
    let report = reconciler.reconcile(groups)?;
    for failure in &report.failures {
        eprintln!(
            "{}: failed to {} {}: {}",
            failure.group, failure.operation, failure.target, failure.message
        );
    }
    Ok(report)
}

/// Writes `lists` as pretty-printed JSON with sorted keys.
pub fn write_dump(path: &Path, lists: &[MailingList]) -> Result<(), Box<dyn std::error::Error>> {
    let value = sort_keys(serde_json::to_value(lists)?);
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
