use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use tracksync_core::config::Config;
use tracksync_core::reconcile::{Reconciler, SyncSummary};

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let source = super::source_client(config)?;
    let store = super::store_client(config)?;
    let filter = super::membership_filter(config);

    let summary = Reconciler::new(&source, &store)
        .sync(&filter)
        .context("sync aborted, nothing was written")?;

    if summary.write_failures > 0 || summary.stale_history > 0 {
        tracing::warn!(
            write_failures = summary.write_failures,
            stale_history = summary.stale_history,
            "sync finished with skipped records"
        );
    }

    if json {
        print_json(&serde_json::json!({
            "synced_at": Utc::now(),
            "summary": summary,
        }))?;
    } else {
        print_table(&["metric", "count"], &summary_rows(&summary));
    }
    Ok(())
}

fn summary_rows(summary: &SyncSummary) -> Vec<Vec<String>> {
    [
        ("current", summary.current),
        ("history", summary.history),
        ("created", summary.created),
        ("updated", summary.updated),
        ("unchanged", summary.unchanged),
        ("write_failures", summary.write_failures),
        ("duplicate_keys", summary.duplicate_keys),
        ("stale_history", summary.stale_history),
    ]
    .into_iter()
    .map(|(name, n)| vec![name.to_string(), n.to_string()])
    .collect()
}
