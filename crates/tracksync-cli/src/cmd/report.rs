use crate::output::print_json;
use anyhow::Context;
use std::collections::BTreeSet;
use tracksync_core::config::{Config, UserConfig};
use tracksync_core::notify::SlackNotifier;
use tracksync_core::report::{send_reports, OwnerReport, ReportRow};
use tracksync_core::source::SourceClient;
use tracksync_core::store::StoreClient;
use tracksync_core::window::active_windows;

pub fn run(config: &Config, owner: Option<&str>, send: bool, json: bool) -> anyhow::Result<()> {
    let store = super::store_client(config)?;
    let rows: Vec<ReportRow> = store
        .fetch_all()
        .context("failed to read the work log")?
        .iter()
        .map(ReportRow::from)
        .collect();

    let windows = current_windows(config);

    if send {
        let users: Vec<UserConfig> = config
            .users
            .iter()
            .filter(|u| owner.map_or(true, |o| u.name == o))
            .cloned()
            .collect();
        if users.is_empty() {
            anyhow::bail!("no roster entries to notify");
        }
        let notifier = SlackNotifier::new(&config.notify).context("failed to build notifier")?;
        let summary = send_reports(&notifier, &users, &rows, &windows);
        if json {
            print_json(&summary)?;
        } else {
            println!(
                "Reports sent: {}, skipped: {}, failed: {}",
                summary.sent, summary.skipped, summary.failed
            );
        }
        return Ok(());
    }

    let reports: Vec<OwnerReport> = owners(config, owner, &rows)
        .iter()
        .map(|o| OwnerReport::build(o, &rows, &windows))
        .collect();
    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            println!("=== {} ===", report.owner);
            println!("{}", report.render());
        }
    }
    Ok(())
}

/// Active sprints from the tracker. A failed fetch degrades to no sprints
/// rather than aborting the report.
fn current_windows(config: &Config) -> BTreeSet<String> {
    let fetched = super::source_client(config).and_then(|source| {
        source
            .fetch(&super::membership_filter(config))
            .map_err(anyhow::Error::from)
    });
    match fetched {
        Ok(snapshot) => active_windows(&snapshot),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "failed to get active sprints from source");
            BTreeSet::new()
        }
    }
}

/// The requested owner, else the roster, else every owner in the work log.
fn owners(config: &Config, owner: Option<&str>, rows: &[ReportRow]) -> Vec<String> {
    if let Some(o) = owner {
        return vec![o.to_string()];
    }
    if !config.users.is_empty() {
        return config.users.iter().map(|u| u.name.clone()).collect();
    }
    rows.iter()
        .filter_map(|r| r.owner.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
