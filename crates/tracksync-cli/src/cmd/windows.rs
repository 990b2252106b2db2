use crate::output::{print_json, print_table};
use anyhow::Context;
use tracksync_core::config::Config;
use tracksync_core::source::SourceClient;
use tracksync_core::window::active_windows;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let source = super::source_client(config)?;
    let snapshot = source
        .fetch(&super::membership_filter(config))
        .context("failed to fetch source snapshot")?;
    let windows = active_windows(&snapshot);

    if json {
        print_json(&windows)?;
    } else if windows.is_empty() {
        println!("No active sprints.");
    } else {
        let rows: Vec<Vec<String>> = windows.iter().map(|w| vec![w.clone()]).collect();
        print_table(&["sprint"], &rows);
    }
    Ok(())
}
