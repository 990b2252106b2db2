use crate::types::SourceRecord;
use std::collections::BTreeSet;

/// Union of the active sprints across a source snapshot.
///
/// Feeds reporting only; the reconciler decides cohorts by key presence.
pub fn active_windows(records: &[SourceRecord]) -> BTreeSet<String> {
    records
        .iter()
        .flat_map(|r| r.active_windows.iter().cloned())
        .collect()
}
