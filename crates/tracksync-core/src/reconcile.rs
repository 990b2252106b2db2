//! Reconciliation of the store against a source snapshot.
//!
//! Store records are split into two cohorts on every pass:
//!
//! - **current**: the key is in the latest source snapshot. Source fields are
//!   authoritative except the owner, which keeps any value already in the
//!   store.
//! - **history**: the key is not in the snapshot. The issue is re-read with a
//!   point lookup and only its status, title and estimate are refreshed; the
//!   stored owner and sprint stay exactly as they are.
//!
//! Tags are only ever unioned. Records are never deleted. Every write covers
//! a single record, and a failed write or lookup is logged and skipped
//! without affecting the rest of the pass.

use crate::error::{Result, SyncError};
use crate::source::{is_valid_key, MembershipFilter, SourceClient};
use crate::store::{select_safe, StoreClient};
use crate::types::{RecordFields, SourceRecord, StoreRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

// ---------------------------------------------------------------------------
// SyncSummary
// ---------------------------------------------------------------------------

/// Counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Store records matched by the source snapshot.
    pub current: usize,
    /// Store records absent from the source snapshot.
    pub history: usize,
    pub created: usize,
    /// Successful update calls, including no-op ones.
    pub updated: usize,
    /// Updates whose merged fields equalled the stored ones.
    pub unchanged: usize,
    pub write_failures: usize,
    /// Source items dropped because an earlier item had the same key.
    pub duplicate_keys: usize,
    /// History records left unrefreshed this pass because the stored key is
    /// not an issue key, or the point lookup failed or found nothing.
    pub stale_history: usize,
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

fn tags_with(existing: &BTreeSet<String>, tag: &str) -> BTreeSet<String> {
    let mut tags = existing.clone();
    if !tag.is_empty() {
        tags.insert(tag.to_string());
    }
    tags
}

/// Fields for a ticket the store has never seen. Owner and sprint come from
/// the source.
pub fn fields_from_source(source: &SourceRecord) -> RecordFields {
    RecordFields {
        key: source.key.clone(),
        url: source.url.clone(),
        title: source.title.clone(),
        status: source.status.clone(),
        story_points: source.story_points,
        owner: Some(source.owner.clone()),
        window: source.active_windows.first().cloned(),
        tags: tags_with(&BTreeSet::new(), &source.tag),
    }
}

/// Merge for the current cohort. The stored owner wins when present.
pub fn merge_current(existing: &StoreRecord, source: &SourceRecord) -> RecordFields {
    let mut fields = fields_from_source(source);
    if existing.owner.is_some() {
        fields.owner = existing.owner.clone();
    }
    fields.tags = tags_with(&existing.tags, &source.tag);
    fields
}

/// Merge for the history cohort, given a fresh point lookup of the issue.
pub fn merge_history(existing: &StoreRecord, fresh: &SourceRecord) -> RecordFields {
    RecordFields {
        key: existing.key.clone(),
        url: fresh.url.clone(),
        title: fresh.title.clone(),
        status: fresh.status.clone(),
        story_points: fresh.story_points,
        owner: existing.owner.clone(),
        window: existing.window.clone(),
        tags: tags_with(&existing.tags, &fresh.tag),
    }
}

// ---------------------------------------------------------------------------
// Snapshot indexing
// ---------------------------------------------------------------------------

/// Drop repeated keys from a source snapshot. The first occurrence wins and
/// both snapshot positions are logged. Returns the unique records in
/// snapshot order and the number dropped.
pub fn dedupe_source(snapshot: &[SourceRecord]) -> (Vec<&SourceRecord>, usize) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut unique = Vec::with_capacity(snapshot.len());
    let mut dropped = 0;
    for (index, record) in snapshot.iter().enumerate() {
        match first_seen.get(record.key.as_str()) {
            None => {
                first_seen.insert(record.key.as_str(), index);
                unique.push(record);
            }
            Some(&kept_index) => {
                dropped += 1;
                tracing::warn!(
                    key = %record.key,
                    kept_index,
                    dropped_index = index,
                    error = %SyncError::DuplicateKey(record.key.clone()),
                    "keeping first occurrence"
                );
            }
        }
    }
    (unique, dropped)
}

/// Store records split by presence of their key in the source snapshot.
#[derive(Debug, Default)]
pub struct Cohorts<'s> {
    pub current: HashMap<&'s str, &'s StoreRecord>,
    pub history: Vec<&'s StoreRecord>,
}

/// Partition the store snapshot. A second page carrying an already seen key
/// is left out of both cohorts.
pub fn partition<'s>(store: &'s [StoreRecord], source_keys: &HashSet<&str>) -> Cohorts<'s> {
    let mut cohorts = Cohorts::default();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in store {
        if !seen.insert(record.key.as_str()) {
            tracing::warn!(
                key = %record.key,
                store_id = %record.store_id,
                "duplicate store page for key; leaving it untouched"
            );
            continue;
        }
        if source_keys.contains(record.key.as_str()) {
            cohorts.current.insert(record.key.as_str(), record);
        } else {
            cohorts.history.push(record);
        }
    }
    cohorts
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<'a> {
    source: &'a dyn SourceClient,
    store: &'a dyn StoreClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(source: &'a dyn SourceClient, store: &'a dyn StoreClient) -> Self {
        Self { source, store }
    }

    /// Fetch both snapshots and reconcile. Fails without writing anything if
    /// either side cannot be read.
    pub fn sync(&self, filter: &MembershipFilter) -> Result<SyncSummary> {
        tracing::info!("starting sync");
        let source_snapshot = self.source.fetch(filter)?;
        let store_snapshot = self.store.fetch_all()?;
        let summary = self.run(&source_snapshot, &store_snapshot);
        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            write_failures = summary.write_failures,
            stale_history = summary.stale_history,
            "sync completed"
        );
        Ok(summary)
    }

    /// Reconcile already fetched snapshots. Per-record failures are counted,
    /// never returned.
    pub fn run(&self, source_snapshot: &[SourceRecord], store_snapshot: &[StoreRecord]) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let (unique, dropped) = dedupe_source(source_snapshot);
        summary.duplicate_keys = dropped;
        let source_keys: HashSet<&str> = unique.iter().map(|r| r.key.as_str()).collect();

        let cohorts = partition(store_snapshot, &source_keys);
        summary.current = cohorts.current.len();
        summary.history = cohorts.history.len();

        for source in &unique {
            match cohorts.current.get(source.key.as_str()) {
                Some(existing) => {
                    tracing::info!(key = %source.key, "updating ticket in current sprint");
                    self.apply_update(existing, merge_current(existing, source), &mut summary);
                }
                None => {
                    tracing::info!(key = %source.key, "creating new ticket");
                    self.apply_create(fields_from_source(source), &mut summary);
                }
            }
        }

        for existing in &cohorts.history {
            self.refresh_history(existing, &mut summary);
        }

        summary
    }

    fn refresh_history(&self, existing: &StoreRecord, summary: &mut SyncSummary) {
        if !is_valid_key(&existing.key) {
            tracing::warn!(
                key = %existing.key,
                store_id = %existing.store_id,
                "stored key is not an issue key; skipping lookup"
            );
            summary.stale_history += 1;
            return;
        }
        let fresh = match self.source.lookup(&existing.key) {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                tracing::warn!(key = %existing.key, "history ticket not found in source; skipping");
                summary.stale_history += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(key = %existing.key, error = %e, "history lookup failed; skipping");
                summary.stale_history += 1;
                return;
            }
        };
        tracing::info!(key = %existing.key, status = %fresh.status, "refreshing history ticket");
        self.apply_update(existing, merge_history(existing, &fresh), summary);
    }

    fn apply_create(&self, fields: RecordFields, summary: &mut SyncSummary) {
        let fields = select_safe(fields);
        match self.store.create(&fields) {
            Ok(()) => summary.created += 1,
            Err(e) => {
                tracing::error!(key = %fields.key, error = %e, "create failed");
                summary.write_failures += 1;
            }
        }
    }

    /// Select values are cleaned before comparing, so a record reads back
    /// equal to what was written and the next pass counts it unchanged.
    fn apply_update(&self, existing: &StoreRecord, fields: RecordFields, summary: &mut SyncSummary) {
        let fields = select_safe(fields);
        let unchanged = existing.fields() == fields;
        match self.store.update(&existing.store_id, &fields) {
            Ok(()) => {
                summary.updated += 1;
                if unchanged {
                    summary.unchanged += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    key = %existing.key,
                    store_id = %existing.store_id,
                    error = %e,
                    "update failed"
                );
                summary.write_failures += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
