use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Owner recorded for source items with no assignee.
pub const UNASSIGNED: &str = "Unassigned";

// ---------------------------------------------------------------------------
// SourceRecord
// ---------------------------------------------------------------------------

/// One issue as reported by the tracker, normalized at ingestion.
///
/// Optional upstream fields are resolved to defaults here (no assignee →
/// [`UNASSIGNED`], no estimate → `0.0`) so the merge logic never has to deal
/// with missing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub key: String,
    /// Browse link for the ticket.
    pub url: String,
    pub title: String,
    pub status: String,
    pub issue_type: String,
    pub owner: String,
    pub story_points: f64,
    /// Names of the active sprints this issue belongs to, deduplicated, in
    /// the order the tracker lists them.
    pub active_windows: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<String>,
    /// Derived label, see [`crate::classifier::classify`]. Empty when none applies.
    pub tag: String,
}

// ---------------------------------------------------------------------------
// StoreRecord
// ---------------------------------------------------------------------------

/// One page of the work-log database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Opaque page id assigned by the store.
    pub store_id: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    pub status: String,
    pub story_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// Curated tags. Only ever grown by reconciliation.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl StoreRecord {
    /// The writable field set as currently stored.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            key: self.key.clone(),
            url: self.url.clone().unwrap_or_default(),
            title: self.title.clone(),
            status: self.status.clone(),
            story_points: self.story_points,
            owner: self.owner.clone(),
            window: self.window.clone(),
            tags: self.tags.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordFields
// ---------------------------------------------------------------------------

/// The complete field set sent with a create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    pub key: String,
    pub url: String,
    pub title: String,
    pub status: String,
    pub story_points: f64,
    pub owner: Option<String>,
    pub window: Option<String>,
    pub tags: BTreeSet<String>,
}
