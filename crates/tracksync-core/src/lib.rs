//! `tracksync-core` keeps a Notion work log consistent with Jira.
//!
//! ```text
//! JiraClient ──fetch──▶ Vec<SourceRecord> ─┐
//!                                          ├─▶ Reconciler ──create/update──▶ NotionClient
//! NotionClient ─fetch_all─▶ Vec<StoreRecord> ┘        │
//!                                                     └─lookup (history cohort)──▶ JiraClient
//! ```
//!
//! The reconciled store is then read back as [`report::ReportRow`]s to build
//! per-owner sprint reports.

pub mod classifier;
pub mod config;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod store;
pub mod types;
pub mod window;

pub use error::{Result, SyncError};
