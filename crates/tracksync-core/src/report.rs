//! Per-owner sprint reports built from the reconciled store.

use crate::config::UserConfig;
use crate::notify::Notifier;
use crate::types::StoreRecord;
use serde::Serialize;
use std::collections::BTreeSet;

/// Statuses counted as finished work.
pub const COMPLETED_STATUSES: &[&str] = &["Done", "Completed", "Closed"];

pub fn is_completed(status: &str) -> bool {
    COMPLETED_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// ReportRow
// ---------------------------------------------------------------------------

/// Read-model view of one store record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub url: String,
    pub title: String,
    pub status: String,
    pub owner: Option<String>,
    pub window: Option<String>,
    pub tags: Vec<String>,
}

impl From<&StoreRecord> for ReportRow {
    fn from(record: &StoreRecord) -> Self {
        Self {
            key: record.key.clone(),
            url: record.url.clone().unwrap_or_default(),
            title: record.title.clone(),
            status: record.status.clone(),
            owner: record.owner.clone(),
            window: record.window.clone(),
            tags: record.tags.iter().cloned().collect(),
        }
    }
}

impl ReportRow {
    fn render(&self) -> String {
        let link = if self.url.is_empty() {
            self.key.clone()
        } else {
            format!("<{}|{}>", self.url, self.key)
        };
        format!("• {link} {} `{}`", self.title, self.status)
    }
}

// ---------------------------------------------------------------------------
// OwnerReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OwnerReport {
    pub owner: String,
    pub windows: Vec<String>,
    pub ongoing: Vec<ReportRow>,
    pub completed: Vec<ReportRow>,
}

impl OwnerReport {
    /// Select the owner's rows that sit in an active sprint and split them
    /// by completion.
    pub fn build(owner: &str, rows: &[ReportRow], active_windows: &BTreeSet<String>) -> Self {
        let mut mine: Vec<&ReportRow> = rows
            .iter()
            .filter(|r| r.owner.as_deref() == Some(owner))
            .filter(|r| {
                r.window
                    .as_ref()
                    .is_some_and(|w| active_windows.contains(w))
            })
            .collect();
        mine.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.key.cmp(&b.key)));

        let own_windows: BTreeSet<String> = mine.iter().filter_map(|r| r.window.clone()).collect();
        let windows = if own_windows.is_empty() {
            active_windows.iter().cloned().collect()
        } else {
            own_windows.into_iter().collect()
        };

        let (completed, ongoing): (Vec<&ReportRow>, Vec<&ReportRow>) =
            mine.into_iter().partition(|r| is_completed(&r.status));

        Self {
            owner: owner.to_string(),
            windows,
            ongoing: ongoing.into_iter().cloned().collect(),
            completed: completed.into_iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ongoing.is_empty() && self.completed.is_empty()
    }

    /// Slack mrkdwn message body.
    pub fn render(&self) -> String {
        let list = |rows: &[ReportRow]| {
            rows.iter()
                .map(ReportRow::render)
                .collect::<Vec<_>>()
                .join("\n")
        };
        let mut message = format!("*🏃 Sprint:* {}\n\n", self.windows.join(", "));
        message.push_str("*🔄 Ongoing:*\n");
        message.push_str(&list(&self.ongoing));
        message.push_str("\n\n*✅ Completed:*\n");
        message.push_str(&list(&self.completed));
        message.push_str("\n\n*📝 Summary:*\n");
        message
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Build and send one report per roster member. Members without a name or
/// slack id are skipped; a failed delivery does not stop the others.
pub fn send_reports(
    notifier: &dyn Notifier,
    users: &[UserConfig],
    rows: &[ReportRow],
    active_windows: &BTreeSet<String>,
) -> DeliverySummary {
    let mut summary = DeliverySummary::default();
    for user in users {
        let slack_id = user.slack_user_id.as_deref().unwrap_or("");
        if user.name.is_empty() || slack_id.is_empty() {
            tracing::info!(owner = %user.name, "skipping user without name or slack id");
            summary.skipped += 1;
            continue;
        }
        let report = OwnerReport::build(&user.name, rows, active_windows);
        match notifier.send_direct(slack_id, &report.render()) {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                tracing::error!(owner = %user.name, error = %e, "report delivery failed");
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SyncError};
    use std::cell::RefCell;

    fn row(key: &str, owner: &str, status: &str, window: Option<&str>) -> ReportRow {
        ReportRow {
            key: key.to_string(),
            url: format!("https://acme.atlassian.net/browse/{key}"),
            title: format!("Title {key}"),
            status: status.to_string(),
            owner: Some(owner.to_string()),
            window: window.map(str::to_string),
            tags: vec![],
        }
    }

    fn active(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn row_from_store_record() {
        let record = StoreRecord {
            store_id: "p".to_string(),
            key: "A-1".to_string(),
            url: None,
            title: "T".to_string(),
            status: "Done".to_string(),
            story_points: 1.0,
            owner: Some("bob".to_string()),
            window: None,
            tags: BTreeSet::from(["b".to_string(), "a".to_string()]),
        };
        let row = ReportRow::from(&record);
        assert_eq!(row.url, "");
        assert_eq!(row.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn build_filters_owner_and_active_sprint() {
        let rows = vec![
            row("A-1", "alice", "In Progress", Some("Sprint 7")),
            row("A-2", "alice", "Done", Some("Sprint 7")),
            row("A-3", "alice", "Closed", Some("Sprint 6")),
            row("A-4", "bob", "To Do", Some("Sprint 7")),
            row("A-5", "alice", "To Do", None),
        ];
        let report = OwnerReport::build("alice", &rows, &active(&["Sprint 7"]));
        let keys = |rs: &[ReportRow]| rs.iter().map(|r| r.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&report.ongoing), vec!["A-1"]);
        assert_eq!(keys(&report.completed), vec!["A-2"]);
        assert_eq!(report.windows, vec!["Sprint 7".to_string()]);
    }

    #[test]
    fn build_without_rows_lists_all_active_sprints() {
        let report = OwnerReport::build("carol", &[], &active(&["B", "A"]));
        assert!(report.is_empty());
        assert_eq!(report.windows, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn render_message() {
        let rows = vec![
            row("A-1", "alice", "In Progress", Some("Sprint 7")),
            row("A-2", "alice", "Done", Some("Sprint 7")),
        ];
        let text = OwnerReport::build("alice", &rows, &active(&["Sprint 7"])).render();
        assert_eq!(
            text,
            "*🏃 Sprint:* Sprint 7\n\n\
             *🔄 Ongoing:*\n• <https://acme.atlassian.net/browse/A-1|A-1> Title A-1 `In Progress`\n\n\
             *✅ Completed:*\n• <https://acme.atlassian.net/browse/A-2|A-2> Title A-2 `Done`\n\n\
             *📝 Summary:*\n"
        );
    }

    #[test]
    fn render_row_without_url_uses_bare_key() {
        let mut r = row("A-1", "alice", "Done", Some("S"));
        r.url.clear();
        assert_eq!(r.render(), "• A-1 Title A-1 `Done`");
    }

    struct RecordingNotifier {
        fail_for: &'static str,
        sent: RefCell<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn send_direct(&self, user_id: &str, text: &str) -> Result<()> {
            if user_id == self.fail_for {
                return Err(SyncError::NotifyFailed("channel_not_found".to_string()));
            }
            self.sent
                .borrow_mut()
                .push((user_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn send_reports_isolates_failures_and_skips_incomplete_users() {
        let users = vec![
            UserConfig {
                name: "alice".to_string(),
                jira_user_id: None,
                slack_user_id: Some("U1".to_string()),
            },
            UserConfig {
                name: "bob".to_string(),
                jira_user_id: None,
                slack_user_id: Some("U2".to_string()),
            },
            UserConfig {
                name: "carol".to_string(),
                jira_user_id: None,
                slack_user_id: None,
            },
            UserConfig {
                name: "dave".to_string(),
                jira_user_id: None,
                slack_user_id: Some("U4".to_string()),
            },
        ];
        let notifier = RecordingNotifier {
            fail_for: "U2",
            sent: RefCell::new(Vec::new()),
        };
        let rows = vec![row("A-1", "alice", "In Progress", Some("Sprint 7"))];

        let summary = send_reports(&notifier, &users, &rows, &active(&["Sprint 7"]));

        assert_eq!(
            summary,
            DeliverySummary {
                sent: 2,
                skipped: 1,
                failed: 1
            }
        );
        let sent = notifier.sent.borrow();
        assert_eq!(sent[0].0, "U1");
        assert!(sent[0].1.contains("A-1"));
        assert_eq!(sent[1].0, "U4");
        assert!(!sent[1].1.contains("A-1"));
    }
}
