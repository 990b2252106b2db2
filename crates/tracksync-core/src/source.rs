//! Issue tracker side: membership filter, ingestion and the Jira REST client.
//!
//! Raw issues are untyped JSON with many optional nested fields. They are
//! normalized exactly once, in [`normalize_issue`]; everything downstream works
//! on [`SourceRecord`].

use crate::classifier::classify;
use crate::config::SourceConfig;
use crate::error::{Result, SyncError};
use crate::types::{SourceRecord, UNASSIGNED};
use base64::Engine as _;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// SourceClient
// ---------------------------------------------------------------------------

pub trait SourceClient {
    /// Fetch every issue matching `filter`. Items with an unexpected shape
    /// are logged and skipped; only transport/auth failures or a payload with
    /// no issue collection fail the call.
    fn fetch(&self, filter: &MembershipFilter) -> Result<Vec<SourceRecord>>;

    /// Point lookup by key. `Ok(None)` when the tracker has no such issue.
    fn lookup(&self, key: &str) -> Result<Option<SourceRecord>>;
}

// ---------------------------------------------------------------------------
// MembershipFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipFilter {
    pub assignees: Vec<String>,
    pub open_sprints_only: bool,
    pub excluded_types: Vec<String>,
}

impl MembershipFilter {
    pub fn new(assignees: Vec<String>, config: &SourceConfig) -> Self {
        Self {
            assignees,
            open_sprints_only: config.open_sprints_only,
            excluded_types: config.excluded_types.clone(),
        }
    }

    /// Render as a JQL query. Empty inputs drop their clause.
    pub fn to_jql(&self) -> String {
        let mut clauses = Vec::new();
        if !self.assignees.is_empty() {
            let any = self
                .assignees
                .iter()
                .map(|a| format!("assignee = {}", quote(a)))
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({any})"));
        }
        if self.open_sprints_only {
            clauses.push("sprint in openSprints()".to_string());
        }
        for ty in &self.excluded_types {
            clauses.push(format!("type != {}", quote(ty)));
        }

        if clauses.is_empty() {
            "ORDER BY created DESC".to_string()
        } else {
            format!("{} ORDER BY created DESC", clauses.join(" AND "))
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Where the site keeps sprint membership and estimates. Both are custom
/// fields whose ids differ between tracker instances.
#[derive(Debug, Clone)]
pub struct FieldMap {
    pub sprint_field: String,
    pub story_points_field: String,
}

impl From<&SourceConfig> for FieldMap {
    fn from(config: &SourceConfig) -> Self {
        Self {
            sprint_field: config.sprint_field.clone(),
            story_points_field: config.story_points_field.clone(),
        }
    }
}

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*-[0-9]+$").unwrap())
}

pub fn is_valid_key(key: &str) -> bool {
    key_regex().is_match(key)
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, segment| v.get(segment))
        .and_then(Value::as_str)
}

fn required<'a>(value: &'a Value, path: &[&str], key: &str) -> Result<&'a str> {
    str_at(value, path).ok_or_else(|| {
        SyncError::SourceResponseMalformed(format!("{key}: missing {}", path.join(".")))
    })
}

/// Normalize one raw issue. Required: key, summary, status and issue type.
/// Everything else defaults.
pub fn normalize_issue(issue: &Value, fields_map: &FieldMap, base_url: &str) -> Result<SourceRecord> {
    let key = issue
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::SourceResponseMalformed("issue without key".to_string()))?;
    if !is_valid_key(key) {
        return Err(SyncError::SourceResponseMalformed(format!(
            "invalid issue key '{key}'"
        )));
    }
    let fields = issue
        .get("fields")
        .filter(|f| f.is_object())
        .ok_or_else(|| SyncError::SourceResponseMalformed(format!("{key}: missing fields")))?;

    let title = required(fields, &["summary"], key)?;
    let status = required(fields, &["status", "name"], key)?;
    let issue_type = required(fields, &["issuetype", "name"], key)?;

    let owner = str_at(fields, &["assignee", "displayName"]).unwrap_or(UNASSIGNED);

    let story_points = fields
        .get(&fields_map.story_points_field)
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .map(|p| p.max(0.0))
        .unwrap_or(0.0);

    let mut active_windows: Vec<String> = Vec::new();
    if let Some(sprints) = fields.get(&fields_map.sprint_field).and_then(Value::as_array) {
        for sprint in sprints {
            if str_at(sprint, &["state"]) != Some("active") {
                continue;
            }
            if let Some(name) = str_at(sprint, &["name"]) {
                if !active_windows.iter().any(|w| w == name) {
                    active_windows.push(name.to_string());
                }
            }
        }
    }

    let parent_key = str_at(fields, &["parent", "key"]).map(str::to_string);
    let parent_title = str_at(fields, &["parent", "fields", "summary"]).map(str::to_string);
    let tag = classify(issue_type, parent_title.as_deref());

    Ok(SourceRecord {
        key: key.to_string(),
        url: browse_url(base_url, key),
        title: title.to_string(),
        status: status.to_string(),
        issue_type: issue_type.to_string(),
        owner: owner.to_string(),
        story_points,
        active_windows,
        parent_key,
        parent_title,
        tag,
    })
}

pub fn browse_url(base_url: &str, key: &str) -> String {
    format!("{}/browse/{key}", base_url.trim_end_matches('/'))
}

/// Normalize a page of raw issues, skipping the ones that do not parse.
pub fn normalize_issues(issues: &[Value], fields_map: &FieldMap, base_url: &str) -> Vec<SourceRecord> {
    let mut records = Vec::with_capacity(issues.len());
    for (idx, issue) in issues.iter().enumerate() {
        match normalize_issue(issue, fields_map, base_url) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(index = idx, error = %e, "skipping source item"),
        }
    }
    records
}

// ---------------------------------------------------------------------------
// JiraClient
// ---------------------------------------------------------------------------

pub struct JiraClient {
    http: Client,
    base_url: String,
    auth: String,
    fields: FieldMap,
    page_size: u32,
}

impl JiraClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::SourceUnavailable(format!("http client: {e}")))?;
        let credentials = format!("{}:{}", config.user_name, config.api_token);
        let auth = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            fields: FieldMap::from(config),
            page_size: config.page_size.max(1),
        })
    }

    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::blocking::Response> {
        self.http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.auth)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                SyncError::SourceUnavailable(format!("GET {url} {kind}: {e}"))
            })
    }
}

impl SourceClient for JiraClient {
    fn fetch(&self, filter: &MembershipFilter) -> Result<Vec<SourceRecord>> {
        let url = format!("{}/rest/api/3/search", self.base_url);
        let jql = filter.to_jql();
        tracing::debug!(%jql, "querying source");

        let mut records = Vec::new();
        let mut start_at: u64 = 0;
        loop {
            let resp = self.get(
                &url,
                &[
                    ("jql", jql.clone()),
                    ("startAt", start_at.to_string()),
                    ("maxResults", self.page_size.to_string()),
                ],
            )?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(SyncError::SourceUnavailable(format!(
                    "search returned HTTP {status}: {body}"
                )));
            }
            let page: Value = resp.json().map_err(|e| {
                SyncError::SourceResponseMalformed(format!("search body is not JSON: {e}"))
            })?;
            let issues = page.get("issues").and_then(Value::as_array).ok_or_else(|| {
                SyncError::SourceResponseMalformed("search response has no issues array".to_string())
            })?;

            records.extend(normalize_issues(issues, &self.fields, &self.base_url));

            let fetched = issues.len() as u64;
            let total = page
                .get("total")
                .and_then(Value::as_u64)
                .unwrap_or(start_at + fetched);
            start_at += fetched;
            if fetched == 0 || start_at >= total {
                break;
            }
        }

        log_snapshot(&records);
        Ok(records)
    }

    fn lookup(&self, key: &str) -> Result<Option<SourceRecord>> {
        let url = format!("{}/rest/api/3/issue/{key}", self.base_url);
        let resp = self.get(&url, &[])?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::SourceUnavailable(format!(
                "issue {key} returned HTTP {status}"
            )));
        }
        let issue: Value = resp.json().map_err(|e| {
            SyncError::SourceResponseMalformed(format!("issue {key} body is not JSON: {e}"))
        })?;
        normalize_issue(&issue, &self.fields, &self.base_url).map(Some)
    }
}

fn log_snapshot(records: &[SourceRecord]) {
    let windows = crate::window::active_windows(records);
    tracing::info!(
        total = records.len(),
        active_sprints = ?windows,
        "fetched source snapshot"
    );
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *by_type.entry(r.issue_type.as_str()).or_default() += 1;
    }
    for (ty, count) in by_type {
        tracing::debug!(issue_type = ty, count, "source issues by type");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
