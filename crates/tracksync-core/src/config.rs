use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "tracksync.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Tracker site root, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing)]
    pub api_token: String,
    /// Account ids whose tickets are tracked. Falls back to the roster's
    /// `jira_user_id`s when empty.
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default = "default_open_sprints_only")]
    pub open_sprints_only: bool,
    #[serde(default = "default_excluded_types")]
    pub excluded_types: Vec<String>,
    #[serde(default = "default_sprint_field")]
    pub sprint_field: String,
    #[serde(default = "default_story_points_field")]
    pub story_points_field: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

fn default_open_sprints_only() -> bool {
    true
}

fn default_excluded_types() -> Vec<String> {
    vec!["Sub-task".to_string()]
}

fn default_sprint_field() -> String {
    "customfield_10008".to_string()
}

fn default_story_points_field() -> String {
    "customfield_10027".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_source_timeout() -> u64 {
    30
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_name: String::new(),
            api_token: String::new(),
            assignees: Vec::new(),
            open_sprints_only: default_open_sprints_only(),
            excluded_types: default_excluded_types(),
            sprint_field: default_sprint_field(),
            story_points_field: default_story_points_field(),
            page_size: default_page_size(),
            timeout_secs: default_source_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_store_api_version")]
    pub api_version: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_url() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_store_api_version() -> String {
    "2021-05-13".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            token: String::new(),
            database_id: String::new(),
            api_version: default_store_api_version(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// NotifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: default_notify_url(),
            token: String::new(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// UserConfig / LoggingConfig
// ---------------------------------------------------------------------------

/// One member of the owner roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Display name as it appears in the store's Owner column.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily log files. Stderr only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source: SourceConfig::new(source_url),
            store: StoreConfig::default(),
            notify: NotifyConfig::default(),
            users: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Read the YAML file at `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Overlay credentials and the roster from `lookup` (the process
    /// environment in production). Set, non-empty values win over the file.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JIRA_USER_NAME") {
            self.source.user_name = v;
        }
        if let Some(v) = get("JIRA_API_TOKEN") {
            self.source.api_token = v;
        }
        if let Some(v) = get("NOTION_TOKEN") {
            self.store.token = v;
        }
        if let Some(v) = get("NOTION_DATABASE_ID") {
            self.store.database_id = v;
        }
        if let Some(v) = get("SLACK_TOKEN") {
            self.notify.token = v;
        }
        if let Some(v) = get("JIRA_USERS") {
            self.users = serde_json::from_str(&v)
                .map_err(|e| SyncError::InvalidConfig(format!("JIRA_USERS: {e}")))?;
        }
        Ok(())
    }

    /// Assignees to query: the explicit list, else the roster's tracker ids.
    pub fn assignees(&self) -> Vec<String> {
        if !self.source.assignees.is_empty() {
            return self.source.assignees.clone();
        }
        self.users
            .iter()
            .filter_map(|u| u.jira_user_id.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.source.base_url.trim().is_empty() {
            warnings.push(ConfigWarning::error("source.base_url is empty"));
        }
        if self.source.user_name.trim().is_empty() || self.source.api_token.trim().is_empty() {
            warnings.push(ConfigWarning::error(
                "source credentials missing: set JIRA_USER_NAME and JIRA_API_TOKEN",
            ));
        }
        if self.store.token.trim().is_empty() {
            warnings.push(ConfigWarning::error(
                "store token missing: set NOTION_TOKEN",
            ));
        }
        if self.store.database_id.trim().is_empty() {
            warnings.push(ConfigWarning::error(
                "store database id missing: set store.database_id or NOTION_DATABASE_ID",
            ));
        }

        // An empty assignee list would track every ticket on the site.
        if self.assignees().is_empty() {
            warnings.push(ConfigWarning::warning(
                "no assignees configured: the source query is unfiltered by owner",
            ));
        }

        if self.source.page_size == 0 {
            warnings.push(ConfigWarning::error("source.page_size must be at least 1"));
        }

        for (name, secs) in [
            ("source", self.source.timeout_secs),
            ("store", self.store.timeout_secs),
            ("notify", self.notify.timeout_secs),
        ] {
            if secs == 0 {
                warnings.push(ConfigWarning::warning(format!(
                    "{name}.timeout_secs is 0: calls will fail immediately"
                )));
            }
        }

        for user in &self.users {
            if user.slack_user_id.as_deref().unwrap_or("").is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "user '{}' has no slack_user_id and will not receive reports",
                    user.name
                )));
            }
        }

        if !self.users.is_empty() && self.notify.token.trim().is_empty() {
            warnings.push(ConfigWarning::warning(
                "notify token missing: set SLACK_TOKEN to deliver reports",
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
