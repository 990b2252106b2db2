//! Work-log side: the Notion database holding one page per ticket.

use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use crate::types::{RecordFields, StoreRecord};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Property names
// ---------------------------------------------------------------------------

pub const PROP_TICKET: &str = "Ticket";
pub const PROP_TITLE: &str = "Title";
pub const PROP_POINTS: &str = "SP";
pub const PROP_OWNER: &str = "Owner";
pub const PROP_STATUS: &str = "Status";
pub const PROP_SPRINT: &str = "Sprint";
pub const PROP_TAGS: &str = "Tags";

// ---------------------------------------------------------------------------
// StoreClient
// ---------------------------------------------------------------------------

pub trait StoreClient {
    /// Every page in the database. Pages without a ticket key are skipped.
    fn fetch_all(&self) -> Result<Vec<StoreRecord>>;

    fn create(&self, fields: &RecordFields) -> Result<()>;

    fn update(&self, store_id: &str, fields: &RecordFields) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

/// Concatenated text of a rich-text or title array.
fn text_of(segments: Option<&Value>) -> Option<String> {
    let segments = segments?.as_array()?;
    if segments.is_empty() {
        return None;
    }
    let text: String = segments
        .iter()
        .filter_map(|s| {
            s.get("plain_text")
                .or_else(|| s.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect();
    Some(text)
}

fn select_name(prop: Option<&Value>) -> Option<String> {
    prop?
        .get("select")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Parse one database page. `None` when the page has no usable id or ticket
/// key; such pages are not part of the synced set.
pub fn parse_page(page: &Value) -> Option<StoreRecord> {
    let store_id = page.get("id").and_then(Value::as_str)?;
    let props = page.get("properties")?;

    let ticket = props.get(PROP_TICKET).and_then(|p| p.get("title"));
    let key = text_of(ticket)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())?;
    let url = ticket
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|s| s.get("text")?.get("link")?.get("url")?.as_str())
        .map(str::to_string);

    let title = text_of(props.get(PROP_TITLE).and_then(|p| p.get("rich_text"))).unwrap_or_default();
    let status = select_name(props.get(PROP_STATUS)).unwrap_or_default();
    let story_points = props
        .get(PROP_POINTS)
        .and_then(|p| p.get("number"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let owner = select_name(props.get(PROP_OWNER));
    let window = select_name(props.get(PROP_SPRINT));
    let tags: BTreeSet<String> = props
        .get(PROP_TAGS)
        .and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(StoreRecord {
        store_id: store_id.to_string(),
        key,
        url,
        title,
        status,
        story_points,
        owner,
        window,
        tags,
    })
}

// ---------------------------------------------------------------------------
// Property building
// ---------------------------------------------------------------------------

/// Select and multi-select option names may not contain commas. Comma
/// separated parts are joined with a single space instead.
pub fn option_name(value: &str) -> String {
    if !value.contains(',') {
        return value.to_string();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The fields as they will read back after a write: every select value
/// passed through [`option_name`].
pub fn select_safe(mut fields: RecordFields) -> RecordFields {
    fields.status = option_name(&fields.status);
    fields.owner = fields.owner.map(|o| option_name(&o));
    fields.window = fields.window.map(|w| option_name(&w));
    fields.tags = fields
        .tags
        .iter()
        .map(|t| option_name(t))
        .filter(|t| !t.is_empty())
        .collect();
    fields
}

fn select(name: Option<&str>) -> Value {
    match name.map(option_name) {
        Some(n) if !n.is_empty() => json!({ "select": { "name": n } }),
        _ => json!({ "select": null }),
    }
}

/// Page properties for a create or update.
pub fn properties(fields: &RecordFields) -> Value {
    let mut link = Value::Null;
    if !fields.url.is_empty() {
        link = json!({ "url": fields.url });
    }

    let mut props = Map::new();
    props.insert(
        PROP_TICKET.to_string(),
        json!({ "title": [{ "text": { "content": fields.key, "link": link } }] }),
    );
    props.insert(
        PROP_TITLE.to_string(),
        json!({ "rich_text": [{ "text": { "content": fields.title } }] }),
    );
    props.insert(
        PROP_POINTS.to_string(),
        json!({ "number": fields.story_points }),
    );
    props.insert(PROP_OWNER.to_string(), select(fields.owner.as_deref()));
    props.insert(PROP_STATUS.to_string(), select(Some(fields.status.as_str())));
    props.insert(PROP_SPRINT.to_string(), select(fields.window.as_deref()));
    let tags: BTreeSet<String> = fields
        .tags
        .iter()
        .map(|t| option_name(t))
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        let options: Vec<Value> = tags.iter().map(|t| json!({ "name": t })).collect();
        props.insert(PROP_TAGS.to_string(), json!({ "multi_select": options }));
    }
    Value::Object(props)
}

// ---------------------------------------------------------------------------
// NotionClient
// ---------------------------------------------------------------------------

pub struct NotionClient {
    http: Client,
    base_url: String,
    token: String,
    database_id: String,
    api_version: String,
}

impl NotionClient {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::StoreUnavailable(format!("http client: {e}")))?;
        let token = if config.token.starts_with("Bearer ") {
            config.token.clone()
        } else {
            format!("Bearer {}", config.token)
        };
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            database_id: config.database_id.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, &self.token)
            .header("Notion-Version", &self.api_version)
    }

    /// Send a write and map any failure to a rejection for `target`.
    fn write(&self, req: RequestBuilder, target: &str) -> Result<()> {
        let resp: Response = self.authed(req).send().map_err(|e| {
            let kind = if e.is_timeout() { "timed out" } else { "failed" };
            SyncError::write_rejected(target, format!("request {kind}: {e}"))
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::write_rejected(
                target,
                format!("HTTP {status}: {body}"),
            ));
        }
        Ok(())
    }
}

impl StoreClient for NotionClient {
    fn fetch_all(&self) -> Result<Vec<StoreRecord>> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let body = match &cursor {
                Some(c) => json!({ "start_cursor": c }),
                None => json!({}),
            };
            let resp = self
                .authed(self.http.post(&url))
                .json(&body)
                .send()
                .map_err(|e| {
                    let kind = if e.is_timeout() { "timed out" } else { "failed" };
                    SyncError::StoreUnavailable(format!("POST {url} {kind}: {e}"))
                })?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().unwrap_or_default();
                return Err(SyncError::StoreUnavailable(format!(
                    "database query returned HTTP {status}: {text}"
                )));
            }
            let page: Value = resp
                .json()
                .map_err(|e| SyncError::StoreUnavailable(format!("query body is not JSON: {e}")))?;
            let results = page.get("results").and_then(Value::as_array).ok_or_else(|| {
                SyncError::StoreUnavailable("query response has no results array".to_string())
            })?;

            for item in results {
                match parse_page(item) {
                    Some(record) => records.push(record),
                    None => {
                        let page_id = item.get("id").and_then(Value::as_str).unwrap_or("unknown");
                        tracing::warn!(page_id = %page_id, "skipping page without ticket key");
                    }
                }
            }

            let has_more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = page
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }
        tracing::info!(total = records.len(), "fetched store snapshot");
        Ok(records)
    }

    fn create(&self, fields: &RecordFields) -> Result<()> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties(fields),
        });
        self.write(self.http.post(&url).json(&body), &fields.key)
    }

    fn update(&self, store_id: &str, fields: &RecordFields) -> Result<()> {
        let url = format!("{}/pages/{store_id}", self.base_url);
        let body = json!({ "properties": properties(fields) });
        self.write(self.http.patch(&url).json(&body), store_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
