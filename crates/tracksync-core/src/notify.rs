//! Direct-message delivery over the Slack Web API.

use crate::config::NotifyConfig;
use crate::error::{Result, SyncError};
use reqwest::blocking::Client;
use serde_json::{json, Value};

pub trait Notifier {
    /// Deliver `text` privately to `user_id`.
    fn send_direct(&self, user_id: &str, text: &str) -> Result<()>;
}

pub struct SlackNotifier {
    http: Client,
    base_url: String,
    token: String,
}

impl SlackNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::NotifyFailed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Call a Web API method. Slack reports most failures as HTTP 200 with
    /// `ok: false`, so both layers are checked.
    fn call(&self, method: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{method}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| SyncError::NotifyFailed(format!("{method}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::NotifyFailed(format!("{method}: HTTP {status}")));
        }
        let payload: Value = resp
            .json()
            .map_err(|e| SyncError::NotifyFailed(format!("{method}: {e}")))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(SyncError::NotifyFailed(format!("{method}: {reason}")));
        }
        Ok(payload)
    }
}

impl Notifier for SlackNotifier {
    fn send_direct(&self, user_id: &str, text: &str) -> Result<()> {
        if user_id.is_empty() || self.token.is_empty() {
            return Err(SyncError::NotifyFailed(
                "user id or token not provided".to_string(),
            ));
        }
        let opened = self.call("conversations.open", &json!({ "users": user_id }))?;
        let channel = opened
            .get("channel")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SyncError::NotifyFailed("conversations.open: no channel id".to_string())
            })?;
        self.call(
            "chat.postMessage",
            &json!({ "channel": channel, "text": text }),
        )?;
        tracing::info!(user_id, "direct message sent");
        Ok(())
    }
}
