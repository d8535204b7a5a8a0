//! Slack Web API client: chat.postMessage and auth.test.

use crate::channels::MessageSink;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Client for the Slack Web API, authenticated with a bot token.
#[derive(Clone)]
pub struct SlackChannel {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

/// Slack wraps errors in a 200 with `ok: false` and an error code.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackChannel {
    pub fn new(base_url: Option<String>, token: String) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        Self {
            base_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// POST chat.postMessage — send mrkdwn-formatted text to a channel.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let url = format!("{}/chat.postMessage", self.base_url);
        let body = json!({ "channel": channel, "text": text, "mrkdwn": true });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{} {}", status, body)));
        }
        let data: ApiResponse = res.json().await?;
        if !data.ok {
            return Err(SlackError::Api(
                data.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    /// POST auth.test — resolve the bot's own user id from its token.
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let url = format!("{}/auth.test", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{} {}", status, body)));
        }
        let data: AuthTestResponse = res.json().await?;
        if !data.ok {
            return Err(SlackError::Api(
                data.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        data.user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SlackError::Api("auth.test returned no user_id".to_string()))
    }
}

#[async_trait]
impl MessageSink for SlackChannel {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        SlackChannel::post_message(self, channel, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_envelope_parses() {
        let data: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).expect("parse");
        assert!(!data.ok);
        assert_eq!(data.error.as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn auth_test_response_parses() {
        let data: AuthTestResponse =
            serde_json::from_str(r#"{"ok":true,"user_id":"U0BOT","user":"heron"}"#).expect("parse");
        assert!(data.ok);
        assert_eq!(data.user_id.as_deref(), Some("U0BOT"));
    }
}
