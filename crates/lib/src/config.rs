//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.heron/config.json`) and environment.
//! Credentials can always be supplied via environment variables; the file holds
//! everything else (bind, port, model, timeouts).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Slack workspace settings (bot token, bot user id).
    #[serde(default)]
    pub slack: SlackConfig,

    /// Model backend settings (API key, base URL, model name).
    #[serde(default)]
    pub model: ModelConfig,

    /// Web-search settings (API key, base URL).
    #[serde(default)]
    pub search: SearchConfig,

    /// Session settings (idle timeout).
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the HTTP event endpoint (default 5000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). Use "0.0.0.0" behind a reverse
    /// proxy so Slack can reach the event URL.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Slack workspace config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-…). Overridden by SLACK_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// The bot's own user id, used to ignore self-authored events.
    /// Overridden by SLACK_BOT_USER_ID env when set. `heron whoami` prints it.
    pub bot_user_id: Option<String>,
    /// Web API base URL (default https://slack.com/api; tests and proxies).
    pub base_url: Option<String>,
}

/// Model backend config (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// API key. Overridden by OPENAI_API_KEY env when set.
    pub api_key: Option<String>,
    /// Base URL ending in /v1 (default https://api.openai.com/v1).
    pub base_url: Option<String>,
    /// Model name (default "gpt-4o-mini").
    pub default_model: Option<String>,
}

/// Web-search config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// API key. Overridden by TAVILY_API_KEY env when set. When absent the
    /// retrieval branch degrades to the no-results fallback.
    pub api_key: Option<String>,
    /// Base URL (default https://api.tavily.com).
    pub base_url: Option<String>,
}

/// Session store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    /// Minutes of inactivity after which a conversation's history is discarded (default 30).
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
}

fn default_idle_timeout_minutes() -> u64 {
    30
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_nonempty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_bot_token(config: &Config) -> Option<String> {
    env_nonempty("SLACK_BOT_TOKEN").or_else(|| config_nonempty(config.slack.bot_token.as_ref()))
}

/// Resolve the bot's own user id: env SLACK_BOT_USER_ID overrides config.
pub fn resolve_bot_user_id(config: &Config) -> Option<String> {
    env_nonempty("SLACK_BOT_USER_ID").or_else(|| config_nonempty(config.slack.bot_user_id.as_ref()))
}

/// Resolve the model API key: env OPENAI_API_KEY overrides config.
pub fn resolve_model_api_key(config: &Config) -> Option<String> {
    env_nonempty("OPENAI_API_KEY").or_else(|| config_nonempty(config.model.api_key.as_ref()))
}

/// Resolve the search API key: env TAVILY_API_KEY overrides config.
pub fn resolve_search_api_key(config: &Config) -> Option<String> {
    env_nonempty("TAVILY_API_KEY").or_else(|| config_nonempty(config.search.api_key.as_ref()))
}

/// Resolve config path from env or default (~/.heron/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("HERON_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".heron").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or HERON_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
