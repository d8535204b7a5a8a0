//! Gateway HTTP server: the Slack events webhook and a greeting probe.

use crate::channels::SlackChannel;
use crate::config::{self, Config};
use crate::dispatch::{Dispatcher, EventEnvelope};
use crate::llm::OpenAiClient;
use crate::search::TavilyClient;
use crate::session::SessionStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const GREETING: &str = "Hello, I'm Heron, a Slack relay bot!";

const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
struct GatewayState {
    dispatcher: Arc<Dispatcher>,
}

/// Model name from config, or the default.
fn resolve_model(config: &Config) -> String {
    config
        .model
        .default_model
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Missing Slack credentials or model key fail startup here; everything after
/// startup is best-effort. Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bot_token = config::resolve_slack_bot_token(&config)
        .context("slack bot token not configured (set SLACK_BOT_TOKEN or slack.botToken)")?;
    let bot_user_id = config::resolve_bot_user_id(&config).context(
        "bot user id not configured (set SLACK_BOT_USER_ID or slack.botUserId; `heron whoami` prints it)",
    )?;
    let model_api_key = config::resolve_model_api_key(&config)
        .context("model API key not configured (set OPENAI_API_KEY or model.apiKey)")?;

    let slack = Arc::new(SlackChannel::new(config.slack.base_url.clone(), bot_token));
    let llm = OpenAiClient::new(config.model.base_url.clone(), model_api_key);
    let search = config::resolve_search_api_key(&config)
        .map(|key| TavilyClient::new(config.search.base_url.clone(), key));
    if search.is_none() {
        log::warn!(
            "no search API key configured; search-triggering messages will get the no-results fallback"
        );
    }
    let sessions = SessionStore::new(Duration::from_secs(
        config.sessions.idle_timeout_minutes * 60,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        sessions,
        slack,
        llm,
        search,
        resolve_model(&config),
        bot_user_id,
    ));

    let state = GatewayState { dispatcher };
    let app = Router::new()
        .route("/", get(greeting_http))
        .route("/slack/events", post(slack_events))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// In-flight event tasks are fire-and-forget and are not drained.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / — fixed greeting; doubles as a liveness probe.
async fn greeting_http() -> &'static str {
    GREETING
}

/// POST /slack/events — echo URL-verification challenges; hand event
/// callbacks to the dispatcher and answer 200 with an empty body before any
/// processing runs. Processing failures never reach this response.
async fn slack_events(State(state): State<GatewayState>, body: Bytes) -> Response {
    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    if let Some(challenge) = envelope.challenge {
        return Json(json!({ "challenge": challenge })).into_response();
    }
    if let Some(event) = envelope.event {
        state.dispatcher.dispatch(event);
    }
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_defaults_when_unset_or_blank() {
        let mut config = Config::default();
        assert_eq!(resolve_model(&config), "gpt-4o-mini");
        config.model.default_model = Some("  ".to_string());
        assert_eq!(resolve_model(&config), "gpt-4o-mini");
        config.model.default_model = Some("gpt-4.1".to_string());
        assert_eq!(resolve_model(&config), "gpt-4.1");
    }
}
