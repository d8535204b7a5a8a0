//! Conversation sessions and message history for the relay.
//!
//! Sessions are keyed by (channel, user) and hold the ordered turns of one
//! conversation. History older than the idle timeout is discarded on next
//! access; every access stamps the activity time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Identifies one conversational context: a Slack channel plus the user talking in it.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionKey {
    pub channel: String,
    pub user: String,
}

impl SessionKey {
    pub fn new(channel: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user: user.into(),
        }
    }
}

/// A single turn in a session (role + content).
#[derive(Debug, Clone)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

struct SessionRecord {
    turns: Vec<SessionMessage>,
    last_activity: Instant,
}

/// In-memory store for sessions. The map grows without bound; idle entries
/// are reset on next access, never removed.
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionKey, SessionRecord>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Return the session's turns, creating an empty session if the key is
    /// unknown. A record idle longer than the timeout is replaced with an
    /// empty one, never merged with the stale history. Stamps activity.
    pub async fn history(&self, key: &SessionKey) -> Vec<SessionMessage> {
        let mut g = self.inner.write().await;
        let now = Instant::now();
        let record = g.entry(key.clone()).or_insert_with(|| SessionRecord {
            turns: Vec::new(),
            last_activity: now,
        });
        if now.duration_since(record.last_activity) > self.idle_timeout {
            record.turns.clear();
        }
        record.last_activity = now;
        record.turns.clone()
    }

    /// Append a turn to the session, creating it if absent. Stamps activity.
    pub async fn append(&self, key: &SessionKey, message: SessionMessage) {
        let mut g = self.inner.write().await;
        let now = Instant::now();
        let record = g.entry(key.clone()).or_insert_with(|| SessionRecord {
            turns: Vec::new(),
            last_activity: now,
        });
        record.turns.push(message);
        record.last_activity = now;
    }
}
