//! Inbound event dispatch: validate, dedupe, branch, and answer in the background.
//!
//! The webhook handler hands every event here and returns immediately; each
//! accepted event runs on its own spawned task. Nothing in this module ever
//! propagates an error back to the HTTP path — failures end in a logged
//! fallback message or silence.

use crate::channels::MessageSink;
use crate::engine;
use crate::format::format_for_slack;
use crate::llm::OpenAiClient;
use crate::search::TavilyClient;
use crate::session::{SessionKey, SessionStore};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Substrings (matched case-insensitively) that route a message to the
/// search-augmented branch.
const SEARCH_KEYWORDS: [&str; 7] = [
    "recent", "search", "update", "now", "latest", "news", "current",
];

/// Direct-message channel ids start with this.
const DM_PREFIX: char = 'D';

/// Posted when the search branch finds nothing to summarize.
pub const FALLBACK_NO_RESULTS: &str =
    "I couldn't find any relevant information for that. Try rephrasing or asking about something else.";

/// Posted when the model call fails or comes back blank.
pub const FALLBACK_ERROR: &str =
    "Sorry, something went wrong while putting a reply together. Please try again in a moment.";

/// Webhook body: either a URL-verification challenge or an event callback.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub event: Option<SlackEvent>,
}

/// One Slack event as delivered to the webhook. Fields beyond these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
}

/// A validated event the relay will answer.
#[derive(Debug)]
struct Conversational {
    channel: String,
    user: String,
    text: String,
    client_msg_id: Option<String>,
}

/// True when the event addresses the bot: a direct-message channel, an
/// im-type channel, or an explicit mention anywhere.
fn is_conversational(event: &SlackEvent) -> bool {
    event
        .channel
        .as_deref()
        .map_or(false, |c| c.starts_with(DM_PREFIX))
        || event.channel_type.as_deref() == Some("im")
        || event.kind == "app_mention"
}

/// True when the text asks for something time-sensitive enough to search for.
fn wants_retrieval(text: &str) -> bool {
    let lower = text.to_lowercase();
    SEARCH_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Validate an event down to the fields a handler needs, or reject it.
/// Rejected events are not errors: system subtypes, the bot's own messages,
/// and non-conversational channels are all expected traffic.
fn classify(event: &SlackEvent, bot_user_id: &str) -> Option<Conversational> {
    if event.kind != "message" && event.kind != "app_mention" {
        return None;
    }
    if event.subtype.is_some() {
        return None;
    }
    let text = event.text.as_deref().filter(|t| !t.is_empty())?;
    let user = event.user.as_deref()?;
    if user == bot_user_id {
        return None;
    }
    if !is_conversational(event) {
        return None;
    }
    let channel = event.channel.as_deref()?;
    Some(Conversational {
        channel: channel.to_string(),
        user: user.to_string(),
        text: text.to_string(),
        client_msg_id: event.client_msg_id.clone(),
    })
}

/// Owns the shared state event handling needs: the session store, the
/// dedupe set, and the outbound collaborators.
pub struct Dispatcher {
    sessions: SessionStore,
    sink: Arc<dyn MessageSink>,
    llm: OpenAiClient,
    search: Option<TavilyClient>,
    model: String,
    bot_user_id: String,
    processed: RwLock<HashSet<String>>,
}

impl Dispatcher {
    pub fn new(
        sessions: SessionStore,
        sink: Arc<dyn MessageSink>,
        llm: OpenAiClient,
        search: Option<TavilyClient>,
        model: String,
        bot_user_id: String,
    ) -> Self {
        Self {
            sessions,
            sink,
            llm,
            search,
            model,
            bot_user_id,
            processed: RwLock::new(HashSet::new()),
        }
    }

    /// Fire-and-forget: hand the event to a background task and return.
    /// The task's failures are logged and dropped; the caller never blocks
    /// on processing and never sees an error.
    pub fn dispatch(self: Arc<Self>, event: SlackEvent) {
        tokio::spawn(async move {
            self.handle_event(event).await;
        });
    }

    async fn handle_event(&self, event: SlackEvent) {
        let Some(msg) = classify(&event, &self.bot_user_id) else {
            log::debug!("dispatch: ignoring event kind {:?}", event.kind);
            return;
        };
        if let Some(id) = msg.client_msg_id.clone() {
            if !self.processed.write().await.insert(id) {
                log::debug!("dispatch: duplicate delivery for {}, skipping", msg.channel);
                return;
            }
        }
        log::info!("user ({} in {}): {}", msg.user, msg.channel, msg.text);

        let key = SessionKey::new(&msg.channel, &msg.user);
        let reply = self.conversational_reply(&key, &msg.text).await;
        if let Err(e) = self.sink.post_message(&msg.channel, &reply).await {
            log::warn!("delivery to {} failed: {}", msg.channel, e);
        }
    }

    /// Produce the text to post: a formatted model reply, or one of the
    /// fixed fallbacks when search or the model lets us down.
    async fn conversational_reply(&self, key: &SessionKey, text: &str) -> String {
        let retrieval = if wants_retrieval(text) {
            let results = match &self.search {
                Some(client) => client.search_or_empty(text).await,
                None => {
                    log::warn!("search branch selected but no search API key is configured");
                    Vec::new()
                }
            };
            if results.is_empty() {
                return FALLBACK_NO_RESULTS.to_string();
            }
            Some(results)
        } else {
            None
        };

        match engine::run_turn(
            &self.sessions,
            key,
            &self.llm,
            &self.model,
            text,
            retrieval.as_deref(),
        )
        .await
        {
            Ok(raw) => {
                log::debug!("reply before formatting: {}", raw);
                let formatted = format_for_slack(&raw);
                log::debug!("reply after formatting: {}", formatted);
                formatted
            }
            Err(e) => {
                log::warn!("model turn failed: {}", e);
                FALLBACK_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::SlackError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn event(json: &str) -> SlackEvent {
        serde_json::from_str(json).expect("event")
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        assert!(wants_retrieval("LATEST news on X"));
        assert!(wants_retrieval("any Updates?"));
        assert!(wants_retrieval("what is happening right NOW"));
        assert!(!wants_retrieval("hello there"));
        assert!(!wants_retrieval("tell me a joke"));
    }

    #[test]
    fn direct_message_is_conversational() {
        let e = event(r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"hi"}"#);
        assert!(is_conversational(&e));
    }

    #[test]
    fn im_channel_type_is_conversational() {
        let e = event(
            r#"{"type":"message","channel":"G111","channel_type":"im","user":"U1","text":"hi"}"#,
        );
        assert!(is_conversational(&e));
    }

    #[test]
    fn mention_in_public_channel_is_conversational() {
        let e = event(r#"{"type":"app_mention","channel":"C024BE91L","user":"U1","text":"hi"}"#);
        assert!(is_conversational(&e));
    }

    #[test]
    fn plain_public_channel_message_is_not() {
        let e = event(r#"{"type":"message","channel":"C024BE91L","user":"U1","text":"hi"}"#);
        assert!(classify(&e, "U0BOT").is_none());
    }

    #[test]
    fn self_authored_events_are_rejected() {
        let e = event(r#"{"type":"message","channel":"D024BE91L","user":"U0BOT","text":"hi"}"#);
        assert!(classify(&e, "U0BOT").is_none());
    }

    #[test]
    fn subtype_events_are_rejected() {
        let e = event(
            r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"hi","subtype":"message_changed"}"#,
        );
        assert!(classify(&e, "U0BOT").is_none());
    }

    #[test]
    fn textless_and_unknown_kinds_are_rejected() {
        assert!(classify(
            &event(r#"{"type":"message","channel":"D024BE91L","user":"U1"}"#),
            "U0BOT"
        )
        .is_none());
        assert!(classify(
            &event(r#"{"type":"reaction_added","channel":"D024BE91L","user":"U1","text":"x"}"#),
            "U0BOT"
        )
        .is_none());
    }

    #[test]
    fn valid_direct_message_classifies() {
        let e = event(
            r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"hello","client_msg_id":"id-1"}"#,
        );
        let msg = classify(&e, "U0BOT").expect("classified");
        assert_eq!(msg.channel, "D024BE91L");
        assert_eq!(msg.user, "U1");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.client_msg_id.as_deref(), Some("id-1"));
    }

    /// Records posted messages instead of calling Slack.
    struct RecordingSink {
        posts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                posts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
            self.posts
                .lock()
                .await
                .push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn dispatcher_with(sink: Arc<RecordingSink>, search: Option<TavilyClient>) -> Dispatcher {
        // Unroutable backends: any model or search call fails fast.
        Dispatcher::new(
            SessionStore::new(Duration::from_secs(60)),
            sink,
            OpenAiClient::new(Some("http://127.0.0.1:9".to_string()), "test-key".to_string()),
            search,
            "gpt-4o-mini".to_string(),
            "U0BOT".to_string(),
        )
    }

    #[tokio::test]
    async fn self_authored_event_produces_no_outbound_call() {
        let sink = RecordingSink::new();
        let d = dispatcher_with(sink.clone(), None);
        d.handle_event(event(
            r#"{"type":"message","channel":"D024BE91L","user":"U0BOT","text":"hi"}"#,
        ))
        .await;
        assert!(sink.posts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_client_msg_id_is_handled_once() {
        let sink = RecordingSink::new();
        let d = dispatcher_with(sink.clone(), None);
        let e = event(
            r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"hello","client_msg_id":"dup-1"}"#,
        );
        d.handle_event(e.clone()).await;
        d.handle_event(e).await;
        assert_eq!(sink.posts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_apology() {
        let sink = RecordingSink::new();
        let d = dispatcher_with(sink.clone(), None);
        d.handle_event(event(
            r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"hello"}"#,
        ))
        .await;
        let posts = sink.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "D024BE91L");
        assert_eq!(posts[0].1, FALLBACK_ERROR);
    }

    #[tokio::test]
    async fn retrieval_branch_without_results_posts_no_results_fallback() {
        let sink = RecordingSink::new();
        // Search client pointed at an unroutable port degrades to empty.
        let search = TavilyClient::new(Some("http://127.0.0.1:9".to_string()), "k".to_string());
        let d = dispatcher_with(sink.clone(), Some(search));
        d.handle_event(event(
            r#"{"type":"message","channel":"D024BE91L","user":"U1","text":"latest news on X"}"#,
        ))
        .await;
        let posts = sink.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, FALLBACK_NO_RESULTS);
    }
}
