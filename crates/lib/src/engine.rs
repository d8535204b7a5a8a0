//! Conversation engine: one turn against the model.
//!
//! Loads the session history, builds the prompt for the chosen branch (plain
//! chat or search summarization), streams the model reply, and records both
//! turns in the session store. Returns the raw reply; Slack formatting and
//! delivery happen downstream.

use crate::llm::{ChatMessage, OpenAiClient, OpenAiError};
use crate::search::SearchResult;
use crate::session::{SessionKey, SessionMessage, SessionStore};

const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer all questions to the best of your ability. Format your responses using Slack's markdown syntax: *bold* for bold, _italic_ for italic, `code` for code, and use • for bullet points.";

const RETRIEVAL_SYSTEM_PROMPT: &str = "You summarize web search results for a chat user. Read every result, extract the key facts that answer the user's question, and cite result titles when you draw on them. If the results conflict or leave the answer uncertain, say so plainly. Aim for a summary of three to five sentences.";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] OpenAiError),
    #[error("model returned an empty reply")]
    EmptyReply,
}

/// Render the user query plus search results as one synthesized turn.
fn retrieval_turn(user_text: &str, results: &[SearchResult]) -> String {
    let mut turn = format!("Query: {}\n\nSearch results:", user_text);
    for r in results {
        turn.push_str(&format!(
            "\n\nTitle: {}\nURL: {}\nContent: {}",
            r.title, r.url, r.content
        ));
    }
    turn
}

/// System prompt for the branch, then prior turns, then the new user turn.
fn build_messages(
    history: &[SessionMessage],
    user_turn: &str,
    retrieval: bool,
) -> Vec<ChatMessage> {
    let system = if retrieval {
        RETRIEVAL_SYSTEM_PROMPT
    } else {
        PLAIN_SYSTEM_PROMPT
    };
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    for m in history {
        messages.push(ChatMessage::new(&m.role, &m.content));
    }
    messages.push(ChatMessage::new("user", user_turn));
    messages
}

/// Run one turn: stream the model call, accumulate the reply, and append the
/// user turn (as sent to the model) and the assistant turn to the session.
/// On the retrieval branch a blank reply counts as a failure; nothing is
/// appended and the caller falls back to a fixed message.
pub async fn run_turn(
    store: &SessionStore,
    key: &SessionKey,
    client: &OpenAiClient,
    model: &str,
    user_text: &str,
    retrieval: Option<&[SearchResult]>,
) -> Result<String, EngineError> {
    let history = store.history(key).await;
    let user_turn = match retrieval {
        Some(results) => retrieval_turn(user_text, results),
        None => user_text.to_string(),
    };
    let messages = build_messages(&history, &user_turn, retrieval.is_some());
    log::debug!(
        "engine: model {} with {} prior turn(s), retrieval: {}",
        model,
        history.len(),
        retrieval.is_some()
    );

    let mut reply = String::new();
    let mut on_chunk = |chunk: &str| reply.push_str(chunk);
    client.chat_stream(model, messages, &mut on_chunk).await?;

    if retrieval.is_some() && reply.trim().is_empty() {
        return Err(EngineError::EmptyReply);
    }
    store.append(key, SessionMessage::user(user_turn)).await;
    store
        .append(key, SessionMessage::assistant(reply.clone()))
        .await;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, content: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn plain_branch_uses_persona_prompt_and_raw_text() {
        let history = vec![
            SessionMessage::user("earlier question"),
            SessionMessage::assistant("earlier answer"),
        ];
        let messages = build_messages(&history, "hello", false);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("helpful assistant"));
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "hello");
    }

    #[test]
    fn retrieval_branch_uses_summarization_prompt() {
        let messages = build_messages(&[], "latest news", true);
        assert!(messages[0].content.contains("search results"));
        assert!(messages[0].content.contains("three to five sentences"));
    }

    #[test]
    fn retrieval_turn_includes_every_result_block() {
        let results = vec![
            result("First", "https://one.example", "alpha"),
            result("Second", "https://two.example", "beta"),
        ];
        let turn = retrieval_turn("latest news on X", &results);
        assert!(turn.starts_with("Query: latest news on X"));
        assert!(turn.contains("Title: First\nURL: https://one.example\nContent: alpha"));
        assert!(turn.contains("Title: Second\nURL: https://two.example\nContent: beta"));
    }
}
