//! LLM abstraction: OpenAI-compatible chat completions (streaming).

mod openai;

pub use openai::{ChatMessage, OpenAiClient, OpenAiError};
