//! Heron core library — Slack event dispatch, sessions, LLM, search,
//! and delivery used by the CLI.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod format;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod search;
pub mod session;
