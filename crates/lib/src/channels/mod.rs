//! Outbound delivery to the messaging platform.
//!
//! The sink trait is the seam between event handling and the Slack Web API,
//! so handlers can be exercised without the network.

mod slack;

pub use slack::{SlackChannel, SlackError};

use async_trait::async_trait;

/// Posts reply text to a channel. Failures are reported, never propagated
/// past the caller that logs them.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError>;
}
