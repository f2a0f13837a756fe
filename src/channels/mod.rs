use async_trait::async_trait;

mod discord;

pub use discord::{DiscordChannel, DiscordSender};

/// Outbound chat transport. Implementations deliver a finished text
/// message to wherever the conversation lives; callers never see
/// transport-specific types.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
}
