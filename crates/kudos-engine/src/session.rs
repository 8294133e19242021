use anyhow::Result;
use async_trait::async_trait;

use kudos_types::models::{ChannelInfo, UserProfile};

/// Boundary to the chat platform. The engine never talks to the platform
/// directly; connection management, retries and wire formats all live
/// behind this trait.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Resolve a platform handle to its profile. Fails when the platform
    /// does not recognize the handle.
    async fn user_info(&self, handle: &str) -> Result<UserProfile>;

    /// Metadata for a channel, including whether it is a direct or
    /// group-direct conversation.
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo>;

    /// Deliver a private message to a user.
    async fn send_dm(&self, platform_id: &str, text: &str) -> Result<()>;

    /// Post into a channel, visible to everyone in it.
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()>;

    /// Post into a channel so only one user sees it.
    async fn post_ephemeral(&self, channel_id: &str, platform_id: &str, text: &str) -> Result<()>;

    /// Permanent link to a message, for "you received kudos" notices.
    fn message_permalink(&self, channel_id: &str, ts: &str) -> String;
}
