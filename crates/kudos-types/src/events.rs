use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// One inbound chat message, as delivered by the session collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel_id: String,
    /// Platform id of the author.
    pub sender: String,
    pub text: String,
    /// Platform timestamp of the message, used for permalinks.
    pub ts: String,
    /// Edits, deletions and other non-display messages arrive hidden and
    /// are skipped.
    #[serde(default)]
    pub hidden: bool,
}

/// Events delivered by the session collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session is established; carries the bot's identity.
    Connected { identity: Identity },

    /// A message was posted somewhere the bot can see
    Message(MessageEvent),

    /// Periodic connection latency report
    LatencyReport { millis: u64 },

    /// A transport-level error the session already recovered from
    SessionError { message: String },

    /// The platform rejected the bot's credentials
    InvalidAuth,
}
