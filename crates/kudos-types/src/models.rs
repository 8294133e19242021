use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workspace member as the engine knows them. Created lazily the first
/// time a handle is resolved; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// The chat platform's own id for this user (unique).
    pub platform_id: String,
    pub username: String,
}

/// Profile data the session collaborator returns for an unseen handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub platform_id: String,
    pub username: String,
    pub is_bot: bool,
}

/// Channel metadata from the session collaborator, consulted before
/// enabling a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_direct: bool,
    pub is_group_direct: bool,
    pub is_private: bool,
}

/// Who the bot is in this workspace. Arrives with the connected event and
/// is required before any command can be recognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Platform id of the bot's own user, used to recognize `<@bot> ...`
    /// commands.
    pub bot_id: String,
    pub bot_name: String,
    pub team_name: String,
}
