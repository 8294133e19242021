use anyhow::{Context, Result};

/// Runtime configuration, read once at startup. Everything has a
/// development default so a bare `kudosbot` starts locally.
pub struct Config {
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub daily_quota: u32,
    /// Base URL of the platform's web API.
    pub platform_url: String,
    /// Base URL of the workspace itself, for message permalinks.
    pub workspace_url: String,
    pub bot_token: String,
    /// The platform's emoji listing rejects bot tokens, so custom emoji
    /// pulls use this separate user-level token.
    pub user_token: String,
    pub emoji_catalog_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            db_path: env_or("KUDOS_DB_PATH", "kudos.db"),
            host: env_or("KUDOS_HOST", "0.0.0.0"),
            port: env_or("KUDOS_PORT", "8080")
                .parse()
                .context("KUDOS_PORT must be a port number")?,
            daily_quota: env_or("KUDOS_DAILY_QUOTA", "5")
                .parse()
                .context("KUDOS_DAILY_QUOTA must be a number")?,
            platform_url: env_or("KUDOS_PLATFORM_URL", "https://chat.example/api"),
            workspace_url: env_or("KUDOS_WORKSPACE_URL", "https://chat.example"),
            bot_token: env_or("KUDOS_BOT_TOKEN", "dev-bot-token"),
            user_token: env_or("KUDOS_USER_TOKEN", "dev-user-token"),
            emoji_catalog_url: env_or(
                "KUDOS_EMOJI_CATALOG_URL",
                "https://raw.githubusercontent.com/iamcal/emoji-data/master/emoji.json",
            ),
        })
    }
}
