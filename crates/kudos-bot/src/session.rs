use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use kudos_emoji::CustomEmojiSource;
use kudos_engine::session::ChatSession;
use kudos_types::models::{ChannelInfo, UserProfile};

/// `ChatSession` over the platform's web API. Calls authenticate with the
/// bot token; only the emoji listing needs the user-level token.
pub struct HttpSession {
    http: reqwest::Client,
    api_url: String,
    workspace_url: String,
    bot_token: String,
    user_token: String,
}

// Wire shapes of the platform API. Every response carries `ok`; the
// payload field is only present on success.

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    name: String,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelInfoResponse {
    ok: bool,
    error: Option<String>,
    channel: Option<WireChannel>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_im: bool,
    #[serde(default)]
    is_mpim: bool,
    #[serde(default)]
    is_private: bool,
}

#[derive(Debug, Deserialize)]
struct OpenDmResponse {
    ok: bool,
    error: Option<String>,
    channel: Option<WireChannelId>,
}

#[derive(Debug, Deserialize)]
struct WireChannelId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmojiListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    emoji: std::collections::HashMap<String, String>,
}

fn api_err(error: Option<String>) -> anyhow::Error {
    anyhow!("platform error: {}", error.unwrap_or_else(|| "unknown".into()))
}

impl HttpSession {
    pub fn new(
        api_url: String,
        workspace_url: String,
        bot_token: String,
        user_token: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            workspace_url,
            bot_token,
            user_token,
        }
    }

    async fn post_chat(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let resp: AckResponse = self
            .http
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_err(resp.error));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSession for HttpSession {
    async fn user_info(&self, handle: &str) -> Result<UserProfile> {
        let resp: UserInfoResponse = self
            .http
            .get(format!("{}/users.info", self.api_url))
            .bearer_auth(&self.bot_token)
            .query(&[("user", handle)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_err(resp.error));
        }
        let user = resp.user.ok_or_else(|| anyhow!("missing user payload"))?;

        Ok(UserProfile {
            platform_id: user.id,
            username: user.name,
            is_bot: user.is_bot,
        })
    }

    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        let resp: ChannelInfoResponse = self
            .http
            .get(format!("{}/conversations.info", self.api_url))
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_err(resp.error));
        }
        let channel = resp
            .channel
            .ok_or_else(|| anyhow!("missing channel payload"))?;

        Ok(ChannelInfo {
            id: channel.id,
            name: channel.name,
            is_direct: channel.is_im,
            is_group_direct: channel.is_mpim,
            is_private: channel.is_private,
        })
    }

    async fn send_dm(&self, platform_id: &str, text: &str) -> Result<()> {
        // Bots can't read DMs; don't bother sending them
        let profile = self.user_info(platform_id).await?;
        if profile.is_bot {
            debug!("Skipping DM to bot user {}", profile.username);
            return Ok(());
        }

        let resp: OpenDmResponse = self
            .http
            .post(format!("{}/conversations.open", self.api_url))
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({ "users": platform_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_err(resp.error));
        }
        let channel = resp.channel.ok_or_else(|| anyhow!("missing channel id"))?;

        self.post_message(&channel.id, text).await
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()> {
        self.post_chat(
            "chat.postMessage",
            serde_json::json!({ "channel": channel_id, "text": text }),
        )
        .await
    }

    async fn post_ephemeral(&self, channel_id: &str, platform_id: &str, text: &str) -> Result<()> {
        self.post_chat(
            "chat.postEphemeral",
            serde_json::json!({ "channel": channel_id, "user": platform_id, "text": text }),
        )
        .await
    }

    fn message_permalink(&self, channel_id: &str, ts: &str) -> String {
        format!(
            "{}/archives/{}/p{}",
            self.workspace_url,
            channel_id,
            ts.replacen('.', "", 1)
        )
    }
}

#[async_trait]
impl CustomEmojiSource for HttpSession {
    async fn list_custom_emoji(&self) -> Result<Vec<String>> {
        let resp: EmojiListResponse = self
            .http
            .get(format!("{}/emoji.list", self.api_url))
            .bearer_auth(&self.user_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_err(resp.error));
        }
        Ok(resp.emoji.into_keys().collect())
    }
}
