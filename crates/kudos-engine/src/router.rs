use tracing::{debug, error};

use kudos_types::events::MessageEvent;

use crate::Engine;

/// What one inbound message asks for. Classification only; nothing here
/// is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Enable,
    Disable,
    Leaderboard,
    PersonalStats,
    Help,
    /// Not addressed to the bot: a potential kudos grant.
    Grant,
}

/// Recognize the bot-addressed commands. Enable and disable require the
/// exact text; leaderboard, mykudos and help allow trailing arguments.
pub fn classify(text: &str, bot_id: &str) -> Command {
    let bot = format!("<@{}>", bot_id);

    if text == format!("{} enable", bot) {
        Command::Enable
    } else if text == format!("{} disable", bot) {
        Command::Disable
    } else if text.starts_with(&format!("{} leaderboard", bot)) {
        Command::Leaderboard
    } else if text.starts_with(&format!("{} mykudos", bot)) {
        Command::PersonalStats
    } else if text.starts_with(&format!("{} help", bot)) {
        Command::Help
    } else {
        Command::Grant
    }
}

impl Engine {
    /// Route one visible message. `enable` is recognized everywhere; all
    /// other commands require the channel gate to report enabled, and a
    /// disabled channel swallows them without any reply.
    pub(crate) async fn handle_message(&self, msg: MessageEvent) {
        let Some(identity) = self.identity() else {
            debug!("Message arrived before the session identity, ignoring");
            return;
        };

        let command = classify(&msg.text, &identity.bot_id);

        if command != Command::Enable {
            match self.gate.is_enabled(&msg.channel_id) {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    error!("Error while checking channel {}: {}", msg.channel_id, e);
                    return;
                }
            }
        }

        match command {
            Command::Enable => self.enable_channel(&msg).await,
            Command::Disable => self.disable_channel(&msg).await,
            Command::Leaderboard => self.leaderboard(&msg).await,
            Command::PersonalStats => self.personal_stats(&msg).await,
            Command::Help => self.help(&msg).await,
            Command::Grant => self.give_kudos(&msg).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "B123";

    #[test]
    fn exact_commands() {
        assert_eq!(classify("<@B123> enable", BOT), Command::Enable);
        assert_eq!(classify("<@B123> disable", BOT), Command::Disable);
        assert_eq!(classify("<@B123> help", BOT), Command::Help);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            classify("<@B123> leaderboard :star:", BOT),
            Command::Leaderboard
        );
        assert_eq!(
            classify("<@B123> mykudos :star: :heart:", BOT),
            Command::PersonalStats
        );
    }

    #[test]
    fn enable_requires_exact_text() {
        assert_eq!(classify("<@B123> enable please", BOT), Command::Grant);
        assert_eq!(classify(" <@B123> enable", BOT), Command::Grant);
    }

    #[test]
    fn other_bots_commands_are_not_ours() {
        assert_eq!(classify("<@B999> enable", BOT), Command::Grant);
    }

    #[test]
    fn ordinary_messages_fall_through_to_grant() {
        assert_eq!(classify("<@U1> great work :tada:", BOT), Command::Grant);
    }
}
