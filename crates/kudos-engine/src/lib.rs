pub mod board;
pub mod directory;
pub mod extract;
pub mod gate;
pub mod ledger;
pub mod router;
pub mod session;

use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use kudos_db::Database;
use kudos_emoji::EmojiValidator;
use kudos_types::events::SessionEvent;
use kudos_types::models::{Identity, User};

use crate::directory::UserDirectory;
use crate::gate::ChannelGate;
use crate::session::ChatSession;

/// The kudos transaction engine. Owns the channel gate and user directory,
/// and consults the emoji validator and chat session through their traits.
/// One instance is built at startup and shared across all in-flight
/// message handlers.
pub struct Engine {
    pub(crate) db: Arc<Database>,
    pub(crate) session: Arc<dyn ChatSession>,
    pub(crate) emoji: Arc<dyn EmojiValidator>,
    pub(crate) gate: ChannelGate,
    pub(crate) directory: UserDirectory,
    pub(crate) identity: RwLock<Option<Identity>>,
    pub(crate) daily_quota: u32,
}

impl Engine {
    pub fn new(
        db: Arc<Database>,
        session: Arc<dyn ChatSession>,
        emoji: Arc<dyn EmojiValidator>,
        daily_quota: u32,
    ) -> Self {
        Self {
            gate: ChannelGate::new(db.clone()),
            directory: UserDirectory::new(db.clone(), session.clone()),
            db,
            session,
            emoji,
            identity: RwLock::new(None),
            daily_quota,
        }
    }

    /// Handle one session event. Message handling is the only path with
    /// real work; the rest is connection bookkeeping.
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { identity } => {
                info!(
                    "Connected to {} as {} ({})",
                    identity.team_name, identity.bot_name, identity.bot_id
                );
                self.set_identity(identity);
            }
            SessionEvent::Message(msg) => {
                if msg.hidden {
                    return;
                }
                self.handle_message(msg).await;
            }
            SessionEvent::LatencyReport { millis } => {
                debug!("Current latency: {}ms", millis);
            }
            SessionEvent::SessionError { message } => {
                error!("Session error: {}", message);
            }
            SessionEvent::InvalidAuth => {
                error!("Platform rejected the bot credentials");
            }
        }
    }

    pub fn set_identity(&self, identity: Identity) {
        if let Ok(mut slot) = self.identity.write() {
            *slot = Some(identity);
        }
    }

    pub(crate) fn identity(&self) -> Option<Identity> {
        self.identity.read().ok().and_then(|slot| slot.clone())
    }

    /// DM a user, logging delivery failures instead of propagating them:
    /// a lost notice never aborts the handling of a message.
    pub(crate) async fn dm(&self, user: &User, text: &str) {
        debug!("Sending DM to {}: {}", user.username, text);
        if let Err(e) = self.session.send_dm(&user.platform_id, text).await {
            error!("Failed to send message to user {}: {}", user.username, e);
        }
    }
}
