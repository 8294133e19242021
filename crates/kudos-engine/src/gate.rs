use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use tracing::{error, info};

use kudos_db::Database;
use kudos_types::events::MessageEvent;

use crate::Engine;

/// Per-channel enablement, fronting the durable store with a read-through
/// cache. Channels never seen before count as disabled. There is no
/// expiry: state only changes through `set_enabled`, which keeps cache
/// and store in step.
pub struct ChannelGate {
    db: Arc<Database>,
    cache: RwLock<HashMap<String, bool>>,
}

impl ChannelGate {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self, channel_id: &str) -> Result<bool> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| anyhow!("gate cache poisoned: {}", e))?;
            if let Some(&enabled) = cache.get(channel_id) {
                return Ok(enabled);
            }
        }

        let enabled = self.db.channel_enabled(channel_id)?.unwrap_or(false);

        let mut cache = self
            .cache
            .write()
            .map_err(|e| anyhow!("gate cache poisoned: {}", e))?;
        cache.insert(channel_id.to_string(), enabled);
        Ok(enabled)
    }

    /// The cache only ever reflects durably-committed state: the store
    /// write happens first, and a failure leaves the cache untouched.
    pub fn set_enabled(&self, channel_id: &str, enabled: bool) -> Result<()> {
        self.db.set_channel_enabled(channel_id, enabled)?;

        let mut cache = self
            .cache
            .write()
            .map_err(|e| anyhow!("gate cache poisoned: {}", e))?;
        cache.insert(channel_id.to_string(), enabled);
        Ok(())
    }
}

impl Engine {
    /// `@bot enable` — the one command recognized in a disabled channel.
    /// Direct and group-direct conversations can't be enabled.
    pub(crate) async fn enable_channel(&self, msg: &MessageEvent) {
        let info = match self.session.channel_info(&msg.channel_id).await {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to get channel info for {}: {}", msg.channel_id, e);
                return;
            }
        };

        if info.is_direct || info.is_group_direct {
            info!("Not enabling {}, not a regular channel", msg.channel_id);
            if let Ok(user) = self.directory.resolve(&msg.sender).await {
                self.dm(&user, "Sorry, you're only allowed to enable regular channels")
                    .await;
            }
            return;
        }

        info!("Enabling channel {}", msg.channel_id);
        if let Err(e) = self.gate.set_enabled(&msg.channel_id, true) {
            error!("Failed to enable channel {}: {}", msg.channel_id, e);
            return;
        }

        let user = match self.directory.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(_) => return,
        };

        if info.is_private {
            self.dm(&user, &format!("Enabled private channel #{}", info.name))
                .await;
        } else {
            self.dm(&user, &format!("Enabled channel <#{}>", msg.channel_id))
                .await;
        }
    }

    pub(crate) async fn disable_channel(&self, msg: &MessageEvent) {
        info!("Disabling channel {}", msg.channel_id);
        if let Err(e) = self.gate.set_enabled(&msg.channel_id, false) {
            error!("Failed to disable channel {}: {}", msg.channel_id, e);
            return;
        }

        let user = match self.directory.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(_) => return,
        };

        let info = match self.session.channel_info(&msg.channel_id).await {
            Ok(info) => info,
            Err(_) => return,
        };

        if info.is_private {
            self.dm(&user, &format!("Disabled private channel #{}", info.name))
                .await;
        } else {
            self.dm(&user, &format!("Disabled channel <#{}>", msg.channel_id))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ChannelGate {
        ChannelGate::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn unseen_channel_defaults_to_disabled() {
        let gate = gate();
        assert!(!gate.is_enabled("C-new").unwrap());
    }

    #[test]
    fn enable_is_visible_immediately() {
        let gate = gate();
        gate.set_enabled("C1", true).unwrap();
        assert!(gate.is_enabled("C1").unwrap());

        gate.set_enabled("C1", false).unwrap();
        assert!(!gate.is_enabled("C1").unwrap());
    }

    #[test]
    fn cache_read_through_matches_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_channel_enabled("C1", true).unwrap();

        // A fresh gate has a cold cache and must find the durable row
        let gate = ChannelGate::new(db);
        assert!(gate.is_enabled("C1").unwrap());
    }
}
