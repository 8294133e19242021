use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Answers whether a token names a known emoji. The engine consults this
/// before treating a `:name:` candidate as a real grant.
#[async_trait]
pub trait EmojiValidator: Send + Sync {
    async fn is_known(&self, name: &str) -> bool;
}

/// Workspace-custom emoji names, supplied by the platform session. The
/// platform's emoji listing rejects bot-level tokens, so the production
/// source authenticates with the user-level token.
#[async_trait]
pub trait CustomEmojiSource: Send + Sync {
    async fn list_custom_emoji(&self) -> Result<Vec<String>>;
}

/// One entry of the public standard-emoji catalog. Only the short names
/// matter; everything else in the payload is skipped.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    short_names: Vec<String>,
}

/// In-memory emoji validity set, combining the public standard catalog
/// with the workspace's custom list. Any miss refreshes the whole set
/// before re-checking, so newly added emojis are picked up without a
/// background sweep. Concurrent misses may refresh redundantly; the
/// refresh mutex keeps the fetches from interleaving.
pub struct EmojiCatalog {
    names: RwLock<HashSet<String>>,
    refresh: tokio::sync::Mutex<()>,
    http: reqwest::Client,
    catalog_url: String,
    custom: Arc<dyn CustomEmojiSource>,
}

impl EmojiCatalog {
    pub fn new(catalog_url: String, custom: Arc<dyn CustomEmojiSource>) -> Self {
        Self {
            names: RwLock::new(HashSet::new()),
            refresh: tokio::sync::Mutex::new(()),
            http: reqwest::Client::new(),
            catalog_url,
            custom,
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.names
            .read()
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }

    /// Pull both sources under the refresh mutex. Either source failing
    /// is logged and skipped; names already cached are kept.
    async fn refresh_all(&self) {
        let _guard = self.refresh.lock().await;

        match self.fetch_standard().await {
            Ok(names) => self.extend(names),
            Err(e) => warn!("Failed to pull standard emoji catalog: {}", e),
        }

        match self.custom.list_custom_emoji().await {
            Ok(names) => self.extend(names),
            Err(e) => warn!("Failed to pull custom emoji list: {}", e),
        }

        if let Ok(names) = self.names.read() {
            debug!("Emoji cache refreshed, {} names known", names.len());
        }
    }

    async fn fetch_standard(&self) -> Result<Vec<String>> {
        let entries: Vec<CatalogEntry> = self
            .http
            .get(&self.catalog_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(entries.into_iter().flat_map(|e| e.short_names).collect())
    }

    fn extend(&self, names: Vec<String>) {
        if let Ok(mut cache) = self.names.write() {
            cache.extend(names);
        }
    }
}

#[async_trait]
impl EmojiValidator for EmojiCatalog {
    async fn is_known(&self, name: &str) -> bool {
        if self.contains(name) {
            return true;
        }

        self.refresh_all().await;
        self.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCustom {
        names: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CustomEmojiSource for FixedCustom {
        async fn list_custom_emoji(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.names.clone())
        }
    }

    fn catalog(custom: Arc<FixedCustom>) -> EmojiCatalog {
        // Nothing listens here; the standard-catalog pull fails fast and
        // the custom source carries the test.
        EmojiCatalog::new("http://127.0.0.1:1/emoji.json".into(), custom)
    }

    #[tokio::test]
    async fn miss_triggers_refresh_then_hit() {
        let custom = Arc::new(FixedCustom {
            names: vec!["partyparrot".into()],
            calls: AtomicUsize::new(0),
        });
        let cache = catalog(custom.clone());

        assert!(cache.is_known("partyparrot").await);
        assert_eq!(custom.calls.load(Ordering::SeqCst), 1);

        // Second check is served from the cache without another pull
        assert!(cache.is_known("partyparrot").await);
        assert_eq!(custom.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_name_stays_unknown() {
        let custom = Arc::new(FixedCustom {
            names: vec![],
            calls: AtomicUsize::new(0),
        });
        let cache = catalog(custom.clone());

        assert!(!cache.is_known("not_an_emoji").await);
        // Every miss re-pulls; that's the accepted cost of freshness
        assert!(!cache.is_known("not_an_emoji").await);
        assert_eq!(custom.calls.load(Ordering::SeqCst), 2);
    }
}
