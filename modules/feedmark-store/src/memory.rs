use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::info;

use feedmark_common::{Anchor, Result};

use crate::traits::AnchorStore;

/// In-process anchor store. Used by tests and by hosts that persist elsewhere.
pub struct MemoryAnchorStore {
    anchor: RwLock<Option<Anchor>>,
    retention: Duration,
}

impl MemoryAnchorStore {
    pub fn new() -> Self {
        Self::with_retention(Anchor::retention())
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            anchor: RwLock::new(None),
            retention,
        }
    }

    /// Seed the store, bypassing expiry.
    pub fn with_anchor(self, anchor: Anchor) -> Self {
        Self {
            anchor: RwLock::new(Some(anchor)),
            retention: self.retention,
        }
    }
}

impl Default for MemoryAnchorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnchorStore for MemoryAnchorStore {
    async fn load_anchor(&self) -> Result<Option<Anchor>> {
        let mut slot = self.anchor.write().await;
        let expired = slot
            .as_ref()
            .is_some_and(|a| a.is_expired(Utc::now(), self.retention));
        if expired {
            info!("Saved anchor expired, discarding");
            *slot = None;
        }
        Ok(slot.clone())
    }

    async fn save_anchor(&self, anchor: &Anchor) -> Result<()> {
        *self.anchor.write().await = Some(anchor.clone());
        Ok(())
    }

    async fn clear_anchor(&self) -> Result<()> {
        *self.anchor.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedmark_common::{AnchorContext, FeedVariant};

    fn anchor(age_days: i64) -> Anchor {
        Anchor {
            item_id: Some("777".into()),
            item_url: Some("https://x.com/a/status/777".into()),
            text: Some("hello".into()),
            author_handle: Some("@a".into()),
            author_name: None,
            item_timestamp: Some("2h".into()),
            captured_at: Utc::now() - Duration::days(age_days),
            scroll_y: Some(4000.0),
            offset_top: Some(60.0),
            page_url: Some("https://x.com/home".into()),
            feed_variant: FeedVariant::Following,
            has_social_context: false,
            is_promoted: false,
            context: AnchorContext::default(),
        }
    }

    #[tokio::test]
    async fn save_then_load_returns_copy() {
        let store = MemoryAnchorStore::new();
        store.save_anchor(&anchor(0)).await.unwrap();
        let loaded = store.load_anchor().await.unwrap().unwrap();
        assert_eq!(loaded.item_id.as_deref(), Some("777"));
        assert!(store.has_anchor().await.unwrap());
    }

    #[tokio::test]
    async fn expired_anchor_is_cleared_on_read() {
        let store = MemoryAnchorStore::new().with_anchor(anchor(31));
        assert!(store.load_anchor().await.unwrap().is_none());
        assert!(!store.has_anchor().await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_anchor() {
        let store = MemoryAnchorStore::new().with_anchor(anchor(1));
        store.clear_anchor().await.unwrap();
        assert!(store.load_anchor().await.unwrap().is_none());
    }
}
