use async_trait::async_trait;
use feedmark_common::{Anchor, Result};

#[async_trait]
pub trait AnchorStore: Send + Sync {
    /// The saved anchor, or `None` if nothing is saved or it has expired.
    /// An expired anchor is cleared as a side effect.
    async fn load_anchor(&self) -> Result<Option<Anchor>>;

    async fn save_anchor(&self, anchor: &Anchor) -> Result<()>;

    async fn clear_anchor(&self) -> Result<()>;

    async fn has_anchor(&self) -> Result<bool> {
        Ok(self.load_anchor().await?.is_some())
    }
}
