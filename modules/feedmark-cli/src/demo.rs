//! Save/reload/restore walkthrough against the simulated feed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tokio::time::Instant;
use tracing::info;

use feedmark_common::{Config, FeedView, ScrollBehavior};
use feedmark_engine::{Bookmarker, CancelToken, ProgressFn, SaveOutcome, SearchProgress};
use feedmark_store::AnchorStore;
use simfeed::{SimFeedConfig, SimPost, SimulatedFeed};

use crate::presenter::{jump_label, progress_notice, restore_notice, save_notice};

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Posts in the feed
    #[arg(long, default_value_t = 300)]
    pub posts: u64,

    /// Index of the post to save on
    #[arg(long, default_value_t = 120)]
    pub target: u64,

    /// New posts that arrive above the saved one before restoring
    #[arg(long, default_value_t = 0)]
    pub prepend: usize,

    /// Delete the saved post before restoring
    #[arg(long)]
    pub delete_target: bool,

    /// Stop the search after this many seconds
    #[arg(long)]
    pub cancel_after: Option<u64>,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value_t = 1200)]
    pub latency_ms: u64,

    /// Write the feed's interaction log here as JSON
    #[arg(long)]
    pub log: Option<PathBuf>,
}

impl DemoArgs {
    fn feed_config(&self) -> SimFeedConfig {
        SimFeedConfig {
            fetch_latency: Duration::from_millis(self.latency_ms),
            ..Default::default()
        }
    }

    fn build_feed(&self) -> SimulatedFeed {
        SimulatedFeed::numbered(self.feed_config(), self.posts)
    }
}

pub async fn run(config: &Config, store: Arc<dyn AnchorStore>, args: &DemoArgs) -> Result<()> {
    anyhow::ensure!(
        args.target < args.posts,
        "--target must be below --posts ({} >= {})",
        args.target,
        args.posts
    );
    let target_id = SimPost::numbered(args.target).id;

    // --- Reading session ---
    let reading = Arc::new(args.build_feed());
    reading.load_through(&target_id);
    let top = reading
        .doc_top_of(&target_id)
        .ok_or_else(|| anyhow::anyhow!("post {target_id} did not load"))?;
    reading.scroll_to(top, ScrollBehavior::Instant);

    let outcome = Bookmarker::new(reading.clone(), store.clone(), config.clone())
        .save()
        .await?;
    println!("{}", save_notice(&outcome));
    let SaveOutcome::Saved(anchor) = outcome else {
        return Ok(());
    };
    println!(
        "{} at scroll offset {:.0}",
        jump_label(Some(&anchor)),
        anchor.scroll_y.unwrap_or_default()
    );

    // --- After reload ---
    let feed = Arc::new(args.build_feed());
    if args.prepend > 0 {
        feed.prepend(
            (0..args.prepend as u64)
                .map(|n| SimPost::numbered(100_000 + n))
                .collect(),
        );
        info!(count = args.prepend, "New posts arrived above");
    }
    if args.delete_target {
        feed.remove(&target_id);
        info!(id = target_id.as_str(), "Saved post deleted");
    }

    let session = Bookmarker::new(feed.clone(), store, config.clone());
    let cancel = CancelToken::new();
    if let Some(secs) = args.cancel_after {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!(after_secs = secs, "Stopping search");
            cancel.cancel();
        });
    }
    let on_progress: ProgressFn = Arc::new(|progress: &SearchProgress| {
        println!(
            "{}  ({}, {:.0}% of time budget)",
            progress_notice(progress),
            progress.message(),
            progress.fraction() * 100.0
        );
    });

    let started = Instant::now();
    let outcome = session.restore(&cancel, Some(on_progress)).await?;
    println!("{}", restore_notice(&outcome, Utc::now()));
    println!(
        "Finished in {:.1}s at scroll offset {:.0} ({} posts loaded)",
        started.elapsed().as_secs_f64(),
        feed.viewport().scroll_y,
        feed.loaded_count()
    );

    if let Some(path) = &args.log {
        feed.log().save(path)?;
        println!("Feed log written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use feedmark_store::MemoryAnchorStore;

    use super::*;

    fn args() -> DemoArgs {
        DemoArgs {
            posts: 80,
            target: 30,
            prepend: 0,
            delete_target: false,
            cancel_after: None,
            latency_ms: 200,
            log: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn demo_saves_and_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryAnchorStore::new());
        let args = DemoArgs {
            prepend: 3,
            log: Some(dir.path().join("feed.json")),
            ..args()
        };

        run(&Config::default(), store.clone(), &args).await.unwrap();

        let anchor = store.load_anchor().await.unwrap().unwrap();
        assert_eq!(anchor.item_id, Some(SimPost::numbered(30).id));
        let log = simfeed::FeedLog::load(&dir.path().join("feed.json")).unwrap();
        assert!(log.scroll_calls().count() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn target_outside_feed_is_rejected() {
        let args = DemoArgs {
            target: 80,
            ..args()
        };
        let store = Arc::new(MemoryAnchorStore::new());
        assert!(run(&Config::default(), store, &args).await.is_err());
    }
}
