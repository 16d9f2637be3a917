//! Save/restore session over one feed view.
//!
//! `Bookmarker` owns the capture and restore paths end to end: variant
//! checks, the directional search, the fallback tiers and the final scroll.
//! At most one restore runs at a time; a second request is rejected rather
//! than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use feedmark_common::{
    url_path, Anchor, Config, FeedVariant, FeedView, Item, Result, SearchResult,
};
use feedmark_store::AnchorStore;

use crate::cancel::CancelToken;
use crate::capture::capture_anchor;
use crate::fallback::{FallbackMatcher, FallbackOutcome, Neighbor};
use crate::load_state::LoadStateDetector;
use crate::progress::ProgressFn;
use crate::restore::RestorationExecutor;
use crate::scanner::Scanner;
use crate::search::{SearchController, SearchRequest};
use crate::wait::{pause, Pause};

/// Page path on which a stored anchor is restored automatically.
pub const HOME_PATH: &str = "/home";

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Anchor),
    /// Capture is limited to the Following feed and another variant is active.
    NotOnFollowing,
    NoItemVisible,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// The anchored item itself was found and aligned.
    Restored { item: Item, target_scroll_y: f64 },
    NearContext {
        neighbor: Neighbor,
        target_scroll_y: f64,
    },
    /// A post matching the saved author or text stands in for the original.
    SimilarItem { item: Item, target_scroll_y: f64 },
    /// Left at the saved scroll offset with no matching post nearby.
    Approximate {
        scroll_y: f64,
        captured_at: DateTime<Utc>,
    },
    NotFound,
    NoAnchor,
    VariantUnavailable,
    TimedOut,
    Cancelled,
    NoMoreContent,
    AlreadySearching,
}

impl RestoreOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreOutcome::Restored { .. } => "restored",
            RestoreOutcome::NearContext { .. } => "near_context",
            RestoreOutcome::SimilarItem { .. } => "similar_item",
            RestoreOutcome::Approximate { .. } => "approximate",
            RestoreOutcome::NotFound => "not_found",
            RestoreOutcome::NoAnchor => "no_anchor",
            RestoreOutcome::VariantUnavailable => "variant_unavailable",
            RestoreOutcome::TimedOut => "timed_out",
            RestoreOutcome::Cancelled => "cancelled",
            RestoreOutcome::NoMoreContent => "no_more_content",
            RestoreOutcome::AlreadySearching => "already_searching",
        }
    }
}

/// Clears the in-flight flag when a restore ends, however it ends.
struct SearchGuard<'a>(&'a AtomicBool);

impl<'a> SearchGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SearchGuard(flag))
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Bookmarker {
    view: Arc<dyn FeedView>,
    store: Arc<dyn AnchorStore>,
    scanner: Scanner,
    controller: SearchController,
    matcher: FallbackMatcher,
    executor: RestorationExecutor,
    config: Config,
    searching: AtomicBool,
}

impl Bookmarker {
    pub fn new(view: Arc<dyn FeedView>, store: Arc<dyn AnchorStore>, config: Config) -> Self {
        let scanner = Scanner::new(&config.item_url_base);
        Self::with_scanner(view, store, config, scanner)
    }

    /// Use a scanner with a custom item classifier.
    pub fn with_scanner(
        view: Arc<dyn FeedView>,
        store: Arc<dyn AnchorStore>,
        config: Config,
        scanner: Scanner,
    ) -> Self {
        let controller = SearchController::new(
            scanner.clone(),
            LoadStateDetector::new(&config.detector),
            config.search.clone(),
        );
        let matcher = FallbackMatcher::new(scanner.clone(), config.matching.clone());
        Self {
            view,
            store,
            scanner,
            controller,
            matcher,
            executor: RestorationExecutor::new(),
            config,
            searching: AtomicBool::new(false),
        }
    }

    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Acquire)
    }

    pub async fn has_anchor(&self) -> Result<bool> {
        self.store.has_anchor().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear_anchor().await?;
        info!("Saved position cleared");
        Ok(())
    }

    pub async fn save(&self) -> Result<SaveOutcome> {
        let variant = self.view.feed_variant();
        if self.config.capture_requires_following && variant != FeedVariant::Following {
            info!(%variant, "Not saving outside the Following feed");
            return Ok(SaveOutcome::NotOnFollowing);
        }

        let Some(anchor) = capture_anchor(&self.scanner, self.view.as_ref(), Utc::now()) else {
            info!("No visible post to save");
            return Ok(SaveOutcome::NoItemVisible);
        };

        self.store.save_anchor(&anchor).await?;
        info!(
            item_id = ?anchor.item_id,
            scroll_y = ?anchor.scroll_y,
            offset_top = ?anchor.offset_top,
            "Position saved"
        );
        Ok(SaveOutcome::Saved(anchor))
    }

    /// Return the view to the stored anchor.
    pub async fn restore(
        &self,
        cancel: &CancelToken,
        on_progress: Option<ProgressFn>,
    ) -> Result<RestoreOutcome> {
        let Some(_guard) = SearchGuard::acquire(&self.searching) else {
            info!("Restore already in progress");
            return Ok(RestoreOutcome::AlreadySearching);
        };

        let Some(anchor) = self.store.load_anchor().await? else {
            return Ok(RestoreOutcome::NoAnchor);
        };

        let outcome = self.restore_anchor(&anchor, cancel, on_progress).await;
        info!(outcome = outcome.as_str(), "Restore finished");
        Ok(outcome)
    }

    /// Restore on load of the home feed, after letting the page settle.
    /// `None` when not on the home feed or nothing is stored.
    pub async fn auto_restore(
        &self,
        cancel: &CancelToken,
        on_progress: Option<ProgressFn>,
    ) -> Result<Option<RestoreOutcome>> {
        let page_url = self.view.page_url();
        if url_path(&page_url) != HOME_PATH {
            return Ok(None);
        }
        if !self.store.has_anchor().await? {
            return Ok(None);
        }

        info!("Auto-restoring position on home feed");
        if pause(self.config.auto_restore_delay, None, cancel).await == Pause::Cancelled {
            return Ok(Some(RestoreOutcome::Cancelled));
        }
        self.restore(cancel, on_progress).await.map(Some)
    }

    async fn restore_anchor(
        &self,
        anchor: &Anchor,
        cancel: &CancelToken,
        on_progress: Option<ProgressFn>,
    ) -> RestoreOutcome {
        let view = self.view.as_ref();

        if let Some(saved_url) = anchor.page_url.as_deref() {
            let current_url = view.page_url();
            if url_path(saved_url) != url_path(&current_url) {
                warn!(
                    saved = saved_url,
                    current = current_url.as_str(),
                    "Restoring on a different page than the anchor was saved on"
                );
            }
        }

        if view.feed_variant() != anchor.feed_variant {
            if let Some(outcome) = self.switch_variant(anchor.feed_variant, cancel).await {
                return outcome;
            }
        }

        if let Some(target_id) = anchor.item_id.as_deref() {
            let request = SearchRequest::builder()
                .target_id(target_id)
                .approx_scroll_y(anchor.scroll_y)
                .prefer_with_context(anchor.has_social_context)
                .on_progress(on_progress)
                .cancel(cancel.clone())
                .build();

            match self.controller.search(view, &request).await {
                SearchResult::Found(item) => {
                    let target_scroll_y = self.executor.restore(view, &item, anchor.offset_top);
                    return RestoreOutcome::Restored {
                        item,
                        target_scroll_y,
                    };
                }
                SearchResult::TimedOut => return RestoreOutcome::TimedOut,
                SearchResult::Cancelled => return RestoreOutcome::Cancelled,
                SearchResult::NoMoreContent => return RestoreOutcome::NoMoreContent,
                SearchResult::NotFound => {}
            }
        }

        let Some(approx_scroll_y) = anchor.scroll_y else {
            return RestoreOutcome::NotFound;
        };

        let fallback = self.matcher.resolve(view, anchor, approx_scroll_y, cancel).await;
        if let Some(target) = fallback.target_scroll_y() {
            self.executor.scroll_to(view, target);
        }
        match fallback {
            FallbackOutcome::Exact {
                item,
                target_scroll_y,
            }
            | FallbackOutcome::Similar {
                item,
                target_scroll_y,
            } => RestoreOutcome::SimilarItem {
                item,
                target_scroll_y,
            },
            FallbackOutcome::NearContext {
                neighbor,
                target_scroll_y,
                ..
            } => RestoreOutcome::NearContext {
                neighbor,
                target_scroll_y,
            },
            FallbackOutcome::ApproximateOnly { scroll_y } => RestoreOutcome::Approximate {
                scroll_y,
                captured_at: anchor.captured_at,
            },
            FallbackOutcome::Cancelled => RestoreOutcome::Cancelled,
        }
    }

    /// `None` once `target` is active and settled, otherwise the outcome
    /// that ends the restore.
    async fn switch_variant(
        &self,
        target: FeedVariant,
        cancel: &CancelToken,
    ) -> Option<RestoreOutcome> {
        let view = self.view.as_ref();
        info!(from = %view.feed_variant(), to = %target, "Switching feed variant");

        if !view.select_variant(target) {
            warn!(%target, "Feed variant control not available");
            return Some(RestoreOutcome::VariantUnavailable);
        }
        if pause(self.config.variant_switch_wait, None, cancel).await == Pause::Cancelled {
            return Some(RestoreOutcome::Cancelled);
        }
        if view.feed_variant() != target {
            warn!(active = %view.feed_variant(), %target, "Feed did not switch variant");
            return Some(RestoreOutcome::VariantUnavailable);
        }
        if pause(self.config.post_switch_settle, None, cancel).await == Pause::Cancelled {
            return Some(RestoreOutcome::Cancelled);
        }
        None
    }
}
