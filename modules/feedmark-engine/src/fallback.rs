//! Best-effort substitute when the anchored item can't be found.
//!
//! Tiers, strongest first: exact content match, saved neighbor, lenient
//! similarity. Promoted items and items from the other social-context
//! partition are never candidates. When nothing qualifies the viewport stays
//! at the saved offset.

use tracing::{debug, info};

use feedmark_common::{
    truncate_chars, Anchor, FeedView, Item, MatchConfig, ScrollBehavior,
};

use crate::cancel::CancelToken;
use crate::restore::target_scroll_y;
use crate::scanner::Scanner;
use crate::wait::{pause, Pause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    /// Same author and same opening text.
    Exact { item: Item, target_scroll_y: f64 },
    /// One of the saved neighbors is on screen.
    NearContext {
        neighbor: Neighbor,
        item: Item,
        target_scroll_y: f64,
    },
    /// Shares author, display name or a shorter text prefix.
    Similar { item: Item, target_scroll_y: f64 },
    /// Nothing matched; the viewport was left at the saved offset.
    ApproximateOnly { scroll_y: f64 },
    Cancelled,
}

impl FallbackOutcome {
    pub fn target_scroll_y(&self) -> Option<f64> {
        match self {
            FallbackOutcome::Exact { target_scroll_y, .. }
            | FallbackOutcome::NearContext { target_scroll_y, .. }
            | FallbackOutcome::Similar { target_scroll_y, .. } => Some(*target_scroll_y),
            FallbackOutcome::ApproximateOnly { .. } | FallbackOutcome::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackOutcome::Exact { .. } => "exact",
            FallbackOutcome::NearContext { .. } => "near_context",
            FallbackOutcome::Similar { .. } => "similar",
            FallbackOutcome::ApproximateOnly { .. } => "approximate",
            FallbackOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct FallbackMatcher {
    scanner: Scanner,
    config: MatchConfig,
}

impl FallbackMatcher {
    pub fn new(scanner: Scanner, config: MatchConfig) -> Self {
        Self { scanner, config }
    }

    /// Jump to `approx_scroll_y`, let it settle, and pick a substitute among
    /// the visible items. Does not issue the final scroll.
    pub async fn resolve(
        &self,
        view: &dyn FeedView,
        anchor: &Anchor,
        approx_scroll_y: f64,
        cancel: &CancelToken,
    ) -> FallbackOutcome {
        if cancel.is_cancelled() {
            return FallbackOutcome::Cancelled;
        }
        info!(approx_scroll_y, "Target not found, trying nearby posts");
        view.scroll_to(approx_scroll_y, ScrollBehavior::Instant);
        if pause(self.config.jump_settle, None, cancel).await == Pause::Cancelled {
            return FallbackOutcome::Cancelled;
        }

        let viewport = view.viewport();
        let candidates = self.candidates(view, anchor);
        debug!(candidates = candidates.len(), "Fallback candidates");

        let outcome = self.choose(anchor, &candidates, viewport.scroll_y, viewport.height);
        info!(tier = outcome.as_str(), "Fallback resolved");
        outcome
    }

    /// Visible, non-promoted items in the anchor's social-context partition.
    pub fn candidates(&self, view: &dyn FeedView, anchor: &Anchor) -> Vec<Item> {
        self.scanner
            .scan(view)
            .into_iter()
            .filter(|item| !item.is_promoted)
            .filter(|item| item.has_social_context == anchor.has_social_context)
            .collect()
    }

    /// Pure tier selection over already-filtered candidates.
    pub fn choose(
        &self,
        anchor: &Anchor,
        candidates: &[Item],
        scroll_y: f64,
        viewport_height: f64,
    ) -> FallbackOutcome {
        if let Some(item) = candidates.iter().find(|i| self.is_exact(anchor, i)) {
            return FallbackOutcome::Exact {
                target_scroll_y: target_scroll_y(scroll_y, item.top(), anchor.offset_top),
                item: item.clone(),
            };
        }

        let bias = viewport_height * self.config.context_bias_viewports;
        let neighbors = [
            (Neighbor::Before, anchor.context.before.as_ref(), bias),
            (Neighbor::After, anchor.context.after.as_ref(), -bias),
        ];
        for (neighbor, saved, offset) in neighbors {
            let Some(saved_id) = saved.and_then(|c| c.id.as_deref()) else {
                continue;
            };
            if let Some(item) = candidates.iter().find(|i| i.id.as_deref() == Some(saved_id)) {
                return FallbackOutcome::NearContext {
                    neighbor,
                    target_scroll_y: scroll_y + item.top() + offset,
                    item: item.clone(),
                };
            }
        }

        if let Some(item) = candidates.iter().find(|i| self.is_similar(anchor, i)) {
            return FallbackOutcome::Similar {
                target_scroll_y: target_scroll_y(scroll_y, item.top(), None),
                item: item.clone(),
            };
        }

        FallbackOutcome::ApproximateOnly { scroll_y }
    }

    fn is_exact(&self, anchor: &Anchor, item: &Item) -> bool {
        let Some(saved) = anchor.text.as_deref() else {
            return false;
        };
        if saved.chars().count() < self.config.min_exact_text_chars {
            return false;
        }
        same(&anchor.author_handle, &item.author_handle)
            && contains_prefix(item, saved, self.config.exact_prefix_chars)
    }

    fn is_similar(&self, anchor: &Anchor, item: &Item) -> bool {
        if same(&anchor.author_handle, &item.author_handle)
            || same(&anchor.author_name, &item.author_name)
        {
            return true;
        }
        anchor
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .is_some_and(|saved| contains_prefix(item, saved, self.config.lenient_prefix_chars))
    }
}

/// Both present and equal.
fn same(saved: &Option<String>, seen: &Option<String>) -> bool {
    matches!((saved, seen), (Some(a), Some(b)) if a == b)
}

fn contains_prefix(item: &Item, saved: &str, chars: usize) -> bool {
    let prefix = truncate_chars(saved, chars);
    item.text.as_deref().is_some_and(|t| t.contains(&prefix))
}
