//! Load-state detection.
//!
//! "Is the feed fetching?" is answered by OR-ing a set of independent
//! `LoadSignal`s. The set over-approximates: a false positive costs one extra
//! wait, a false negative can end a search early.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use feedmark_common::{DetectorConfig, FeedView, Marker};

use crate::cancel::CancelToken;
use crate::wait::{pause, Pause};

/// One heuristic for "the feed is loading".
pub trait LoadSignal: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, view: &dyn FeedView) -> bool;
}

/// A page marker is present.
pub struct MarkerSignal {
    name: &'static str,
    marker: Marker,
}

impl MarkerSignal {
    pub fn new(name: &'static str, marker: Marker) -> Self {
        Self { name, marker }
    }
}

impl LoadSignal for MarkerSignal {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, view: &dyn FeedView) -> bool {
        view.has_marker(self.marker)
    }
}

/// Some feed text mentions the keyword (case-insensitive).
pub struct LoadingText {
    keyword: String,
}

impl LoadingText {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
        }
    }
}

impl LoadSignal for LoadingText {
    fn name(&self) -> &'static str {
        "loading_text"
    }

    fn detect(&self, view: &dyn FeedView) -> bool {
        view.text_fragments()
            .iter()
            .any(|t| t.to_lowercase().contains(&self.keyword))
    }
}

/// The viewport is close enough to the bottom that a fetch is imminent.
pub struct NearBottom {
    threshold_px: f64,
}

impl NearBottom {
    pub fn new(threshold_px: f64) -> Self {
        Self { threshold_px }
    }
}

impl LoadSignal for NearBottom {
    fn name(&self) -> &'static str {
        "near_bottom"
    }

    fn detect(&self, view: &dyn FeedView) -> bool {
        view.viewport().distance_to_bottom() < self.threshold_px
    }
}

pub struct LoadStateDetector {
    signals: Vec<Box<dyn LoadSignal>>,
    poll_interval: Duration,
    settle_after_change: Duration,
}

impl LoadStateDetector {
    /// Progress bar, placeholder, loading text, spinner, near-bottom.
    pub fn new(config: &DetectorConfig) -> Self {
        Self::with_signals(
            config,
            vec![
                Box::new(MarkerSignal::new("progress_bar", Marker::ProgressBar)),
                Box::new(MarkerSignal::new("placeholder", Marker::Placeholder)),
                Box::new(LoadingText::new(&config.loading_keyword)),
                Box::new(MarkerSignal::new("loading_spinner", Marker::LoadingSpinner)),
                Box::new(NearBottom::new(config.near_bottom_px)),
            ],
        )
    }

    pub fn with_signals(config: &DetectorConfig, signals: Vec<Box<dyn LoadSignal>>) -> Self {
        Self {
            signals,
            poll_interval: config.poll_interval,
            settle_after_change: config.settle_after_change,
        }
    }

    pub fn is_loading(&self, view: &dyn FeedView) -> bool {
        let fired: Vec<&'static str> = self
            .signals
            .iter()
            .filter(|s| s.detect(view))
            .map(|s| s.name())
            .collect();
        if !fired.is_empty() {
            debug!(signals = ?fired, "Feed looks like it is loading");
        }
        !fired.is_empty()
    }

    /// Wait until the feed grows (more attached elements, or a taller
    /// document) or `timeout` passes. Returns whether growth was observed.
    ///
    /// Listens to the view's change notifications when it offers them and
    /// polls as a backstop either way. After growth is seen, waits a short
    /// settle so layout finishes before the caller re-scans.
    pub async fn wait_for_new_content(
        &self,
        view: &dyn FeedView,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let initial_count = view.element_count();
        let mut previous_height = view.viewport().document_height;
        let mut mutations = view.mutations();

        debug!(
            initial_count,
            previous_height,
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for new content"
        );

        loop {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                break;
            }

            let tick = (Instant::now() + self.poll_interval).min(deadline);
            let mut sender_gone = false;
            match mutations.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        changed = rx.changed() => sender_gone = changed.is_err(),
                        _ = tokio::time::sleep_until(tick) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(tick) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
            }
            if sender_gone {
                // Notifications stopped; the poll keeps going.
                mutations = None;
            }

            let count = view.element_count();
            let height = view.viewport().document_height;
            if count > initial_count || height > previous_height {
                debug!(
                    from_count = initial_count,
                    to_count = count,
                    from_height = previous_height,
                    to_height = height,
                    "New content detected"
                );
                return pause(self.settle_after_change, None, cancel).await == Pause::Elapsed;
            }
            previous_height = height;
        }

        debug!("No new content before timeout");
        false
    }
}
