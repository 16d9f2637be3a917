//! Directional search for an item by ID in a virtualized feed.
//!
//! Immediate → (Jumping) → Scanning(preferred) → Scanning(opposite) → Done.
//! Every iteration first checks cancel, the time ceiling and the end-of-feed
//! marker; any of them ends the search with the matching `SearchResult`.
//! Going down, a stalled scroll triggers one load-wait at the bottom of the
//! document before the direction is given up.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use feedmark_common::{
    FeedView, Item, Marker, ScrollBehavior, SearchConfig, SearchResult,
};

use crate::cancel::CancelToken;
use crate::load_state::LoadStateDetector;
use crate::progress::{Direction, ProgressFn, ProgressThrottle, SearchPhase, SearchProgress};
use crate::scanner::Scanner;
use crate::wait::{pause, Pause};

#[derive(Clone, TypedBuilder)]
pub struct SearchRequest {
    #[builder(setter(into))]
    pub target_id: String,
    /// Scroll offset the item was last seen at.
    #[builder(default)]
    pub approx_scroll_y: Option<f64>,
    #[builder(default)]
    pub prefer_with_context: bool,
    #[builder(default)]
    pub on_progress: Option<ProgressFn>,
    #[builder(default)]
    pub cancel: CancelToken,
}

/// Consecutive scroll attempts that barely moved.
#[derive(Debug)]
pub(crate) struct StallCounter {
    min_displacement: f64,
    count: u32,
}

impl StallCounter {
    pub fn new(min_displacement: f64) -> Self {
        Self {
            min_displacement,
            count: 0,
        }
    }

    /// Record one attempt and return the updated count.
    pub fn observe(&mut self, displacement: f64) -> u32 {
        if displacement.abs() < self.min_displacement {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Scan upward when already past the saved offset, otherwise downward.
pub fn preferred_direction(scroll_y: f64, approx_scroll_y: Option<f64>) -> Direction {
    match approx_scroll_y {
        Some(target) if scroll_y > target => Direction::Up,
        _ => Direction::Down,
    }
}

pub struct SearchController {
    scanner: Scanner,
    detector: LoadStateDetector,
    config: SearchConfig,
}

impl SearchController {
    pub fn new(scanner: Scanner, detector: LoadStateDetector, config: SearchConfig) -> Self {
        Self {
            scanner,
            detector,
            config,
        }
    }

    /// Search for `request.target_id`. Never fails: every way a search can
    /// end maps to a `SearchResult`.
    pub async fn search(&self, view: &dyn FeedView, request: &SearchRequest) -> SearchResult {
        let mut run = Run::new(self, view, request);

        info!(
            target_id = request.target_id.as_str(),
            approx_scroll_y = ?request.approx_scroll_y,
            scroll_y = view.viewport().scroll_y,
            "Search started"
        );

        let result = run.execute().await;

        info!(
            target_id = request.target_id.as_str(),
            outcome = result.as_str(),
            elapsed_ms = run.started.elapsed().as_millis() as u64,
            scroll_y = view.viewport().scroll_y,
            "Search finished"
        );
        result
    }
}

enum ScanEnd {
    Done(SearchResult),
    Exhausted,
}

enum LoadWait {
    Done(SearchResult),
    Loaded,
    Nothing,
}

/// State of one search invocation.
struct Run<'a> {
    controller: &'a SearchController,
    view: &'a dyn FeedView,
    request: &'a SearchRequest,
    started: Instant,
    deadline: Instant,
    throttle: ProgressThrottle,
}

impl<'a> Run<'a> {
    fn new(controller: &'a SearchController, view: &'a dyn FeedView, request: &'a SearchRequest) -> Self {
        let started = Instant::now();
        Self {
            controller,
            view,
            request,
            started,
            deadline: started + controller.config.timeout,
            throttle: ProgressThrottle::new(controller.config.progress_interval),
        }
    }

    fn config(&self) -> &SearchConfig {
        &self.controller.config
    }

    async fn execute(&mut self) -> SearchResult {
        if self.request.cancel.is_cancelled() {
            return SearchResult::Cancelled;
        }

        if let Some(item) = self.find() {
            debug!(target_id = self.request.target_id.as_str(), "Found without scrolling");
            return SearchResult::Found(item);
        }

        if let Some(target) = self.request.approx_scroll_y {
            if let Some(done) = self.jump_toward(target).await {
                return done;
            }
        }

        let first = preferred_direction(self.view.viewport().scroll_y, self.request.approx_scroll_y);
        for direction in [first, first.opposite()] {
            info!(%direction, "Scanning");
            match self.scan(direction).await {
                ScanEnd::Done(result) => return result,
                ScanEnd::Exhausted => {
                    info!(%direction, scroll_y = self.view.viewport().scroll_y, "Direction exhausted");
                }
            }
        }

        if let Some(target) = self.request.approx_scroll_y {
            self.view.scroll_to(target, ScrollBehavior::Instant);
        }
        SearchResult::NotFound
    }

    fn find(&self) -> Option<Item> {
        self.controller.scanner.find_by_id(
            self.view,
            &self.request.target_id,
            self.request.prefer_with_context,
        )
    }

    /// Global cutoffs, in priority order.
    fn terminal(&self) -> Option<SearchResult> {
        if self.request.cancel.is_cancelled() {
            return Some(SearchResult::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Some(SearchResult::TimedOut);
        }
        if self.view.has_marker(Marker::EndOfFeed) {
            return Some(SearchResult::NoMoreContent);
        }
        None
    }

    async fn settle(&self, duration: Duration) -> Option<SearchResult> {
        match pause(duration, Some(self.deadline), &self.request.cancel).await {
            Pause::Cancelled => Some(SearchResult::Cancelled),
            Pause::Elapsed => None,
        }
    }

    async fn wait_for_content(&self, timeout: Duration) -> bool {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        self.controller
            .detector
            .wait_for_new_content(self.view, timeout.min(remaining), &self.request.cancel)
            .await
    }

    fn report(&mut self, phase: SearchPhase) {
        let Some(on_progress) = self.request.on_progress.as_ref() else {
            return;
        };
        let now = Instant::now();
        if self.throttle.ready(now) {
            on_progress(&SearchProgress {
                elapsed: now.duration_since(self.started),
                ceiling: self.controller.config.timeout,
                phase,
            });
        }
    }

    /// Move near the saved offset before scanning. Far targets are approached
    /// in stages so the list can fetch the ranges in between.
    async fn jump_toward(&mut self, target: f64) -> Option<SearchResult> {
        let viewport = self.view.viewport();
        let distance = (viewport.scroll_y - target).abs();
        let config = self.config().clone();

        if distance <= viewport.height * config.jump_threshold_viewports {
            return None;
        }

        if distance <= viewport.height * config.staged_jump_threshold_viewports {
            info!(distance, target, "Jumping directly to saved offset");
            if let Some(done) = self.terminal() {
                return Some(done);
            }
            self.report(SearchPhase::Jumping { stage: 1, of: 1 });
            self.view.scroll_to(target, ScrollBehavior::Instant);
            if let Some(done) = self.settle(config.jump_settle).await {
                return Some(done);
            }
            return self.find().map(SearchResult::Found);
        }

        let stages = config.jump_stages.max(5);
        let start = viewport.scroll_y;
        let stride = (target - start) / stages as f64;
        let direction = preferred_direction(start, Some(target));
        info!(distance, target, stages, "Staged jump toward saved offset");

        for stage in 1..=stages {
            if let Some(done) = self.terminal() {
                return Some(done);
            }
            self.report(SearchPhase::Jumping { stage, of: stages });

            let position = start + stride * stage as f64;
            self.view.scroll_to(position, ScrollBehavior::Instant);
            debug!(stage, stages, position, "Jump stage");
            if let Some(done) = self.settle(config.jump_settle).await {
                return Some(done);
            }
            if let Some(item) = self.find() {
                info!(stage, "Found during staged jump");
                return Some(SearchResult::Found(item));
            }

            let loading = self.controller.detector.is_loading(self.view);
            self.view.scroll_by(config.nudge_px * direction.sign());
            let wait = if loading || stage == stages {
                config.load_wait_timeout
            } else {
                config.jump_idle_wait
            };
            if self.wait_for_content(wait).await {
                if let Some(item) = self.find() {
                    info!(stage, "Found after content loaded during staged jump");
                    return Some(SearchResult::Found(item));
                }
            }
        }
        None
    }

    async fn scan(&mut self, direction: Direction) -> ScanEnd {
        let config = self.config().clone();
        let mut stalls = StallCounter::new(config.min_displacement_px);

        loop {
            if let Some(done) = self.terminal() {
                return ScanEnd::Done(done);
            }
            self.report(SearchPhase::Scanning(direction));

            let viewport = self.view.viewport();
            let before = viewport.scroll_y;
            self.view
                .scroll_by(viewport.height * config.scan_step_viewports * direction.sign());
            if let Some(done) = self.settle(config.scan_settle).await {
                return ScanEnd::Done(done);
            }
            if let Some(item) = self.find() {
                return ScanEnd::Done(SearchResult::Found(item));
            }

            let after = self.view.viewport().scroll_y;
            let stalled = stalls.observe(after - before);
            debug!(%direction, before, after, stalled, "Scan step");
            if stalled == 0 {
                continue;
            }

            if direction == Direction::Down && stalled == config.load_wait_at_no_progress {
                match self.load_wait().await {
                    LoadWait::Done(result) => return ScanEnd::Done(result),
                    LoadWait::Loaded => {
                        stalls.reset();
                        continue;
                    }
                    LoadWait::Nothing => {}
                }
            }

            if stalled >= config.abandon_at_no_progress {
                return ScanEnd::Exhausted;
            }
        }
    }

    /// Park at the bottom, nudge to trigger a fetch, and wait for it.
    async fn load_wait(&mut self) -> LoadWait {
        let config = self.config().clone();
        self.report(SearchPhase::WaitingForContent);

        let bottom = self.view.viewport().max_scroll_y();
        self.view.scroll_to(bottom, ScrollBehavior::Instant);
        info!(bottom, "Stalled going down, waiting for the feed to load more");
        if let Some(done) = self.settle(config.bottom_settle).await {
            return LoadWait::Done(done);
        }
        self.view.scroll_by(config.nudge_px);
        if let Some(done) = self.settle(config.nudge_settle).await {
            return LoadWait::Done(done);
        }

        let loaded = self.wait_for_content(config.load_wait_timeout).await;
        if let Some(item) = self.find() {
            return LoadWait::Done(SearchResult::Found(item));
        }
        if loaded {
            info!(elements = self.view.element_count(), "More posts loaded");
            LoadWait::Loaded
        } else {
            debug!("Nothing loaded while waiting at the bottom");
            LoadWait::Nothing
        }
    }
}
