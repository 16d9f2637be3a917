//! SimulatedFeed: a virtualized, lazily loaded timeline.
//!
//! Posts are stacked top to bottom in document order. Only the loaded prefix
//! of the timeline exists in the document; the rest sits in a backlog that is
//! fetched one page at a time once the viewport nears the end. Of the loaded
//! posts, only those within `overscan_px` of the viewport are rendered.
//!
//! Fetches complete after `fetch_latency` on the current tokio runtime, or
//! immediately when there is none. Every content change bumps a `watch`
//! counter so waiters can react without polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use feedmark_common::{
    ElementKey, FeedVariant, FeedView, Marker, Rect, RenderedElement, ScrollBehavior, Viewport,
};

use crate::snapshot::{FeedLog, LogEntry};
use crate::types::{SimFeedConfig, SimPost};

const LOADING_TEXT: &str = "Loading…";

#[derive(Debug, Clone)]
struct Slot {
    key: u64,
    post: SimPost,
}

#[derive(Debug, Default)]
struct Timeline {
    loaded: Vec<Slot>,
    backlog: Vec<SimPost>,
    fetching: bool,
    /// Generate filler posts once the backlog runs dry.
    endless: bool,
    next_generated: u64,
}

impl Timeline {
    fn has_more(&self) -> bool {
        self.endless || !self.backlog.is_empty()
    }

    fn height(&self) -> f64 {
        self.loaded.iter().map(|s| s.post.height).sum()
    }

    /// Document offset of each loaded slot.
    fn layout(&self) -> impl Iterator<Item = (f64, &Slot)> {
        self.loaded.iter().scan(0.0, |top, slot| {
            let at = *top;
            *top += slot.post.height;
            Some((at, slot))
        })
    }
}

struct FeedState {
    config: SimFeedConfig,
    created: Instant,
    scroll_y: f64,
    active: FeedVariant,
    timelines: HashMap<FeedVariant, Timeline>,
    next_key: u64,
    log: FeedLog,
}

impl FeedState {
    fn at_ms(&self) -> u64 {
        self.created.elapsed().as_millis() as u64
    }

    fn timeline(&self) -> Option<&Timeline> {
        self.timelines.get(&self.active)
    }

    fn timeline_mut(&mut self) -> Option<&mut Timeline> {
        self.timelines.get_mut(&self.active)
    }

    fn document_height(&self) -> f64 {
        let content = self.timeline().map(Timeline::height).unwrap_or(0.0);
        content.max(self.config.viewport_height)
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            scroll_y: self.scroll_y,
            height: self.config.viewport_height,
            document_height: self.document_height(),
        }
    }

    fn clamp_scroll(&mut self) {
        let max = self.viewport().max_scroll_y();
        self.scroll_y = self.scroll_y.clamp(0.0, max);
    }

    fn window(&self) -> (f64, f64) {
        (
            self.scroll_y - self.config.overscan_px,
            self.scroll_y + self.config.viewport_height + self.config.overscan_px,
        )
    }

    fn rendered(&self) -> Vec<(f64, &Slot)> {
        let (from, to) = self.window();
        self.timeline()
            .map(|t| {
                t.layout()
                    .filter(|(top, slot)| *top < to && top + slot.post.height > from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }

    fn slot(&mut self, post: SimPost) -> Slot {
        Slot {
            key: self.take_key(),
            post,
        }
    }

    /// Move up to one page from the backlog into the document.
    fn load_page(&mut self, variant: FeedVariant) -> usize {
        let page_size = self.config.page_size;
        let Some(timeline) = self.timelines.get_mut(&variant) else {
            return 0;
        };
        if timeline.backlog.is_empty() && timeline.endless {
            let start = timeline.next_generated;
            timeline.backlog = (start..start + page_size as u64).map(SimPost::numbered).collect();
            timeline.next_generated += page_size as u64;
        }
        let count = page_size.min(timeline.backlog.len());
        let page: Vec<SimPost> = timeline.backlog.drain(..count).collect();
        let slots: Vec<Slot> = page.into_iter().map(|p| self.slot(p)).collect();
        if let Some(timeline) = self.timelines.get_mut(&variant) {
            timeline.loaded.extend(slots);
        }
        count
    }

    fn should_fetch(&self) -> bool {
        let Some(timeline) = self.timeline() else {
            return false;
        };
        !timeline.fetching
            && timeline.has_more()
            && self.viewport().distance_to_bottom() < self.config.fetch_trigger_px
    }

    fn end_marker_rendered(&self) -> bool {
        let Some(timeline) = self.timeline() else {
            return false;
        };
        let (_, to) = self.window();
        self.config.end_marker
            && !timeline.has_more() && !timeline.fetching && timeline.height() <= to
    }
}

/// A `FeedView` over an in-memory timeline. Cheap to share behind an `Arc`.
pub struct SimulatedFeed {
    state: Arc<Mutex<FeedState>>,
    changes: Arc<watch::Sender<u64>>,
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimulatedFeed {
    /// A Following timeline over `posts` with the first page loaded.
    pub fn new(config: SimFeedConfig, posts: Vec<SimPost>) -> Self {
        let (changes, _) = watch::channel(0);
        let feed = Self {
            state: Arc::new(Mutex::new(FeedState {
                config,
                created: Instant::now(),
                scroll_y: 0.0,
                active: FeedVariant::Following,
                timelines: HashMap::new(),
                next_key: 0,
                log: FeedLog::new(),
            })),
            changes: Arc::new(changes),
        };
        feed.add_timeline(FeedVariant::Following, posts, false);
        feed
    }

    /// `total` numbered filler posts.
    pub fn numbered(config: SimFeedConfig, total: u64) -> Self {
        Self::new(config, (0..total).map(SimPost::numbered).collect())
    }

    /// A Following timeline that never ends.
    pub fn endless(config: SimFeedConfig) -> Self {
        let feed = Self::new(config, Vec::new());
        feed.add_timeline(FeedVariant::Following, Vec::new(), true);
        feed
    }

    /// Add (or replace) the timeline behind a feed tab.
    pub fn with_variant(self, variant: FeedVariant, posts: Vec<SimPost>) -> Self {
        self.add_timeline(variant, posts, false);
        self
    }

    /// Start on `variant` instead of Following.
    pub fn starting_on(self, variant: FeedVariant) -> Self {
        lock(&self.state).active = variant;
        self
    }

    pub fn at_url(self, url: &str) -> Self {
        lock(&self.state).config.page_url = url.to_string();
        self
    }

    fn add_timeline(&self, variant: FeedVariant, posts: Vec<SimPost>, endless: bool) {
        let mut state = lock(&self.state);
        state.timelines.insert(
            variant,
            Timeline {
                backlog: posts,
                endless,
                ..Default::default()
            },
        );
        state.load_page(variant);
    }

    fn notify(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    // -----------------------------------------------------------------------
    // Scenario hooks
    // -----------------------------------------------------------------------

    /// New posts arrive above everything loaded. The scroll offset is left
    /// alone, so whatever was on screen shifts down.
    pub fn prepend(&self, posts: Vec<SimPost>) {
        {
            let mut state = lock(&self.state);
            let count = posts.len();
            let slots: Vec<Slot> = posts.into_iter().map(|p| state.slot(p)).collect();
            let Some(timeline) = state.timeline_mut() else {
                return;
            };
            let below = std::mem::take(&mut timeline.loaded);
            timeline.loaded = slots.into_iter().chain(below).collect();
            let at_ms = state.at_ms();
            state.log.push(LogEntry::Prepended { at_ms, count });
            debug!(count, "Prepended posts");
        }
        self.notify();
    }

    /// Delete every copy of a post, loaded or not. Returns how many went.
    pub fn remove(&self, id: &str) -> usize {
        let copies = {
            let mut state = lock(&self.state);
            let Some(timeline) = state.timeline_mut() else {
                return 0;
            };
            let before = timeline.loaded.len() + timeline.backlog.len();
            timeline.loaded.retain(|s| s.post.id != id);
            timeline.backlog.retain(|p| p.id != id);
            let copies = before - timeline.loaded.len() - timeline.backlog.len();
            state.clamp_scroll();
            let at_ms = state.at_ms();
            state.log.push(LogEntry::Removed {
                at_ms,
                id: id.to_string(),
                copies,
            });
            copies
        };
        if copies > 0 {
            self.notify();
        }
        copies
    }

    /// Put `post` at `index` in timeline order, loaded or not.
    pub fn insert(&self, index: usize, post: SimPost) {
        {
            let mut state = lock(&self.state);
            let id = post.id.clone();
            let slot = state.slot(post);
            let Some(timeline) = state.timeline_mut() else {
                return;
            };
            if index <= timeline.loaded.len() {
                timeline.loaded.insert(index, slot);
            } else {
                let at = (index - timeline.loaded.len()).min(timeline.backlog.len());
                timeline.backlog.insert(at, slot.post);
            }
            let at_ms = state.at_ms();
            state.log.push(LogEntry::Inserted { at_ms, id, index });
        }
        self.notify();
    }

    /// Re-surface an existing post at `index` with a repost annotation.
    /// Returns false when the post isn't in the timeline.
    pub fn repost(&self, id: &str, by: &str, index: usize) -> bool {
        let original = {
            let state = lock(&self.state);
            state.timeline().and_then(|t| {
                t.loaded
                    .iter()
                    .map(|s| &s.post)
                    .chain(t.backlog.iter())
                    .find(|p| p.id == id && p.reposted_by.is_none())
                    .cloned()
            })
        };
        match original {
            Some(post) => {
                self.insert(index, post.reposted_by(by));
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn scroll_y(&self) -> f64 {
        lock(&self.state).scroll_y
    }

    pub fn loaded_count(&self) -> usize {
        lock(&self.state).timeline().map_or(0, |t| t.loaded.len())
    }

    pub fn is_fetching(&self) -> bool {
        lock(&self.state).timeline().is_some_and(|t| t.fetching)
    }

    /// Document offset of the first loaded copy of `id`.
    pub fn doc_top_of(&self, id: &str) -> Option<f64> {
        let state = lock(&self.state);
        let timeline = state.timeline()?;
        let top = timeline
            .layout()
            .find(|(_, slot)| slot.post.id == id)
            .map(|(top, _)| top);
        top
    }

    /// Load pages synchronously until `id` is in the document.
    pub fn load_through(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        let variant = state.active;
        loop {
            let present = state
                .timeline()
                .is_some_and(|t| t.loaded.iter().any(|s| s.post.id == id));
            if present {
                return true;
            }
            let more = state
                .timeline()
                .is_some_and(|t| !t.backlog.is_empty());
            if !more || state.load_page(variant) == 0 {
                return false;
            }
        }
    }

    pub fn log(&self) -> FeedLog {
        lock(&self.state).log.clone()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    fn maybe_fetch(&self) {
        let (variant, latency) = {
            let mut state = lock(&self.state);
            if !state.should_fetch() {
                return;
            }
            let variant = state.active;
            let loaded = state.timeline().map_or(0, |t| t.loaded.len());
            if let Some(timeline) = state.timeline_mut() {
                timeline.fetching = true;
            }
            let at_ms = state.at_ms();
            state.log.push(LogEntry::FetchStarted { at_ms, loaded });
            debug!(%variant, loaded, "Fetching next page");
            (variant, state.config.fetch_latency)
        };
        self.notify();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let state = self.state.clone();
                let changes = self.changes.clone();
                handle.spawn(async move {
                    tokio::time::sleep(latency).await;
                    complete_fetch(&state, variant);
                    changes.send_modify(|v| *v = v.wrapping_add(1));
                });
            }
            Err(_) => {
                complete_fetch(&self.state, variant);
                self.notify();
            }
        }
    }
}

fn complete_fetch(state: &Mutex<FeedState>, variant: FeedVariant) {
    let mut state = lock(state);
    let added = state.load_page(variant);
    let loaded = match state.timelines.get_mut(&variant) {
        Some(timeline) => {
            timeline.fetching = false;
            timeline.loaded.len()
        }
        None => 0,
    };
    let at_ms = state.at_ms();
    state.log.push(LogEntry::FetchCompleted {
        at_ms,
        added,
        loaded,
    });
    debug!(%variant, added, loaded, "Page arrived");
}

impl FeedView for SimulatedFeed {
    fn viewport(&self) -> Viewport {
        lock(&self.state).viewport()
    }

    fn elements(&self) -> Vec<RenderedElement> {
        let state = lock(&self.state);
        state
            .rendered()
            .into_iter()
            .map(|(_, slot)| render(slot))
            .collect()
    }

    fn rect(&self, key: ElementKey) -> Option<Rect> {
        let state = lock(&self.state);
        let scroll_y = state.scroll_y;
        state
            .rendered()
            .into_iter()
            .find(|(_, slot)| ElementKey(slot.key) == key)
            .map(|(top, slot)| Rect::new(top - scroll_y, top - scroll_y + slot.post.height))
    }

    fn element_count(&self) -> usize {
        lock(&self.state).rendered().len()
    }

    fn has_marker(&self, marker: Marker) -> bool {
        let state = lock(&self.state);
        match marker {
            Marker::ProgressBar | Marker::LoadingSpinner => {
                state.timeline().is_some_and(|t| t.fetching)
            }
            Marker::Placeholder => false,
            Marker::EndOfFeed => state.end_marker_rendered(),
        }
    }

    fn text_fragments(&self) -> Vec<String> {
        let state = lock(&self.state);
        if state.timeline().is_some_and(|t| t.fetching) {
            vec![LOADING_TEXT.to_string()]
        } else {
            Vec::new()
        }
    }

    fn scroll_to(&self, y: f64, behavior: ScrollBehavior) {
        {
            let mut state = lock(&self.state);
            let at_ms = state.at_ms();
            state.log.push(LogEntry::ScrollTo {
                at_ms,
                y,
                smooth: behavior == ScrollBehavior::Smooth,
            });
            state.scroll_y = y;
            state.clamp_scroll();
        }
        self.maybe_fetch();
    }

    fn scroll_by(&self, dy: f64) {
        {
            let mut state = lock(&self.state);
            let at_ms = state.at_ms();
            state.log.push(LogEntry::ScrollBy { at_ms, dy });
            state.scroll_y += dy;
            state.clamp_scroll();
        }
        self.maybe_fetch();
    }

    fn mutations(&self) -> Option<watch::Receiver<u64>> {
        Some(self.changes.subscribe())
    }

    fn page_url(&self) -> String {
        lock(&self.state).config.page_url.clone()
    }

    fn feed_variant(&self) -> FeedVariant {
        lock(&self.state).active
    }

    fn select_variant(&self, variant: FeedVariant) -> bool {
        {
            let mut state = lock(&self.state);
            if !state.timelines.contains_key(&variant) {
                return false;
            }
            state.active = variant;
            state.scroll_y = 0.0;
            let at_ms = state.at_ms();
            state.log.push(LogEntry::VariantSelected { at_ms, variant });
        }
        self.notify();
        true
    }
}

fn render(slot: &Slot) -> RenderedElement {
    let post = &slot.post;
    RenderedElement {
        key: ElementKey(slot.key),
        status_href: Some(post.status_href()),
        text: Some(post.text.clone()),
        author_handle: Some(post.handle.clone()),
        author_name: Some(post.name.clone()),
        timestamp: post.timestamp.clone(),
        social_context: post.reposted_by.as_ref().map(|who| format!("{who} reposted")),
        labels: if post.promoted {
            vec!["Promoted".to_string()]
        } else {
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> SimFeedConfig {
        SimFeedConfig {
            page_size: 10,
            ..Default::default()
        }
    }

    fn uniform(total: u64) -> Vec<SimPost> {
        (0..total)
            .map(|n| SimPost::numbered(n).with_height(300.0))
            .collect()
    }

    #[test]
    fn first_page_is_loaded_up_front() {
        let feed = SimulatedFeed::new(config(), uniform(35));
        assert_eq!(feed.loaded_count(), 10);
        assert_eq!(feed.viewport().document_height, 3000.0);
    }

    #[test]
    fn only_posts_near_the_viewport_are_rendered() {
        let feed = SimulatedFeed::new(config(), uniform(10));
        // window is [-1000, 1800): posts at 0..1500 are rendered
        assert_eq!(feed.element_count(), 6);
        let first = feed.elements().remove(0);
        assert_eq!(feed.rect(first.key), Some(Rect::new(0.0, 300.0)));
    }

    #[test]
    fn scrolling_near_the_end_fetches_synchronously_without_runtime() {
        let feed = SimulatedFeed::new(config(), uniform(35));
        feed.scroll_to(1500.0, ScrollBehavior::Instant);
        // 3000 - 2300 = 700 < 1500
        assert_eq!(feed.loaded_count(), 20);
        assert!(!feed.is_fetching());
        assert_eq!(feed.log().fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_completes_after_latency() {
        let feed = SimulatedFeed::new(config(), uniform(35));
        let changes = feed.mutations().unwrap();

        feed.scroll_to(1500.0, ScrollBehavior::Instant);
        assert!(feed.is_fetching());
        assert!(feed.has_marker(Marker::ProgressBar));
        assert_eq!(feed.text_fragments(), vec!["Loading…".to_string()]);

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(changes.has_changed().unwrap());
        assert!(!feed.is_fetching());
        assert_eq!(feed.loaded_count(), 20);
        assert_eq!(feed.viewport().document_height, 6000.0);
    }

    #[test]
    fn end_marker_appears_once_everything_is_loaded_and_near() {
        let feed = SimulatedFeed::new(config(), uniform(12));
        assert!(!feed.has_marker(Marker::EndOfFeed));
        feed.scroll_to(1500.0, ScrollBehavior::Instant);
        assert_eq!(feed.loaded_count(), 12);
        feed.scroll_to(10_000.0, ScrollBehavior::Instant);
        assert!(feed.has_marker(Marker::EndOfFeed));
        feed.scroll_to(0.0, ScrollBehavior::Instant);
        assert!(!feed.has_marker(Marker::EndOfFeed));
    }

    #[test]
    fn endless_feed_keeps_generating() {
        let feed = SimulatedFeed::endless(config());
        for _ in 0..5 {
            let bottom = feed.viewport().max_scroll_y();
            feed.scroll_to(bottom, ScrollBehavior::Instant);
        }
        assert_eq!(feed.loaded_count(), 60);
        assert!(!feed.has_marker(Marker::EndOfFeed));
    }

    #[test]
    fn prepend_shifts_content_down() {
        let feed = SimulatedFeed::new(config(), uniform(10));
        let id = SimPost::numbered(2).id;
        assert_eq!(feed.doc_top_of(&id), Some(600.0));
        feed.prepend(vec![SimPost::new("1", "@new", "fresh").with_height(250.0)]);
        assert_eq!(feed.doc_top_of(&id), Some(850.0));
        assert_eq!(feed.scroll_y(), 0.0);
    }

    #[test]
    fn remove_and_repost() {
        let feed = SimulatedFeed::new(config(), uniform(30));
        let id = SimPost::numbered(4).id;

        assert!(feed.repost(&id, "Dana", 0));
        let copies: Vec<_> = feed
            .elements()
            .into_iter()
            .filter(|e| e.status_href.as_deref().is_some_and(|h| h.ends_with(&id)))
            .collect();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].social_context.as_deref(), Some("Dana reposted"));

        assert_eq!(feed.remove(&id), 2);
        assert_eq!(feed.doc_top_of(&id), None);
        assert!(!feed.repost("nope", "Dana", 0));
    }

    #[test]
    fn load_through_reaches_backlog() {
        let feed = SimulatedFeed::new(config(), uniform(50));
        let id = SimPost::numbered(33).id;
        assert!(feed.load_through(&id));
        assert_eq!(feed.loaded_count(), 40);
        assert_eq!(feed.doc_top_of(&id), Some(9900.0));
    }

    #[test]
    fn variants_have_their_own_timelines() {
        let feed = SimulatedFeed::new(config(), uniform(10))
            .with_variant(FeedVariant::ForYou, vec![SimPost::new("7", "@x", "rec")])
            .starting_on(FeedVariant::ForYou);
        assert_eq!(feed.loaded_count(), 1);

        feed.scroll_to(200.0, ScrollBehavior::Instant);
        assert!(feed.select_variant(FeedVariant::Following));
        assert_eq!(feed.feed_variant(), FeedVariant::Following);
        assert_eq!(feed.scroll_y(), 0.0);
        assert_eq!(feed.loaded_count(), 10);
        assert!(!feed.select_variant(FeedVariant::Other));
    }

    #[test]
    fn promoted_posts_carry_a_label() {
        let feed = SimulatedFeed::new(config(), vec![SimPost::new("1", "@ad", "buy").promoted()]);
        assert_eq!(feed.elements()[0].labels, vec!["Promoted".to_string()]);
    }
}
