// Test doubles for the engine.
//
// StaticView is a scripted FeedView: elements are placed at fixed document
// offsets, the document never grows on its own, and every scroll call is
// recorded for assertions. Optional render window simulates virtualization.
//
// Dynamic loading scenarios use the `simfeed` crate instead.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use feedmark_common::{
    ElementKey, FeedVariant, FeedView, Marker, Rect, RenderedElement, ScrollBehavior, Viewport,
};

// ---------------------------------------------------------------------------
// Element builder
// ---------------------------------------------------------------------------

/// Builder for a `RenderedElement` with a status link for `id`.
pub struct ElementSpec {
    element: RenderedElement,
    id: String,
}

pub fn element(key: u64, id: &str) -> ElementSpec {
    ElementSpec {
        element: RenderedElement {
            key: ElementKey(key),
            status_href: Some(format!("/user/status/{id}")),
            text: Some(format!("post {id}")),
            ..Default::default()
        },
        id: id.to_string(),
    }
}

impl ElementSpec {
    /// Sets the handle and rewrites the status link to match it.
    pub fn author(mut self, handle: &str) -> Self {
        self.element.status_href = Some(format!(
            "/{}/status/{}",
            handle.trim_start_matches('@'),
            self.id
        ));
        self.element.author_handle = Some(handle.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.element.author_name = Some(name.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.element.text = Some(text.to_string());
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.element.status_href = Some(href.to_string());
        self
    }

    pub fn reposted_by(mut self, annotation: &str) -> Self {
        self.element.social_context = Some(annotation.to_string());
        self
    }

    pub fn promoted(mut self) -> Self {
        self.element.labels.push("Promoted".to_string());
        self
    }
}

impl From<ElementSpec> for RenderedElement {
    fn from(spec: ElementSpec) -> Self {
        spec.element
    }
}

// ---------------------------------------------------------------------------
// StaticView
// ---------------------------------------------------------------------------

struct Entry {
    element: RenderedElement,
    doc_top: f64,
    height: f64,
    detached: bool,
}

struct ViewState {
    viewport_height: f64,
    scroll_y: f64,
    document_height: Option<f64>,
    render_overscan: Option<f64>,
    entries: Vec<Entry>,
    markers: HashSet<Marker>,
    texts: Vec<String>,
    page_url: String,
    variant: FeedVariant,
    selectable: HashSet<FeedVariant>,
    scroll_by_calls: Vec<f64>,
    scroll_to_calls: Vec<(f64, ScrollBehavior)>,
}

impl ViewState {
    fn document_height(&self) -> f64 {
        self.document_height.unwrap_or_else(|| {
            self.entries
                .iter()
                .map(|e| e.doc_top + e.height)
                .fold(self.viewport_height, f64::max)
        })
    }

    fn clamp(&self, y: f64) -> f64 {
        let max = (self.document_height() - self.viewport_height).max(0.0);
        y.clamp(0.0, max)
    }

    fn attached(&self, entry: &Entry) -> bool {
        !entry.detached && self.in_window(entry)
    }

    fn in_window(&self, entry: &Entry) -> bool {
        match self.render_overscan {
            None => true,
            Some(overscan) => {
                let top = self.scroll_y - overscan;
                let bottom = self.scroll_y + self.viewport_height + overscan;
                entry.doc_top < bottom && entry.doc_top + entry.height > top
            }
        }
    }
}

/// Scripted feed view. Offsets given to `with` are document offsets, which
/// equal viewport offsets while the view is scrolled to the top.
pub struct StaticView {
    state: Mutex<ViewState>,
}

impl StaticView {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            state: Mutex::new(ViewState {
                viewport_height,
                scroll_y: 0.0,
                document_height: None,
                render_overscan: None,
                entries: Vec::new(),
                markers: HashSet::new(),
                texts: Vec::new(),
                page_url: "https://x.com/home".to_string(),
                variant: FeedVariant::Following,
                selectable: [FeedVariant::Following, FeedVariant::ForYou].into_iter().collect(),
                scroll_by_calls: Vec::new(),
                scroll_to_calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with(self, element: impl Into<RenderedElement>, doc_top: f64, height: f64) -> Self {
        self.lock().entries.push(Entry {
            element: element.into(),
            doc_top,
            height,
            detached: false,
        });
        self
    }

    /// Fix the document height instead of deriving it from the entries.
    pub fn document_height(self, height: f64) -> Self {
        self.lock().document_height = Some(height);
        self
    }

    /// Only attach elements within `overscan` px of the viewport.
    pub fn render_window(self, overscan: f64) -> Self {
        self.lock().render_overscan = Some(overscan);
        self
    }

    pub fn scrolled_to(self, y: f64) -> Self {
        {
            let mut state = self.lock();
            state.scroll_y = state.clamp(y);
        }
        self
    }

    pub fn detach(self, key: u64) -> Self {
        for entry in self.lock().entries.iter_mut() {
            if entry.element.key == ElementKey(key) {
                entry.detached = true;
            }
        }
        self
    }

    pub fn marker(self, marker: Marker) -> Self {
        self.lock().markers.insert(marker);
        self
    }

    pub fn text_fragment(self, text: &str) -> Self {
        self.lock().texts.push(text.to_string());
        self
    }

    pub fn at_url(self, url: &str) -> Self {
        self.lock().page_url = url.to_string();
        self
    }

    pub fn variant(self, variant: FeedVariant) -> Self {
        self.lock().variant = variant;
        self
    }

    pub fn without_selectable(self, variant: FeedVariant) -> Self {
        self.lock().selectable.remove(&variant);
        self
    }

    pub fn set_marker(&self, marker: Marker, present: bool) {
        let mut state = self.lock();
        if present {
            state.markers.insert(marker);
        } else {
            state.markers.remove(&marker);
        }
    }

    pub fn scroll_y(&self) -> f64 {
        self.lock().scroll_y
    }

    pub fn scroll_by_calls(&self) -> Vec<f64> {
        self.lock().scroll_by_calls.clone()
    }

    pub fn scroll_to_calls(&self) -> Vec<(f64, ScrollBehavior)> {
        self.lock().scroll_to_calls.clone()
    }
}

impl FeedView for StaticView {
    fn viewport(&self) -> Viewport {
        let state = self.lock();
        Viewport {
            scroll_y: state.scroll_y,
            height: state.viewport_height,
            document_height: state.document_height(),
        }
    }

    fn elements(&self) -> Vec<RenderedElement> {
        let state = self.lock();
        state
            .entries
            .iter()
            .filter(|e| state.in_window(e))
            .map(|e| e.element.clone())
            .collect()
    }

    fn rect(&self, key: ElementKey) -> Option<Rect> {
        let state = self.lock();
        let entry = state
            .entries
            .iter()
            .find(|e| e.element.key == key && state.attached(e))?;
        let top = entry.doc_top - state.scroll_y;
        Some(Rect::new(top, top + entry.height))
    }

    fn has_marker(&self, marker: Marker) -> bool {
        self.lock().markers.contains(&marker)
    }

    fn text_fragments(&self) -> Vec<String> {
        self.lock().texts.clone()
    }

    fn scroll_to(&self, y: f64, behavior: ScrollBehavior) {
        let mut state = self.lock();
        state.scroll_to_calls.push((y, behavior));
        state.scroll_y = state.clamp(y);
    }

    fn scroll_by(&self, dy: f64) {
        let mut state = self.lock();
        state.scroll_by_calls.push(dy);
        let target = state.scroll_y + dy;
        state.scroll_y = state.clamp(target);
    }

    fn page_url(&self) -> String {
        self.lock().page_url.clone()
    }

    fn feed_variant(&self) -> FeedVariant {
        self.lock().variant
    }

    fn select_variant(&self, variant: FeedVariant) -> bool {
        let mut state = self.lock();
        if !state.selectable.contains(&variant) {
            return false;
        }
        state.variant = variant;
        true
    }
}
