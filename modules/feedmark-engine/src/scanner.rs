//! Visible-item scanner.
//!
//! Reads the feed's attached elements into `Item`s. Every call re-derives
//! items from the live view; nothing is cached between scans, and elements
//! that detach mid-read are skipped rather than reported.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use feedmark_common::{
    truncate_chars, FeedView, Item, ItemWithContext, RenderedElement, ITEM_EXCERPT_CHARS,
};

use crate::classify::{ItemClassifier, KeywordClassifier};

/// An item whose top lies in this band is the natural save point.
pub const ANCHOR_BAND_TOP: f64 = -50.0;
pub const ANCHOR_BAND_BOTTOM: f64 = 100.0;

#[derive(Clone)]
pub struct Scanner {
    classifier: Arc<dyn ItemClassifier>,
    status_id: Regex,
    url_base: Option<Url>,
}

impl Scanner {
    pub fn new(url_base: &str) -> Self {
        Self::with_classifier(url_base, Arc::new(KeywordClassifier::default()))
    }

    pub fn with_classifier(url_base: &str, classifier: Arc<dyn ItemClassifier>) -> Self {
        let parsed = Url::parse(url_base);
        if let Err(e) = &parsed {
            warn!(url_base, error = %e, "Invalid item URL base, item links stay relative");
        }
        Self {
            classifier,
            status_id: Regex::new(r"/status/(\d+)").expect("valid regex"),
            url_base: parsed.ok(),
        }
    }

    /// Items intersecting the viewport, ordered by top offset.
    pub fn scan(&self, view: &dyn FeedView) -> Vec<Item> {
        let viewport_height = view.viewport().height;
        let mut items: Vec<Item> = view
            .elements()
            .into_iter()
            .filter_map(|el| self.read_item(view, el))
            .filter(|item| item.rect.intersects_viewport(viewport_height))
            .collect();
        items.sort_by(|a, b| a.rect.top.total_cmp(&b.rect.top));
        items
    }

    pub fn top_visible_item(&self, view: &dyn FeedView) -> Option<Item> {
        self.top_visible_item_with_context(view).map(|c| c.item)
    }

    /// The top visible item plus its neighbors in scan order.
    pub fn top_visible_item_with_context(&self, view: &dyn FeedView) -> Option<ItemWithContext> {
        let mut items = self.scan(view);
        let index = anchor_index(&items)?;

        let after = items.get(index + 1).cloned();
        let before = index.checked_sub(1).map(|i| items[i].clone());
        let item = items.swap_remove(index);
        Some(ItemWithContext {
            item,
            before,
            after,
        })
    }

    /// Locate an attached element for `id`, visible or not.
    ///
    /// A post can be attached twice: once as itself and once re-surfaced with
    /// a social-context annotation. `prefer_with_context` picks which of the
    /// two wins when both exist; otherwise whichever exists is returned. Among
    /// equals the topmost element wins, so repeated calls agree.
    pub fn find_by_id(&self, view: &dyn FeedView, id: &str, prefer_with_context: bool) -> Option<Item> {
        let mut matches: Vec<Item> = view
            .elements()
            .into_iter()
            .filter(|el| self.parse_id(el).as_deref() == Some(id))
            .filter_map(|el| self.read_item(view, el))
            .collect();

        if matches.len() > 1 {
            debug!(id, copies = matches.len(), "Multiple elements reference item");
        }

        matches.sort_by(|a, b| a.rect.top.total_cmp(&b.rect.top).then(a.key.cmp(&b.key)));
        let preferred = matches
            .iter()
            .position(|item| item.has_social_context == prefer_with_context);
        match preferred {
            Some(idx) => Some(matches.swap_remove(idx)),
            None => matches.into_iter().next(),
        }
    }

    fn parse_id(&self, element: &RenderedElement) -> Option<String> {
        let href = element.status_href.as_deref()?;
        self.status_id
            .captures(href)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn item_url(&self, href: &str) -> String {
        self.url_base
            .as_ref()
            .and_then(|base| base.join(href).ok())
            .map(String::from)
            .unwrap_or_else(|| href.to_string())
    }

    fn read_item(&self, view: &dyn FeedView, element: RenderedElement) -> Option<Item> {
        // Detached between listing and measuring: treat as absent.
        let rect = view.rect(element.key)?;
        let id = self.parse_id(&element);
        let url = element
            .status_href
            .as_deref()
            .filter(|_| id.is_some())
            .map(|href| self.item_url(href));

        Some(Item {
            key: element.key,
            id,
            url,
            text: element
                .text
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| truncate_chars(t, ITEM_EXCERPT_CHARS)),
            author_handle: element.author_handle.clone().filter(|h| !h.is_empty()),
            author_name: element.author_name.clone().filter(|n| !n.is_empty()),
            timestamp: element.timestamp.clone(),
            rect,
            has_social_context: self.classifier.has_social_context(&element),
            is_promoted: self.classifier.is_promoted(&element),
        })
    }
}

/// First item inside the anchor band, else the first item.
fn anchor_index(items: &[Item]) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    let in_band = items
        .iter()
        .position(|i| i.rect.top >= ANCHOR_BAND_TOP && i.rect.top <= ANCHOR_BAND_BOTTOM);
    Some(in_band.unwrap_or(0))
}
