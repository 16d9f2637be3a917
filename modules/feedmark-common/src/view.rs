//! The live rendered feed, as seen by the search engine.
//!
//! `FeedView` is the only seam between the engine and whatever renders the
//! feed (a browser page, a terminal reader, the `simfeed` simulator). The
//! engine reads geometry and elements through it and writes nothing but the
//! scroll position.

use tokio::sync::watch;
use url::{ParseError, Url};

use crate::types::{ElementKey, FeedVariant, Rect};

/// Raw fields of one attached feed element, before classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedElement {
    pub key: ElementKey,
    /// Link to the item's own page, e.g. `/alice/status/12345`.
    pub status_href: Option<String>,
    pub text: Option<String>,
    pub author_handle: Option<String>,
    pub author_name: Option<String>,
    pub timestamp: Option<String>,
    /// Annotation such as "Bob reposted" shown above the item.
    pub social_context: Option<String>,
    /// Badges rendered on the element ("Ad", "Promoted", ...).
    pub labels: Vec<String>,
}

/// Page-level indicators the load-state heuristics look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    ProgressBar,
    Placeholder,
    LoadingSpinner,
    EndOfFeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Scroll geometry of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_y: f64,
    pub height: f64,
    pub document_height: f64,
}

impl Viewport {
    pub fn max_scroll_y(&self) -> f64 {
        (self.document_height - self.height).max(0.0)
    }

    /// Pixels between the bottom of the viewport and the end of the document.
    pub fn distance_to_bottom(&self) -> f64 {
        self.document_height - (self.scroll_y + self.height)
    }
}

pub trait FeedView: Send + Sync {
    fn viewport(&self) -> Viewport;

    /// All feed elements currently attached, in no particular order.
    fn elements(&self) -> Vec<RenderedElement>;

    /// Bounds of an element, or `None` if it was detached since it was listed.
    fn rect(&self, key: ElementKey) -> Option<Rect>;

    fn element_count(&self) -> usize {
        self.elements().len()
    }

    fn has_marker(&self, marker: Marker) -> bool;

    /// Text fragments rendered anywhere in the feed column.
    fn text_fragments(&self) -> Vec<String>;

    fn scroll_to(&self, y: f64, behavior: ScrollBehavior);

    fn scroll_by(&self, dy: f64);

    /// Change notifications, if the host can deliver them. The value is a
    /// generation counter bumped on every structural change.
    fn mutations(&self) -> Option<watch::Receiver<u64>> {
        None
    }

    fn page_url(&self) -> String;

    fn feed_variant(&self) -> FeedVariant;

    /// Ask the host to activate a feed variant. Returns false if the control
    /// for that variant is not available. The switch may complete later.
    fn select_variant(&self, variant: FeedVariant) -> bool;
}

/// Path component of a page URL (`https://x.com/home?x=1` → `/home`).
///
/// Input without a scheme is read as a path when it starts with `/` and as
/// `host/path` otherwise. Unparseable input is returned unchanged.
pub fn url_path(url: &str) -> String {
    let parsed = Url::parse(url).or_else(|e| match e {
        ParseError::RelativeUrlWithoutBase if url.starts_with('/') => {
            Url::parse(&format!("http://localhost{url}"))
        }
        ParseError::RelativeUrlWithoutBase => Url::parse(&format!("https://{url}")),
        other => Err(other),
    });
    match parsed {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_distance_to_bottom() {
        let vp = Viewport {
            scroll_y: 1000.0,
            height: 800.0,
            document_height: 2500.0,
        };
        assert_eq!(vp.distance_to_bottom(), 700.0);
        assert_eq!(vp.max_scroll_y(), 1700.0);
    }

    #[test]
    fn short_document_has_zero_max_scroll() {
        let vp = Viewport {
            scroll_y: 0.0,
            height: 800.0,
            document_height: 300.0,
        };
        assert_eq!(vp.max_scroll_y(), 0.0);
    }

    #[test]
    fn url_path_strips_host_and_query() {
        assert_eq!(url_path("https://x.com/home?src=1"), "/home");
        assert_eq!(url_path("https://x.com"), "/");
        assert_eq!(url_path("/home#top"), "/home");
    }

    #[test]
    fn url_path_reads_schemeless_host() {
        assert_eq!(url_path("x.com/home"), "/home");
        assert_eq!(url_path("x.com/home?src=1"), "/home");
        assert_eq!(url_path("x.com"), "/");
    }
}
