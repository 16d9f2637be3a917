use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Anchors older than this are discarded on the next read.
pub const ANCHOR_RETENTION_DAYS: i64 = 30;

/// Maximum characters kept from an item's text.
pub const ITEM_EXCERPT_CHARS: usize = 100;

/// Maximum characters kept from a context neighbor's text.
pub const CONTEXT_EXCERPT_CHARS: usize = 50;

// --- Geometry ---

/// Vertical bounds of a rendered element, relative to the viewport top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    /// True if any part of the element lies inside a viewport of `viewport_height`.
    pub fn intersects_viewport(&self, viewport_height: f64) -> bool {
        self.top < viewport_height && self.bottom > 0.0
    }
}

/// Opaque identity of one rendered element. Two items with the same key
/// were read from the same element.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementKey(pub u64);

// --- Feed variants ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedVariant {
    /// Chronological feed of followed accounts.
    Following,
    /// Recommended feed.
    ForYou,
    /// Anything that is not the home feed (profiles, lists, search).
    Other,
}

impl std::fmt::Display for FeedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedVariant::Following => write!(f, "following"),
            FeedVariant::ForYou => write!(f, "for_you"),
            FeedVariant::Other => write!(f, "other"),
        }
    }
}

// --- Items ---

/// A feed entry as read from the rendered view. Re-derived on every scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: ElementKey,
    pub id: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub author_handle: Option<String>,
    pub author_name: Option<String>,
    pub timestamp: Option<String>,
    pub rect: Rect,
    pub has_social_context: bool,
    pub is_promoted: bool,
}

impl Item {
    pub fn top(&self) -> f64 {
        self.rect.top
    }

    /// Reduce to the fields kept for a context neighbor.
    pub fn to_context(&self) -> ContextItem {
        ContextItem {
            id: self.id.clone(),
            handle: self.author_handle.clone(),
            text: self
                .text
                .as_deref()
                .map(|t| truncate_chars(t, CONTEXT_EXCERPT_CHARS)),
        }
    }
}

/// The visible item used as a save point, with its neighbors in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWithContext {
    pub item: Item,
    pub before: Option<Item>,
    pub after: Option<Item>,
}

// --- Anchor ---

/// A neighbor of the anchored item at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Option<String>,
    pub handle: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorContext {
    pub before: Option<ContextItem>,
    pub after: Option<ContextItem>,
}

/// Durable record of a reading position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredAnchor")]
pub struct Anchor {
    pub item_id: Option<String>,
    pub item_url: Option<String>,
    pub text: Option<String>,
    pub author_handle: Option<String>,
    pub author_name: Option<String>,
    /// The item's own relative timestamp as displayed ("7h", "Aug 23").
    pub item_timestamp: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub scroll_y: Option<f64>,
    /// Distance from the viewport top to the item's top at capture time.
    pub offset_top: Option<f64>,
    pub page_url: Option<String>,
    /// Feed variant active at capture. Offsets only hold on this variant.
    pub feed_variant: FeedVariant,
    pub has_social_context: bool,
    pub is_promoted: bool,
    pub context: AnchorContext,
}

/// On-disk shape of an anchor. Older files carry `is_following_feed`
/// instead of `feed_variant`.
#[derive(Deserialize)]
struct StoredAnchor {
    item_id: Option<String>,
    item_url: Option<String>,
    text: Option<String>,
    author_handle: Option<String>,
    author_name: Option<String>,
    item_timestamp: Option<String>,
    captured_at: DateTime<Utc>,
    scroll_y: Option<f64>,
    offset_top: Option<f64>,
    page_url: Option<String>,
    #[serde(default)]
    feed_variant: Option<FeedVariant>,
    #[serde(default)]
    is_following_feed: bool,
    #[serde(default)]
    has_social_context: bool,
    #[serde(default)]
    is_promoted: bool,
    #[serde(default)]
    context: AnchorContext,
}

impl From<StoredAnchor> for Anchor {
    fn from(stored: StoredAnchor) -> Self {
        let feed_variant = stored.feed_variant.unwrap_or(if stored.is_following_feed {
            FeedVariant::Following
        } else {
            FeedVariant::Other
        });
        Self {
            item_id: stored.item_id,
            item_url: stored.item_url,
            text: stored.text,
            author_handle: stored.author_handle,
            author_name: stored.author_name,
            item_timestamp: stored.item_timestamp,
            captured_at: stored.captured_at,
            scroll_y: stored.scroll_y,
            offset_top: stored.offset_top,
            page_url: stored.page_url,
            feed_variant,
            has_social_context: stored.has_social_context,
            is_promoted: stored.is_promoted,
            context: stored.context,
        }
    }
}

impl Anchor {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.age(now) > retention
    }

    /// Default retention window.
    pub fn retention() -> Duration {
        Duration::days(ANCHOR_RETENTION_DAYS)
    }
}

// --- Search outcome ---

/// Outcome of one directional search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Found(Item),
    TimedOut,
    Cancelled,
    NoMoreContent,
    NotFound,
}

impl SearchResult {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchResult::Found(_))
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            SearchResult::Found(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchResult::Found(_) => "found",
            SearchResult::TimedOut => "timed_out",
            SearchResult::Cancelled => "cancelled",
            SearchResult::NoMoreContent => "no_more_content",
            SearchResult::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Take at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
