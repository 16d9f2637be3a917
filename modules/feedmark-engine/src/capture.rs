use chrono::{DateTime, Utc};
use tracing::debug;

use feedmark_common::{Anchor, AnchorContext, FeedView};

use crate::scanner::Scanner;

/// Snapshot the top visible item and its neighbors as an anchor.
/// `None` when nothing is rendered in the viewport.
pub fn capture_anchor(scanner: &Scanner, view: &dyn FeedView, now: DateTime<Utc>) -> Option<Anchor> {
    let found = scanner.top_visible_item_with_context(view)?;
    let viewport = view.viewport();
    let item = found.item;

    debug!(
        item_id = ?item.id,
        offset_top = item.top(),
        scroll_y = viewport.scroll_y,
        "Capturing anchor"
    );

    Some(Anchor {
        item_id: item.id.clone(),
        item_url: item.url.clone(),
        text: item.text.clone(),
        author_handle: item.author_handle.clone(),
        author_name: item.author_name.clone(),
        item_timestamp: item.timestamp.clone(),
        captured_at: now,
        scroll_y: Some(viewport.scroll_y),
        offset_top: Some(item.top()),
        page_url: Some(view.page_url()),
        feed_variant: view.feed_variant(),
        has_social_context: item.has_social_context,
        is_promoted: item.is_promoted,
        context: AnchorContext {
            before: found.before.as_ref().map(|i| i.to_context()),
            after: found.after.as_ref().map(|i| i.to_context()),
        },
    })
}

#[cfg(test)]
mod tests {
    use feedmark_common::{FeedVariant, CONTEXT_EXCERPT_CHARS};

    use super::*;
    use crate::testing::{element, StaticView};

    #[test]
    fn captures_item_offset_and_neighbors() {
        let view = StaticView::new(800.0)
            .with(element(1, "10").author("@a").text(&"b".repeat(80)), 1900.0, 200.0)
            .with(
                element(2, "11").author("@alice").name("Alice").reposted_by("Bob reposted"),
                2030.0,
                200.0,
            )
            .with(element(3, "12").author("@c"), 2230.0, 200.0)
            .document_height(20_000.0)
            .scrolled_to(2000.0);
        let now = Utc::now();

        let anchor = capture_anchor(&Scanner::new("https://x.com"), &view, now).unwrap();

        assert_eq!(anchor.item_id.as_deref(), Some("11"));
        assert_eq!(anchor.item_url.as_deref(), Some("https://x.com/alice/status/11"));
        assert_eq!(anchor.author_name.as_deref(), Some("Alice"));
        assert_eq!(anchor.scroll_y, Some(2000.0));
        assert_eq!(anchor.offset_top, Some(30.0));
        assert_eq!(anchor.captured_at, now);
        assert_eq!(anchor.feed_variant, FeedVariant::Following);
        assert!(anchor.has_social_context);
        assert_eq!(anchor.page_url.as_deref(), Some("https://x.com/home"));

        let before = anchor.context.before.unwrap();
        assert_eq!(before.id.as_deref(), Some("10"));
        assert_eq!(before.text.unwrap().chars().count(), CONTEXT_EXCERPT_CHARS);
        assert_eq!(anchor.context.after.unwrap().handle.as_deref(), Some("@c"));
    }

    #[test]
    fn records_variant_it_was_captured_on() {
        let view = StaticView::new(800.0)
            .with(element(1, "1"), 0.0, 200.0)
            .variant(FeedVariant::ForYou);
        let anchor = capture_anchor(&Scanner::new("https://x.com"), &view, Utc::now()).unwrap();
        assert_eq!(anchor.feed_variant, FeedVariant::ForYou);
        assert!(anchor.context.before.is_none());
    }

    #[test]
    fn empty_viewport_captures_nothing() {
        let view = StaticView::new(800.0)
            .with(element(1, "1"), 5000.0, 200.0)
            .document_height(10_000.0);
        assert!(capture_anchor(&Scanner::new("https://x.com"), &view, Utc::now()).is_none());
    }
}
