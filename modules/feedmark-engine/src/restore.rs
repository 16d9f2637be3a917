use tracing::info;

use feedmark_common::{FeedView, Item, ScrollBehavior};

/// Offset that puts `item_top` back at `offset_top` below the viewport top.
/// A missing offset aligns the item with the viewport top.
pub fn target_scroll_y(current_scroll_y: f64, item_top: f64, offset_top: Option<f64>) -> f64 {
    current_scroll_y + item_top - offset_top.unwrap_or(0.0)
}

/// Issues the final scroll for a located item.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestorationExecutor;

impl RestorationExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Scroll so `item` sits where it sat at capture time. Returns the target
    /// offset.
    pub fn restore(&self, view: &dyn FeedView, item: &Item, offset_top: Option<f64>) -> f64 {
        let current = view.viewport().scroll_y;
        let target = target_scroll_y(current, item.top(), offset_top);
        self.scroll_to(view, target);
        target
    }

    pub fn scroll_to(&self, view: &dyn FeedView, target: f64) {
        info!(target, "Scrolling to restored position");
        view.scroll_to(target, ScrollBehavior::Smooth);
    }
}

#[cfg(test)]
mod tests {
    use feedmark_common::FeedView;

    use super::*;
    use crate::scanner::Scanner;
    use crate::testing::{element, StaticView};

    #[test]
    fn target_keeps_saved_offset_from_viewport_top() {
        assert_eq!(target_scroll_y(500.0, 120.0, Some(80.0)), 540.0);
        assert_eq!(target_scroll_y(500.0, 120.0, None), 620.0);
        assert_eq!(target_scroll_y(0.0, -40.0, Some(10.0)), -50.0);
    }

    #[test]
    fn restore_issues_one_smooth_scroll() {
        let view = StaticView::new(800.0)
            .with(element(1, "1"), 0.0, 300.0)
            .with(element(2, "2"), 1120.0, 300.0)
            .document_height(5000.0)
            .scrolled_to(1000.0);
        let item = Scanner::new("https://x.com").find_by_id(&view, "2", false).unwrap();

        let target = RestorationExecutor::new().restore(&view, &item, Some(80.0));

        assert_eq!(target, 1040.0);
        assert_eq!(view.scroll_to_calls(), vec![(1040.0, ScrollBehavior::Smooth)]);
        assert_eq!(view.viewport().scroll_y, 1040.0);
    }
}
