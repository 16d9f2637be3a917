use feedmark_common::RenderedElement;

/// Decides how a rendered element is flagged. Swappable so the heuristics can
/// follow markup changes without touching the scanner.
pub trait ItemClassifier: Send + Sync {
    fn is_promoted(&self, element: &RenderedElement) -> bool;

    fn has_social_context(&self, element: &RenderedElement) -> bool;
}

/// Label-keyword classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    promoted_labels: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(promoted_labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            promoted_labels: promoted_labels
                .into_iter()
                .map(|l| l.into().to_lowercase())
                .collect(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(["Ad", "Promoted"])
    }
}

impl ItemClassifier for KeywordClassifier {
    fn is_promoted(&self, element: &RenderedElement) -> bool {
        element.labels.iter().any(|label| {
            let label = label.trim().to_lowercase();
            self.promoted_labels.iter().any(|p| *p == label)
        })
    }

    fn has_social_context(&self, element: &RenderedElement) -> bool {
        element
            .social_context
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}
