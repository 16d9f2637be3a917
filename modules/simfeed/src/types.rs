//! Posts and settings for the simulated feed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A post in the simulated timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimPost {
    pub id: String,
    pub handle: String,
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Rendered height in px.
    pub height: f64,
    #[serde(default)]
    pub promoted: bool,
    /// Display name of whoever reposted it, rendered as social context.
    #[serde(default)]
    pub reposted_by: Option<String>,
}

impl SimPost {
    pub fn new(id: impl Into<String>, handle: &str, text: &str) -> Self {
        let bare = handle.trim_start_matches('@');
        Self {
            id: id.into(),
            handle: format!("@{bare}"),
            name: bare.to_string(),
            text: text.to_string(),
            timestamp: None,
            height: 300.0,
            promoted: false,
            reposted_by: None,
        }
    }

    /// Deterministic filler post. Heights vary between 220 and 380 px.
    pub fn numbered(n: u64) -> Self {
        let author = n % 17;
        Self {
            id: (1_000_000 + n).to_string(),
            handle: format!("@user{author}"),
            name: format!("User {author}"),
            text: format!("Post number {n} from user {author}, going on about something or other"),
            timestamp: Some(format!("{}h", n % 23 + 1)),
            height: 220.0 + ((n * 53) % 5) as f64 * 40.0,
            promoted: false,
            reposted_by: None,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn promoted(mut self) -> Self {
        self.promoted = true;
        self
    }

    pub fn reposted_by(mut self, who: &str) -> Self {
        self.reposted_by = Some(who.to_string());
        self
    }

    pub fn status_href(&self) -> String {
        format!("/{}/status/{}", self.handle.trim_start_matches('@'), self.id)
    }
}

/// Geometry and loading behavior of a simulated feed.
#[derive(Debug, Clone)]
pub struct SimFeedConfig {
    pub viewport_height: f64,
    /// Posts delivered per fetch.
    pub page_size: usize,
    pub fetch_latency: Duration,
    /// A fetch starts once the viewport bottom is this close to the end of
    /// the loaded posts.
    pub fetch_trigger_px: f64,
    /// Posts within this distance of the viewport stay rendered.
    pub overscan_px: f64,
    /// Render an end-of-feed marker once everything is loaded. Off, the feed
    /// just stops.
    pub end_marker: bool,
    pub page_url: String,
}

impl Default for SimFeedConfig {
    fn default() -> Self {
        Self {
            viewport_height: 800.0,
            page_size: 20,
            fetch_latency: Duration::from_millis(1200),
            fetch_trigger_px: 1500.0,
            overscan_px: 1000.0,
            end_marker: true,
            page_url: "https://x.com/home".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_posts_are_stable() {
        assert_eq!(SimPost::numbered(7), SimPost::numbered(7));
        assert_eq!(SimPost::numbered(7).id, "1000007");
        let heights: Vec<f64> = (0..10).map(|n| SimPost::numbered(n).height).collect();
        assert!(heights.iter().all(|h| (220.0..=380.0).contains(h)));
    }

    #[test]
    fn status_href_drops_the_at_sign() {
        let post = SimPost::new("42", "@alice", "hello");
        assert_eq!(post.handle, "@alice");
        assert_eq!(post.status_href(), "/alice/status/42");
    }

    #[test]
    fn posts_deserialize_with_defaults() {
        let post: SimPost = serde_json::from_str(
            r#"{"id":"1","handle":"@a","name":"A","text":"t","height":250.0}"#,
        )
        .unwrap();
        assert!(!post.promoted);
        assert_eq!(post.reposted_by, None);
    }
}
