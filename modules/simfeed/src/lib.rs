//! simfeed: an in-memory virtualized feed for testing.
//!
//! Implements `FeedView` over a list of posts that is fetched a page at a
//! time as the viewport nears the bottom, with only a window around the
//! viewport rendered. Scenario hooks cover the ways a real feed moves under
//! a saved position: posts prepended above, posts deleted, reposts, ads and
//! feed tabs.

pub mod feed;
pub mod snapshot;
pub mod types;

pub use feed::SimulatedFeed;
pub use snapshot::{FeedLog, LogEntry};
pub use types::{SimFeedConfig, SimPost};
