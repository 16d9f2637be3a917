pub mod config;
pub mod error;
pub mod types;
pub mod view;

pub use config::{Config, DetectorConfig, MatchConfig, SearchConfig};
pub use error::{FeedmarkError, Result};
pub use types::*;
pub use view::{url_path, FeedView, Marker, RenderedElement, ScrollBehavior, Viewport};
