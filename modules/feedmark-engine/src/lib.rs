pub mod cancel;
pub mod capture;
pub mod classify;
pub mod fallback;
pub mod load_state;
pub mod progress;
pub mod restore;
pub mod scanner;
pub mod search;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod wait;

pub use cancel::CancelToken;
pub use capture::capture_anchor;
pub use classify::{ItemClassifier, KeywordClassifier};
pub use fallback::{FallbackMatcher, FallbackOutcome, Neighbor};
pub use load_state::{LoadSignal, LoadStateDetector};
pub use progress::{Direction, ProgressFn, SearchPhase, SearchProgress};
pub use restore::{target_scroll_y, RestorationExecutor};
pub use scanner::Scanner;
pub use search::{SearchController, SearchRequest};
pub use session::{Bookmarker, RestoreOutcome, SaveOutcome};
