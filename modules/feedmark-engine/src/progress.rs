use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Observer for search progress. Must not block.
pub type ProgressFn = Arc<dyn Fn(&SearchProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Where the search currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchPhase {
    Jumping { stage: u32, of: u32 },
    Scanning(Direction),
    WaitingForContent,
}

impl std::fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchPhase::Jumping { stage, of } => write!(f, "jumping ({stage}/{of})"),
            SearchPhase::Scanning(direction) => write!(f, "scanning {direction}"),
            SearchPhase::WaitingForContent => write!(f, "waiting for more posts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchProgress {
    pub elapsed: Duration,
    pub ceiling: Duration,
    pub phase: SearchPhase,
}

impl SearchProgress {
    /// Fraction of the time budget used, in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.ceiling.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.ceiling.as_secs_f64()).min(1.0)
    }

    pub fn message(&self) -> String {
        format!(
            "Searching: {} ({}s of {}s)",
            self.phase,
            self.elapsed.as_secs(),
            self.ceiling.as_secs()
        )
    }
}

/// Rate limiter for progress callbacks.
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True at most once per interval. The first call only arms the timer,
    /// so nothing is reported for searches that finish quickly.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(last) if now.duration_since(last) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_fires_once_per_interval() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(Duration::from_secs(3));
        assert!(!throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_secs(2)));
        assert!(throttle.ready(start + Duration::from_secs(3)));
        assert!(!throttle.ready(start + Duration::from_secs(4)));
        assert!(throttle.ready(start + Duration::from_secs(7)));
    }

    #[test]
    fn message_reports_elapsed_against_ceiling() {
        let progress = SearchProgress {
            elapsed: Duration::from_millis(12_400),
            ceiling: Duration::from_secs(90),
            phase: SearchPhase::Scanning(Direction::Down),
        };
        assert_eq!(progress.message(), "Searching: scanning down (12s of 90s)");
        assert!((progress.fraction() - 12.4 / 90.0).abs() < 1e-9);
    }
}
