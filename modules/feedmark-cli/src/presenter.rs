//! User-facing copy for engine outcomes.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use feedmark_common::Anchor;
use feedmark_engine::{RestoreOutcome, SaveOutcome, SearchProgress};

/// Relative timestamps as the feed prints them: `45s`, `12m`, `7h`, `2d`.
static RE_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[hmsd]$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Success => write!(f, "ok"),
            Level::Info => write!(f, "info"),
            Level::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Age in the feed's own style: `45s`, `12m`, `3h`, `2d`. Days round up
/// from whole hours, so 25 hours reads `2d`.
pub fn format_time_ago(age: Duration) -> String {
    let seconds = age.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours >= 24 {
        format!("{}d", (hours + 23) / 24)
    } else if hours >= 1 {
        format!("{hours}h")
    } else if minutes >= 1 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

/// Label for the restore action, e.g. `Jump (3h ago)` or `Jump (Aug 23)`.
pub fn jump_label(anchor: Option<&Anchor>) -> String {
    let Some(timestamp) = anchor.and_then(|a| a.item_timestamp.as_deref()) else {
        return "Jump".to_string();
    };
    if RE_RELATIVE.is_match(timestamp) {
        format!("Jump ({timestamp} ago)")
    } else {
        format!("Jump ({timestamp})")
    }
}

pub fn save_notice(outcome: &SaveOutcome) -> Notice {
    match outcome {
        SaveOutcome::Saved(_) => Notice::success("Position saved"),
        SaveOutcome::NotOnFollowing => Notice::error("Please switch to Following tab"),
        SaveOutcome::NoItemVisible => Notice::error("No post found"),
    }
}

pub fn restore_notice(outcome: &RestoreOutcome, now: DateTime<Utc>) -> Notice {
    match outcome {
        RestoreOutcome::Restored { .. } => Notice::success("Position restored"),
        RestoreOutcome::NearContext { .. } => Notice::success("Positioned near saved location"),
        RestoreOutcome::SimilarItem { .. } => Notice::success("Found similar post"),
        RestoreOutcome::Approximate { captured_at, .. } => Notice::info(format!(
            "Restored to approximate position (saved {} ago)",
            format_time_ago(now.signed_duration_since(*captured_at))
        )),
        RestoreOutcome::NotFound => Notice::error("Post not found"),
        RestoreOutcome::NoAnchor => Notice::error("No saved position"),
        RestoreOutcome::VariantUnavailable => Notice::error("Failed to switch to Following tab"),
        RestoreOutcome::TimedOut => Notice::error("Search timed out"),
        RestoreOutcome::Cancelled => Notice::info("Search stopped"),
        RestoreOutcome::NoMoreContent => Notice::info("Reached the end of the feed"),
        RestoreOutcome::AlreadySearching => Notice::info("Already searching"),
    }
}

pub fn progress_notice(progress: &SearchProgress) -> Notice {
    let seconds = progress.elapsed.as_secs();
    let message = if seconds < 10 {
        "Still searching... Loading more posts"
    } else if seconds < 20 {
        "This is taking a while... Loading deep posts"
    } else {
        "Almost there... Please wait"
    };
    Notice::info(message)
}
