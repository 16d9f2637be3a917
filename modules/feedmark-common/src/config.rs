use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::{FeedmarkError, Result};
use crate::types::ANCHOR_RETENTION_DAYS;

/// Timing and threshold constants of the directional search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Hard ceiling on one search.
    pub timeout: Duration,
    /// Jump toward the saved offset only beyond this many viewport heights.
    pub jump_threshold_viewports: f64,
    /// Beyond this many viewport heights the jump is split into stages.
    pub staged_jump_threshold_viewports: f64,
    pub jump_stages: u32,
    pub jump_settle: Duration,
    /// Wait after a staged-jump nudge while the feed is idle.
    pub jump_idle_wait: Duration,
    pub scan_step_viewports: f64,
    pub scan_settle: Duration,
    /// Displacement below this counts as no progress.
    pub min_displacement_px: f64,
    pub load_wait_at_no_progress: u32,
    pub abandon_at_no_progress: u32,
    pub load_wait_timeout: Duration,
    pub bottom_settle: Duration,
    pub nudge_px: f64,
    pub nudge_settle: Duration,
    pub progress_interval: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            jump_threshold_viewports: 3.0,
            staged_jump_threshold_viewports: 10.0,
            jump_stages: 5,
            jump_settle: Duration::from_millis(2000),
            jump_idle_wait: Duration::from_millis(2000),
            scan_step_viewports: 1.2,
            scan_settle: Duration::from_millis(800),
            min_displacement_px: 10.0,
            load_wait_at_no_progress: 2,
            abandon_at_no_progress: 3,
            load_wait_timeout: Duration::from_millis(10_000),
            bottom_settle: Duration::from_millis(1000),
            nudge_px: 10.0,
            nudge_settle: Duration::from_millis(500),
            progress_interval: Duration::from_secs(3),
        }
    }
}

/// Load-state heuristics.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Closer than this to the document bottom counts as loading.
    pub near_bottom_px: f64,
    pub loading_keyword: String,
    pub poll_interval: Duration,
    pub settle_after_change: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            near_bottom_px: 1000.0,
            loading_keyword: "loading".to_string(),
            poll_interval: Duration::from_millis(200),
            settle_after_change: Duration::from_millis(500),
        }
    }
}

/// Fallback similarity matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub exact_prefix_chars: usize,
    pub min_exact_text_chars: usize,
    pub lenient_prefix_chars: usize,
    /// Fraction of the viewport height to offset from a context neighbor.
    pub context_bias_viewports: f64,
    pub jump_settle: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_prefix_chars: 50,
            min_exact_text_chars: 10,
            lenient_prefix_chars: 30,
            context_bias_viewports: 0.2,
            jump_settle: Duration::from_millis(1000),
        }
    }
}

/// Application configuration. Defaults match the production feed; every
/// field can be overridden from `FEEDMARK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub detector: DetectorConfig,
    pub matching: MatchConfig,

    // Storage
    pub anchor_path: PathBuf,
    pub retention_days: i64,

    // Session
    pub item_url_base: String,
    pub capture_requires_following: bool,
    pub variant_switch_wait: Duration,
    pub post_switch_settle: Duration,
    pub auto_restore_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            detector: DetectorConfig::default(),
            matching: MatchConfig::default(),
            anchor_path: PathBuf::from("feedmark-anchor.json"),
            retention_days: ANCHOR_RETENTION_DAYS,
            item_url_base: "https://x.com".to_string(),
            capture_requires_following: true,
            variant_switch_wait: Duration::from_millis(1500),
            post_switch_settle: Duration::from_millis(1000),
            auto_restore_delay: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if
    /// present), falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` delegates here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("FEEDMARK_ANCHOR_PATH") {
            config.anchor_path = PathBuf::from(path);
        }
        if let Some(base) = lookup("FEEDMARK_URL_BASE") {
            config.item_url_base = base.trim_end_matches('/').to_string();
        }
        if let Some(days) = parse_var::<i64>(&lookup, "FEEDMARK_RETENTION_DAYS")? {
            if days <= 0 {
                return Err(FeedmarkError::Config(
                    "FEEDMARK_RETENTION_DAYS must be positive".to_string(),
                ));
            }
            config.retention_days = days;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "FEEDMARK_SEARCH_TIMEOUT_SECS")? {
            config.search.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "FEEDMARK_LOAD_WAIT_MS")? {
            config.search.load_wait_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "FEEDMARK_SCAN_SETTLE_MS")? {
            config.search.scan_settle = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "FEEDMARK_PROGRESS_INTERVAL_MS")? {
            config.search.progress_interval = Duration::from_millis(ms);
        }
        if let Some(flag) = parse_var::<bool>(&lookup, "FEEDMARK_CAPTURE_REQUIRES_FOLLOWING")? {
            config.capture_requires_following = flag;
        }

        Ok(config)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Log the effective settings.
    pub fn log_summary(&self) {
        info!(
            anchor_path = %self.anchor_path.display(),
            retention_days = self.retention_days,
            search_timeout_secs = self.search.timeout.as_secs(),
            load_wait_ms = self.search.load_wait_timeout.as_millis() as u64,
            scan_settle_ms = self.search.scan_settle.as_millis() as u64,
            url_base = self.item_url_base.as_str(),
            "Configuration loaded"
        );
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| FeedmarkError::Config(format!("{key} has an invalid value: {raw:?}"))),
    }
}
