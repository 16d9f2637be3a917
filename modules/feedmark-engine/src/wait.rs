use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Elapsed,
    Cancelled,
}

/// Sleep for `duration`, clamped to `deadline`, waking early on cancel.
pub async fn pause(duration: Duration, deadline: Option<Instant>, cancel: &CancelToken) -> Pause {
    if cancel.is_cancelled() {
        return Pause::Cancelled;
    }
    let mut until = Instant::now() + duration;
    if let Some(deadline) = deadline {
        until = until.min(deadline);
    }
    tokio::select! {
        _ = tokio::time::sleep_until(until) => Pause::Elapsed,
        _ = cancel.cancelled() => Pause::Cancelled,
    }
}
