use std::time::Duration;

/// Cap on any single reconnect delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff delay for reconnect attempt `attempt` (1-based):
/// 1s, 2s, 4s, 8s, 16s, then capped at 30s.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    Duration::from_secs(1u64 << exp).min(MAX_RECONNECT_DELAY)
}
