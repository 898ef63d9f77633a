// ── Backoff calculation ──────────────────────────────────────────────

use std::time::Duration;

use crate::config::BackoffConfig;

/// Delay before reconnect number `attempt` (1-based).
///
/// `delay = min(initial * 2^(attempt-1), max)` scaled by a deterministic
/// +-25% jitter, then clamped to `max`.
pub fn delay_for(attempt: u32, config: &BackoffConfig) -> Duration {
    let step = attempt.saturating_sub(1);
    let exponent = i32::try_from(step).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let max = config.max_delay.as_secs_f64();
    let capped = base.min(max);

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(step) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).clamp(0.0, max);

    Duration::from_secs_f64(with_jitter)
}
