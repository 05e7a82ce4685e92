//! Backoff schedule for retryable node failures.

use std::time::Duration;

use crate::model::RetryPolicy;

/// Delay before retry number `attempt` (zero-based): exponential backoff
/// capped at the policy ceiling, plus uniform random jitter up to 10%.
pub fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let capped = policy
        .base_delay_ms
        .saturating_mul(exp)
        .min(policy.max_delay_ms);
    let jitter = (rand::random::<f64>() * capped as f64 * 0.1) as u64;
    Duration::from_millis(capped + jitter)
}
