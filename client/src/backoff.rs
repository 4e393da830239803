use rand::{Rng, RngCore};
use std::time::Duration;

/// First delay after a failed scan.
pub(crate) const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Ceiling for repeated scan failures.
pub(crate) const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub(crate) fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }

    // "Equal jitter": delay is in [backoff/2, backoff].
    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

pub(crate) fn next_backoff(backoff: Duration) -> Duration {
    backoff.saturating_mul(2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_jitter_stays_within_half_and_full() {
        let mut rng = StdRng::seed_from_u64(42);
        let backoff = Duration::from_millis(800);
        for _ in 0..100 {
            let delay = jittered_backoff(&mut rng, backoff);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= backoff);
        }
    }

    #[test]
    fn test_next_backoff_is_capped() {
        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..20 {
            backoff = next_backoff(backoff);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }
}
