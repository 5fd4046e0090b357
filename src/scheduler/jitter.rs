//! Due-for-check decision with jittered intervals.
//!
//! Repeat checks land at `last_check + interval + J`, where `J` is drawn
//! from `[-interval/5, +interval/5]` by a generator seeded with the last
//! check time. The same state always gives the same answer, while
//! successive checks of different targets drift apart.
//!
//! A target that was never checked waits a phase in `[0, interval)` after
//! it was first seen. The phase is drawn from a generator seeded with the
//! first-seen time and the target URL, so every run agrees on it.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Jitter spans `interval / JITTER_DIVIDER` either way (20%).
pub const JITTER_DIVIDER: i64 = 5;

/// Decides whether a target should be probed on this run.
#[derive(Debug, Clone, Copy)]
pub struct DueCheck {
    first_use: DateTime<Utc>,
}

impl DueCheck {
    /// `first_use` anchors the first-check phase of targets with no history.
    pub fn new(first_use: DateTime<Utc>) -> Self {
        Self { first_use }
    }

    pub fn first_use(&self) -> DateTime<Utc> {
        self.first_use
    }

    /// Whether a target with the given interval and history is due at `now`.
    ///
    /// - a zero interval is always due
    /// - a target never checked waits `first_check_phase` counted from
    ///   `first_seen`, or from this scheduler's first use
    /// - otherwise it is due once `next_allowed` has passed
    pub fn is_due(
        &self,
        url: &str,
        interval: Duration,
        last_check: Option<DateTime<Utc>>,
        first_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let nanos = interval_nanos(interval);
        if nanos == 0 {
            return true;
        }

        match last_check {
            Some(last) => match next_allowed(last, interval) {
                Some(next) => now >= next,
                None => false,
            },
            None => {
                let anchor = first_seen.unwrap_or(self.first_use);
                let phase = chrono::Duration::nanoseconds(first_check_phase(url, anchor, nanos));
                match anchor.checked_add_signed(phase) {
                    Some(start) => now >= start,
                    None => false,
                }
            }
        }
    }
}

/// Earliest time a target checked at `last_check` may be checked again.
///
/// `None` if the result does not fit in a timestamp.
pub fn next_allowed(last_check: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    let nanos = interval_nanos(interval);
    let jitter = jitter_nanos(seed_for(last_check), nanos);
    let offset = nanos.checked_add(jitter)?;
    last_check.checked_add_signed(chrono::Duration::nanoseconds(offset))
}

/// Deterministic offset in `[-interval/5, +interval/5]` for a seed.
pub fn jitter_nanos(seed: u64, interval_nanos: i64) -> i64 {
    let spread = interval_nanos / JITTER_DIVIDER;
    if spread <= 0 {
        return 0;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    rng.gen_range(-spread..=spread)
}

/// Offset in `[0, interval)` before the first check of `url`.
///
/// Uniform over targets and stable for a given `(url, anchor)` pair.
pub fn first_check_phase(url: &str, anchor: DateTime<Utc>, interval_nanos: i64) -> i64 {
    if interval_nanos <= 0 {
        return 0;
    }

    let mut rng = StdRng::seed_from_u64(seed_for(anchor) ^ url_hash(url));
    rng.gen_range(0..interval_nanos)
}

// FNV-1a, fixed across builds so persisted anchors keep their phase.
fn url_hash(url: &str) -> u64 {
    url.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn seed_for(time: DateTime<Utc>) -> u64 {
    time.timestamp_nanos_opt()
        .unwrap_or_else(|| time.timestamp()) as u64
}

fn interval_nanos(interval: Duration) -> i64 {
    i64::try_from(interval.as_nanos()).unwrap_or(i64::MAX)
}
