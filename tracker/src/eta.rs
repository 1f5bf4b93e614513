use chrono::{DateTime, Duration, Utc};

use crate::constants::{DAY_MS, HOUR_MS, MINUTE_MS};

/// Sampling windows the estimator considers, shortest first.
pub const CANDIDATE_WINDOWS_MS: [i64; 9] = [
    MINUTE_MS,
    15 * MINUTE_MS,
    HOUR_MS,
    4 * HOUR_MS,
    12 * HOUR_MS,
    DAY_MS,
    2 * DAY_MS,
    4 * DAY_MS,
    7 * DAY_MS,
];

/// Estimated time until a template completes or is fully undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    /// Net progress is forward; done in about this long.
    Completing(Duration),
    /// Net progress is backward; gone in about this long.
    Regressing(Duration),
    /// Not enough signal to estimate.
    Unknown,
}

/// Estimate completion from recent activity. `recent` reports the
/// positive and negative hit totals over a trailing window of the
/// given length in milliseconds.
///
/// Each candidate window implies a net rate and thus an estimate; the
/// one whose estimate's magnitude best matches its own window length
/// wins. A window whose implied rate, held constant, would finish the
/// template in roughly the time the window spans is the one worth
/// trusting.
pub fn estimate<F>(
    size: u64,
    progress: u64,
    started: DateTime<Utc>,
    now: DateTime<Utc>,
    recent: F,
) -> Eta
where
    F: Fn(i64) -> (u64, u64),
{
    if progress >= size {
        return Eta::Completing(Duration::zero());
    }

    let elapsed = (now - started).num_milliseconds();

    let mut windows: Vec<i64> = CANDIDATE_WINDOWS_MS
        .iter()
        .copied()
        .filter(|&window| window < elapsed)
        .collect();

    // the tracked lifetime itself, so a young template still gets a
    // full-history estimate
    if elapsed > 0 {
        windows.push(elapsed);
    }

    if windows.is_empty() {
        return Eta::Unknown;
    }

    let remaining = (size - progress) as f64;

    let mut best: Option<(f64, f64)> = None;

    for window in windows {
        let (positive, negative) = recent(window);
        let rate = (positive as f64 - negative as f64) / window as f64;

        let estimate = if rate >= 0.0 {
            // time to finish; infinite when nothing is happening
            remaining / rate
        } else {
            // time until fully undone, always non-positive
            progress as f64 / rate
        };

        let magnitude = estimate.abs();
        let window = window as f64;
        let ratio = if magnitude >= window {
            magnitude / window
        } else {
            window / magnitude
        };

        if best.map_or(true, |(best_ratio, _)| ratio < best_ratio) {
            best = Some((ratio, estimate));
        }
    }

    match best {
        Some((_, estimate)) if estimate.is_finite() => {
            // a regressing window always yields a sign-negative
            // estimate, -0.0 included when nothing is placed yet
            if estimate.is_sign_negative() {
                Eta::Regressing(Duration::milliseconds(-estimate as i64))
            } else {
                Eta::Completing(Duration::milliseconds(estimate as i64))
            }
        }
        _ => Eta::Unknown,
    }
}
