use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::constants::{BUCKET_MS, WINDOW_MS};

/// Split `total` into `parts` near-equal integer parts: every part
/// gets the quotient, and the first `total % parts` parts get one
/// extra. The parts always sum back to `total`.
pub fn partition(total: u64, parts: u64) -> impl Iterator<Item = u64> {
    let quotient = total.checked_div(parts).unwrap_or(0);
    let remainder = total.checked_rem(parts).unwrap_or(0);

    (0..parts).map(move |i| if i < remainder { quotient + 1 } else { quotient })
}

/// A bounded rolling hit counter: a ring of one-minute buckets
/// covering the last seven days. Writes to a single timeline only;
/// not safe for concurrent `hit` calls.
#[derive(Debug, Clone)]
pub struct ActivityHistogram {
    data: Vec<u32>,
    last_write_time: i64,
    bucket_ms: i64,
}

impl ActivityHistogram {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_window(WINDOW_MS, BUCKET_MS, now)
    }

    pub fn with_window(window_ms: i64, bucket_ms: i64, now: DateTime<Utc>) -> Self {
        let buckets = (window_ms / bucket_ms).max(1) as usize;

        ActivityHistogram {
            data: vec![0; buckets],
            last_write_time: now.timestamp_millis(),
            bucket_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw ring contents, ordered by slot rather than by time. Feed
    /// this to [`ActivityHistogram::backfill`] to restore state.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    fn address(&self, time_ms: i64) -> i64 {
        time_ms.div_euclid(self.bucket_ms)
    }

    fn slot(&self, address: i64) -> usize {
        address.rem_euclid(self.data.len() as i64) as usize
    }

    /// Record `delta` hits at `time`. A write landing in a later
    /// bucket than the previous one spreads `delta` in near-equal
    /// parts across every bucket since, modelling an unknown steady
    /// arrival rate for coalesced updates; buckets skipped past the
    /// retained window are zeroed.
    pub fn hit(&mut self, delta: u32, time: DateTime<Utc>) {
        let time_ms = time.timestamp_millis();
        let last = self.address(self.last_write_time);
        let current = self.address(time_ms);

        if current <= last {
            // same bucket, or a clock that stepped backwards
            let slot = self.slot(current);
            self.data[slot] = self.data[slot].saturating_add(delta);
        } else {
            let gap = (current - last) as u64;
            // a gap wider than the ring keeps only the newest parts;
            // each retained slot is written exactly once
            let skip = gap.saturating_sub(self.data.len() as u64) as usize;

            for (i, part) in partition(u64::from(delta), gap).enumerate().skip(skip) {
                let slot = self.slot(last + 1 + i as i64);
                self.data[slot] = part as u32;
            }
        }

        self.last_write_time = time_ms;
    }

    /// Value of the bucket containing `time`.
    pub fn get(&self, time: DateTime<Utc>) -> u32 {
        self.data[self.slot(self.address(time.timestamp_millis()))]
    }

    /// Bucket values for the span from `start` (exclusive bucket) to
    /// `end` (inclusive bucket), oldest first — the same attribution
    /// `hit` uses, so trailing-window sums never double-count. Spans
    /// wider than the retained window clip to the newest buckets.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<u32> {
        let mut start_address = self.address(start.timestamp_millis());
        let end_address = self.address(end.timestamp_millis());

        if end_address < start_address {
            return Vec::new();
        }

        let buckets = self.data.len() as i64;
        if end_address - start_address > buckets {
            warn!(
                "requested {} buckets of history but only {} are retained; clipping",
                end_address - start_address,
                buckets
            );
            start_address = end_address - buckets;
        }

        ((start_address + 1)..=end_address)
            .map(|address| self.data[self.slot(address)])
            .collect()
    }

    /// Total hits over the trailing `period` ending at `now`.
    pub fn recent_hits(&self, period: Duration, now: DateTime<Utc>) -> u64 {
        self.range(now - period, now)
            .into_iter()
            .map(u64::from)
            .sum()
    }

    /// Replace the raw ring and anchor the write cursor at
    /// `data_time`. Only valid as the first operation after
    /// construction; interleaving with live recording is undefined
    /// and must be guarded by the caller.
    pub fn backfill(&mut self, data: &[u32], data_time: DateTime<Utc>) {
        if data.len() != self.data.len() {
            warn!(
                "backfilling {} buckets into a {}-bucket histogram",
                data.len(),
                self.data.len()
            );
        }

        let copied = self.data.len().min(data.len());
        self.data[..copied].copy_from_slice(&data[..copied]);
        self.data[copied..].fill(0);

        self.last_write_time = data_time.timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::Rng;

    use super::*;
    use crate::constants::MINUTE_MS;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_600_000_000_000 + minutes * MINUTE_MS)
            .unwrap()
    }

    fn minutes(n: i64) -> Duration {
        Duration::minutes(n)
    }

    #[test]
    fn partition_gives_the_first_parts_the_remainder() {
        assert_eq!(partition(10, 4).collect::<Vec<_>>(), vec![3, 3, 2, 2]);
        assert_eq!(partition(60, 10).collect::<Vec<_>>(), vec![6; 10]);
        assert_eq!(partition(2, 5).collect::<Vec<_>>(), vec![1, 1, 0, 0, 0]);
        assert_eq!(partition(7, 1).collect::<Vec<_>>(), vec![7]);
        assert_eq!(partition(5, 0).count(), 0);
    }

    #[test]
    fn hits_in_the_same_bucket_accumulate() {
        let mut histogram = ActivityHistogram::new(at(0));
        histogram.hit(3, at(0));
        histogram.hit(4, at(0));

        assert_eq!(histogram.get(at(0)), 7);
    }

    #[test]
    fn a_gap_spreads_the_delta_across_skipped_buckets() {
        let mut histogram = ActivityHistogram::new(at(0));
        histogram.hit(7, at(3));

        assert_eq!(histogram.get(at(0)), 0);
        assert_eq!(histogram.get(at(1)), 3);
        assert_eq!(histogram.get(at(2)), 2);
        assert_eq!(histogram.get(at(3)), 2);
    }

    #[test]
    fn trailing_window_counts_only_what_falls_inside_it() {
        let mut histogram = ActivityHistogram::new(at(0));
        histogram.hit(60, at(0));
        histogram.hit(60, at(10));

        // the first 60 sits in the bucket just outside the window
        assert_eq!(histogram.recent_hits(minutes(10), at(10)), 60);
        assert_eq!(histogram.recent_hits(minutes(11), at(10)), 120);
    }

    #[test]
    fn recorded_mass_is_conserved_within_the_window() {
        let mut rng = rand::thread_rng();
        let mut histogram = ActivityHistogram::new(at(0));

        let mut total: u64 = 0;
        let mut minute = 0;
        for _ in 0..50 {
            minute += rng.gen_range(1..=20);
            let delta = rng.gen_range(0..=500u32);
            histogram.hit(delta, at(minute));
            total += u64::from(delta);
        }

        assert_eq!(histogram.recent_hits(minutes(minute), at(minute)), total);
        // a wider window changes nothing; there is no older mass
        assert_eq!(histogram.recent_hits(minutes(minute + 60), at(minute)), total);
    }

    #[test]
    fn the_ring_wraps_and_forgets_old_buckets() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));

        for minute in 1..=8 {
            histogram.hit(10, at(minute));
        }

        // minutes 4..=8 are retained, 1..=3 have been overwritten
        assert_eq!(histogram.recent_hits(minutes(5), at(8)), 50);
        assert_eq!(histogram.get(at(8)), 10);
    }

    #[test]
    fn a_gap_wider_than_the_window_zeroes_stale_buckets() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));
        histogram.hit(50, at(1));

        // 990 spread over 99 buckets is 10 each; only 5 are retained
        histogram.hit(990, at(100));

        assert_eq!(histogram.recent_hits(minutes(5), at(100)), 50);
        for minute in 96..=100 {
            assert_eq!(histogram.get(at(minute)), 10);
        }
    }

    #[test]
    fn a_sparse_delta_over_a_huge_gap_leaves_nothing_behind() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));
        histogram.hit(50, at(1));

        // 10 over 99 buckets puts single hits in the oldest 10 buckets,
        // all of which fall outside the ring
        histogram.hit(10, at(100));

        assert_eq!(histogram.recent_hits(minutes(5), at(100)), 0);
    }

    #[test]
    fn over_long_ranges_clip_to_the_retained_window() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));
        for minute in 1..=5 {
            histogram.hit(1, at(minute));
        }

        let clipped = histogram.range(at(-1000), at(5));
        assert_eq!(clipped.len(), 5);
        assert_eq!(clipped.iter().sum::<u32>(), 5);
    }

    #[test]
    fn inverted_ranges_are_empty() {
        let histogram = ActivityHistogram::new(at(0));
        assert!(histogram.range(at(10), at(0)).is_empty());
    }

    #[test]
    fn backfill_restores_a_saved_ring() {
        let mut original = ActivityHistogram::with_window(10 * MINUTE_MS, MINUTE_MS, at(0));
        original.hit(30, at(3));
        original.hit(12, at(7));

        let saved = original.data().to_vec();

        let mut restored = ActivityHistogram::with_window(10 * MINUTE_MS, MINUTE_MS, at(7));
        restored.backfill(&saved, at(7));

        assert_eq!(
            restored.recent_hits(minutes(7), at(7)),
            original.recent_hits(minutes(7), at(7))
        );
        assert_eq!(restored.get(at(7)), original.get(at(7)));
    }

    #[test]
    fn backfill_tolerates_mismatched_lengths() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));
        histogram.backfill(&[1, 2], at(0));

        let total: u64 = histogram.data().iter().map(|&v| u64::from(v)).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn an_ancient_backfill_timestamp_is_accepted() {
        let mut histogram = ActivityHistogram::with_window(5 * MINUTE_MS, MINUTE_MS, at(0));
        histogram.backfill(&[9, 9, 9, 9, 9], at(-100_000));

        // the next hit finds a gap far beyond the window and starts clean
        histogram.hit(10, at(1));
        assert_eq!(histogram.recent_hits(minutes(5), at(1)), 0);
    }
}
