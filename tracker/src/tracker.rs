use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::warn;
use structures::{ActivitySnapshot, PersistedTemplate, PixelChange};

use crate::canvas::PixelBuffer;
use crate::comparator::{Comparator, Template};
use crate::constants::TRANSPARENT_PIXEL;
use crate::eta::{self, Eta};
use crate::history::ActivityHistogram;

/// Pixel activity split by its effect on the template: placed
/// correctly, undone, or churned between two incorrect colors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActivityCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

/// A template under live tracking: the comparator plus the activity
/// history needed to estimate completion. One logical writer per
/// tracker; every mutation happens through `sync`.
#[derive(Debug)]
pub struct ProgressTracker {
    comparator: Comparator,
    started: DateTime<Utc>,
    /// Progress as of the last sync. Live progress always comes from
    /// the comparator; this is bookkeeping for attributing deltas, and
    /// drifts only if events are missed between reconciliations.
    last_progress: i64,
    positive: ActivityHistogram,
    neutral: ActivityHistogram,
    negative: ActivityHistogram,
}

impl ProgressTracker {
    pub fn new(
        template: Template,
        canvas: &PixelBuffer,
        placemap: &PixelBuffer,
        now: DateTime<Utc>,
    ) -> Self {
        let mut comparator = Comparator::new(template, placemap);
        let last_progress = comparator.progress(canvas) as i64;

        ProgressTracker {
            comparator,
            started: now,
            last_progress,
            positive: ActivityHistogram::new(now),
            neutral: ActivityHistogram::new(now),
            negative: ActivityHistogram::new(now),
        }
    }

    /// Resume a tracker from its persisted record. Unusable history
    /// degrades to empty histograms and a fresh canvas read instead of
    /// propagating corruption; the restored tracker then reconciles
    /// whatever happened while it was away.
    pub fn restore(
        template: Template,
        canvas: &PixelBuffer,
        placemap: &PixelBuffer,
        record: &PersistedTemplate,
        now: DateTime<Utc>,
    ) -> Self {
        let mut tracker = Self::new(template, canvas, placemap, now);

        if let chrono::LocalResult::Single(started) = Utc.timestamp_millis_opt(record.started) {
            tracker.started = started;
        }

        if let Some(progress) = record.progress {
            tracker.last_progress = progress as i64;
        }

        if let Some(history) = &record.history {
            let anchor = match Utc.timestamp_millis_opt(history.timestamp) {
                chrono::LocalResult::Single(anchor) => anchor,
                _ => now,
            };

            let buckets = tracker.positive.len();
            if history.positive.len() == buckets
                && history.neutral.len() == buckets
                && history.negative.len() == buckets
            {
                tracker.positive.backfill(&history.positive, anchor);
                tracker.neutral.backfill(&history.neutral, anchor);
                tracker.negative.backfill(&history.negative, anchor);
            } else {
                warn!(
                    "activity snapshot does not span {} buckets; starting with empty history",
                    buckets
                );
            }
        }

        tracker.sync(canvas, None, now);
        tracker
    }

    pub fn template(&self) -> &Template {
        self.comparator.template()
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn size(&self) -> u64 {
        self.template().design.size() as u64
    }

    pub fn placeable_size(&self) -> usize {
        self.comparator.placeable_size()
    }

    pub fn progress(&mut self, canvas: &PixelBuffer) -> u64 {
        self.comparator.progress(canvas) as u64
    }

    pub fn complete(&mut self, canvas: &PixelBuffer) -> bool {
        self.comparator.complete(canvas)
    }

    pub fn incorrect_pixels(&mut self, canvas: &PixelBuffer) -> Vec<(i64, i64, u8)> {
        self.comparator.incorrect_pixels(canvas)
    }

    /// Fold canvas activity into the tracker. With discrete `changes`
    /// (template-local indices, as translated by the event-feed
    /// consumer) each event is classified individually; without, the
    /// canvas is reconciled wholesale — an unknown sequence of flips
    /// reduced to before/after totals, as after a canvas reset.
    pub fn sync(
        &mut self,
        canvas: &PixelBuffer,
        changes: Option<&BTreeMap<usize, PixelChange>>,
        now: DateTime<Utc>,
    ) {
        self.comparator.invalidate();

        let counts = match changes {
            Some(changes) => self.classify(changes),
            None => self.reconcile(canvas),
        };

        self.positive.hit(clamp_to_u32(counts.positive), now);
        self.neutral.hit(clamp_to_u32(counts.neutral), now);
        self.negative.hit(clamp_to_u32(counts.negative), now);
    }

    fn classify(&mut self, changes: &BTreeMap<usize, PixelChange>) -> ActivityCounts {
        let design = self.comparator.template().design.clone();
        let mut counts = ActivityCounts::default();

        for (&index, change) in changes {
            let target = design.at(index);
            if target == TRANSPARENT_PIXEL {
                continue;
            }

            if target == change.old_color {
                counts.negative += 1;
            } else if target == change.color {
                counts.positive += 1;
            } else {
                counts.neutral += 1;
            }
        }

        self.last_progress += counts.positive as i64 - counts.negative as i64;
        counts
    }

    fn reconcile(&mut self, canvas: &PixelBuffer) -> ActivityCounts {
        let progress = self.comparator.progress(canvas) as i64;
        let delta = progress - self.last_progress;

        self.last_progress = progress;

        ActivityCounts {
            positive: delta.max(0) as u64,
            negative: (-delta).max(0) as u64,
            neutral: delta.unsigned_abs(),
        }
    }

    pub fn recent_activity(&self, period: Duration, now: DateTime<Utc>) -> ActivityCounts {
        ActivityCounts {
            positive: self.positive.recent_hits(period, now),
            neutral: self.neutral.recent_hits(period, now),
            negative: self.negative.recent_hits(period, now),
        }
    }

    pub fn eta(&mut self, canvas: &PixelBuffer, now: DateTime<Utc>) -> Eta {
        let size = self.size();
        let progress = self.progress(canvas);

        let positive = &self.positive;
        let negative = &self.negative;

        eta::estimate(size, progress, self.started, now, |window_ms| {
            let period = Duration::milliseconds(window_ms);
            (
                positive.recent_hits(period, now),
                negative.recent_hits(period, now),
            )
        })
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ActivitySnapshot {
        ActivitySnapshot {
            positive: self.positive.data().to_vec(),
            neutral: self.neutral.data().to_vec(),
            negative: self.negative.data().to_vec(),
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn persisted(&mut self, canvas: &PixelBuffer, now: DateTime<Utc>) -> PersistedTemplate {
        PersistedTemplate {
            x: self.template().x,
            y: self.template().y,
            started: self.started.timestamp_millis(),
            progress: Some(self.progress(canvas)),
            history: Some(self.snapshot(now)),
        }
    }
}

fn clamp_to_u32(value: u64) -> u32 {
    value.min(u64::from(u32::MAX)) as u32
}
