// src/engine/timing.rs

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Whole-sweep wall clock.
pub const SWEEP_TAG: &str = "sweep";
/// Time spent inside sweep chunks only.
pub const CHUNK_TAG: &str = "sweep_chunk";

#[derive(Debug, Default, Clone)]
struct TagStats {
    total: Duration,
    count: usize,
    open: Option<Instant>,
}

/// Repeatable named timers.
///
/// A tag may be opened and closed any number of times; durations add up.
#[derive(Debug, Default, Clone)]
pub struct TimingLog {
    tags: BTreeMap<&'static str, TagStats>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, tag: &'static str) {
        self.tags.entry(tag).or_default().open = Some(Instant::now());
    }

    /// Close `tag`; returns the elapsed time of this interval.
    pub fn end(&mut self, tag: &'static str) -> Option<Duration> {
        let stats = self.tags.get_mut(tag)?;
        let started = stats.open.take()?;
        let elapsed = started.elapsed();
        stats.total += elapsed;
        stats.count += 1;
        Some(elapsed)
    }

    pub fn total(&self, tag: &str) -> Duration {
        self.tags.get(tag).map_or(Duration::ZERO, |s| s.total)
    }

    pub fn count(&self, tag: &str) -> usize {
        self.tags.get(tag).map_or(0, |s| s.count)
    }

    /// Cumulative sweep and chunk time over every sweep so far.
    pub fn summary(&self) -> SweepTimings {
        SweepTimings {
            total: self.total(SWEEP_TAG),
            compute: self.total(CHUNK_TAG),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SweepTimings {
    pub total: Duration,
    pub compute: Duration,
}

impl SweepTimings {
    /// Fraction of the sweep spent computing; `0` before any sweep.
    pub fn ratio(&self) -> f64 {
        if self.total.is_zero() {
            0.0
        } else {
            self.compute.as_secs_f64() / self.total.as_secs_f64()
        }
    }

    pub fn accumulate(&mut self, other: &SweepTimings) {
        self.total += other.total;
        self.compute += other.compute;
    }
}
