//! Engine-agnostic metrics collection for subdivision runs.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use view_subdiv::metrics::{PipelineMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let (mesh, timings) = subdivide_mesh_timed(&triangles, &context, &config)?;
//! metrics.record_run(&timings, &mesh.stats);
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::types::{RunStats, StageTimings};

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Samples kept per timing window.
pub const TIMING_WINDOW: usize = 128;

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create a new rolling window with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterate over values (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Get the most recent value.
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
    /// Compute the sum of all values.
    pub fn sum(&self) -> T {
        self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
    }
}

impl RollingWindow<u64> {
    /// Compute the average of all values.
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    /// Get min and max values.
    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }

    /// Min / mean / max / last summary, zeros when empty.
    pub fn summary(&self) -> TimingSummary {
        let (min_us, max_us) = self.min_max().unwrap_or((0, 0));
        TimingSummary {
            min_us,
            mean_us: self.average(),
            max_us,
            last_us: self.last().copied().unwrap_or(0),
            samples: self.len(),
        }
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(TIMING_WINDOW)
    }
}

/// Summary of one timing window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingSummary {
    pub min_us: u64,
    pub mean_us: f64,
    pub max_us: u64,
    pub last_us: u64,
    pub samples: usize,
}

/// Timing history and counts across subdivision runs.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    // Per-stage timings
    /// Subdivide stage times in microseconds.
    pub subdivide_timings: RollingWindow<u64>,
    /// Dedup stage times in microseconds.
    pub dedup_timings: RollingWindow<u64>,
    /// Reconstruct stage times in microseconds.
    pub reconstruct_timings: RollingWindow<u64>,
    /// Gather stage times in microseconds.
    pub gather_timings: RollingWindow<u64>,
    /// Whole-run times in microseconds.
    pub frame_timings: RollingWindow<u64>,

    // Last run snapshot (for UI)
    /// Statistics of the most recent run.
    pub last_stats: RunStats,

    /// Runs recorded this session.
    pub total_runs: u64,
    /// Leaf triangles produced this session.
    pub total_leaf_triangles: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear timing windows and the last-run snapshot.
    pub fn reset(&mut self) {
        self.subdivide_timings.clear();
        self.dedup_timings.clear();
        self.reconstruct_timings.clear();
        self.gather_timings.clear();
        self.frame_timings.clear();
        self.last_stats = RunStats::default();
        // Totals are cumulative
    }

    /// Record one finished run.
    pub fn record_run(&mut self, timings: &StageTimings, stats: &RunStats) {
        if !is_enabled() {
            return;
        }

        self.subdivide_timings.push(timings.subdivide_us);
        self.dedup_timings.push(timings.dedup_us);
        self.reconstruct_timings.push(timings.reconstruct_us);
        self.gather_timings.push(timings.gather_us);
        self.frame_timings.push(timings.total_us);

        self.last_stats = *stats;
        self.total_runs += 1;
        self.total_leaf_triangles += stats.leaf_triangles;
    }

    /// Whole-run timing summary.
    pub fn frame_summary(&self) -> TimingSummary {
        self.frame_timings.summary()
    }

    /// Average time per stage: subdivide, dedup, reconstruct, gather.
    pub fn stage_averages_us(&self) -> [f64; 4] {
        [
            self.subdivide_timings.average(),
            self.dedup_timings.average(),
            self.reconstruct_timings.average(),
            self.gather_timings.average(),
        ]
    }
}
