//! Per-run shared mutable state.
//!
//! Everything workers mutate concurrently lives here and is passed by
//! reference into the stages: run statistics and the gather zone counters.
//! [`RunContext::reset`] is the documented re-arm step; the orchestrator
//! calls it at the start of every run.

use crate::atomic_cell::AtomicCell;
use crate::error::PipelineError;
use crate::subdivide::{Classification, TriangleOutcome};
use crate::types::{RunStats, SubdivisionConfig};

/// Sentinel stored in a zone counter that is not armed.
pub const ZONE_UNUSED: u32 = u32::MAX;

// =============================================================================
// Run statistics
// =============================================================================

/// Run statistics accumulated concurrently by the subdivide pass.
#[derive(Debug)]
pub struct StatCells {
  leaf_triangles: AtomicCell<u64>,
  culled_triangles: AtomicCell<u64>,
  near_field_triangles: AtomicCell<u64>,
  deepest_split: AtomicCell<u32>,
  closest_distance_sq: AtomicCell<f32>,
}

impl StatCells {
  pub fn new() -> Self {
    Self {
      leaf_triangles: AtomicCell::new(0),
      culled_triangles: AtomicCell::new(0),
      near_field_triangles: AtomicCell::new(0),
      deepest_split: AtomicCell::new(0),
      closest_distance_sq: AtomicCell::new(f32::INFINITY),
    }
  }

  pub fn reset(&self) {
    self.leaf_triangles.set(0);
    self.culled_triangles.set(0);
    self.near_field_triangles.set(0);
    self.deepest_split.set(0);
    self.closest_distance_sq.set(f32::INFINITY);
  }

  /// Record one finished source triangle.
  ///
  /// Called once per partition with locally accumulated counts so the shared
  /// cells see one update per source triangle, not one per leaf.
  pub fn record_partition(&self, outcome: &TriangleOutcome, leaves: u64, deepest: u32) {
    self.leaf_triangles.fetch_add(leaves);
    self.deepest_split.fetch_max(deepest);
    self.closest_distance_sq.fetch_min(outcome.distance_sq);
    match outcome.classification {
      Classification::Culled => {
        self.culled_triangles.fetch_add(1);
      }
      Classification::NearField => {
        self.near_field_triangles.fetch_add(1);
      }
      Classification::Visible => {}
    }
  }

  /// Copy the counters into a [`RunStats`].
  pub fn snapshot(&self) -> RunStats {
    RunStats {
      leaf_triangles: self.leaf_triangles.get(),
      culled_triangles: self.culled_triangles.get(),
      near_field_triangles: self.near_field_triangles.get(),
      deepest_split: self.deepest_split.get(),
      closest_distance_sq: self.closest_distance_sq.get(),
      ..RunStats::default()
    }
  }
}

impl Default for StatCells {
  fn default() -> Self {
    Self::new()
  }
}

// =============================================================================
// Zone counters
// =============================================================================

/// Atomic write offsets, one per gather zone.
///
/// Lifecycle per run: `reset` (all counters at [`ZONE_UNUSED`]) → `arm`
/// (each used counter set to its zone base) → concurrent `reserve` → `reset`.
#[derive(Debug)]
pub struct ZoneCounters {
  counters: Vec<AtomicCell<u32>>,
}

impl ZoneCounters {
  /// Create `zone_count` counters at the unused sentinel.
  pub fn new(zone_count: usize) -> Self {
    Self {
      counters: (0..zone_count).map(|_| AtomicCell::new(ZONE_UNUSED)).collect(),
    }
  }

  pub fn zone_count(&self) -> usize {
    self.counters.len()
  }

  /// Return every counter to the unused sentinel.
  pub fn reset(&self) {
    for counter in &self.counters {
      counter.set(ZONE_UNUSED);
    }
  }

  /// Arm the first `bases.len()` counters with their zone base offsets.
  ///
  /// Fails with `StaleZoneCounter` if a counter was not reset since its last
  /// run.
  pub fn arm(&self, bases: &[u32]) -> Result<(), PipelineError> {
    if bases.len() > self.counters.len() {
      return Err(PipelineError::InvalidConfig(format!(
        "{} zones requested but only {} counters exist",
        bases.len(),
        self.counters.len()
      )));
    }
    for (zone, (counter, &base)) in self.counters.iter().zip(bases).enumerate() {
      counter
        .compare_exchange(ZONE_UNUSED, base)
        .map_err(|value| PipelineError::StaleZoneCounter { zone, value })?;
    }
    Ok(())
  }

  /// Reserve `count` slots in `zone`, returning the first reserved slot.
  ///
  /// Fails with `StaleZoneCounter` if the zone is not armed and with
  /// `ZoneOverrun` if the reservation would run into the sentinel. The
  /// counter is left untouched on failure.
  pub fn reserve(&self, zone: usize, count: u32) -> Result<u32, PipelineError> {
    let counter = self.counters.get(zone).ok_or_else(|| {
      PipelineError::InvalidConfig(format!(
        "zone {} is out of range for {} counters",
        zone,
        self.counters.len()
      ))
    })?;

    let mut start = None;
    let settled = counter.fetch_update(|current| {
      start = None;
      if current == ZONE_UNUSED {
        return None;
      }
      let end = current.checked_add(count).filter(|&end| end != ZONE_UNUSED)?;
      start = Some(current);
      Some(end)
    });

    match start {
      Some(start) => Ok(start),
      None if settled == ZONE_UNUSED => Err(PipelineError::StaleZoneCounter {
        zone,
        value: ZONE_UNUSED,
      }),
      None => Err(PipelineError::ZoneOverrun {
        zone,
        reserved: settled.saturating_add(count),
        capacity: ZONE_UNUSED - 1,
      }),
    }
  }

  /// Current value of a zone counter, [`ZONE_UNUSED`] for zones that do not
  /// exist.
  pub fn value(&self, zone: usize) -> u32 {
    self.counters.get(zone).map_or(ZONE_UNUSED, AtomicCell::get)
  }
}

// =============================================================================
// RunContext
// =============================================================================

/// Shared mutable state for one pipeline run.
///
/// Can be reused across runs; [`RunContext::reset`] re-arms it.
#[derive(Debug)]
pub struct RunContext {
  pub stats: StatCells,
  pub zones: ZoneCounters,
}

impl RunContext {
  pub fn new(config: &SubdivisionConfig) -> Self {
    Self {
      stats: StatCells::new(),
      zones: ZoneCounters::new(config.zone_count.max(1)),
    }
  }

  /// Reset statistics and zone counters before a run.
  ///
  /// Reallocates the zone counters if `config` asks for a different count.
  pub fn reset(&mut self, config: &SubdivisionConfig) {
    self.stats.reset();
    if self.zones.zone_count() != config.zone_count.max(1) {
      self.zones = ZoneCounters::new(config.zone_count.max(1));
    } else {
      self.zones.reset();
    }
  }
}
