//! Stage 4: concatenate stream B into the final index buffer.
//!
//! Partitions are grouped into contiguous zones, one atomic counter per zone.
//!
//! ```text
//! partitions  | p0 p1 p2 | p3 p4 p5 | p6 p7 |
//! zones       |  zone 0  |  zone 1  | zone 2|
//! bases       0          b1         b2      total
//! ```
//!
//! Zone bases are the prefix sums of the zone sizes, computed before any
//! worker starts. Zones run in parallel; inside a zone the partitions are
//! drained in order, each reserving its slice with a `fetch_add` on the zone
//! counter. The result is the sequential concatenation of stream B, so the
//! index buffer is identical on every run.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::error::PipelineError;
use crate::pipeline::context::ZoneCounters;
use crate::stream::PartitionedStream;

/// Contiguous partition ranges and their output offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneLayout {
  /// Partitions handled by each zone.
  pub partitions: Vec<Range<usize>>,
  /// First output slot of each zone.
  pub bases: Vec<u32>,
  /// Total number of indices.
  pub total: u32,
}

impl ZoneLayout {
  /// Split `triangle_counts` (one entry per partition) into at most
  /// `max_zones` contiguous zones.
  pub fn new(triangle_counts: &[usize], max_zones: usize) -> Result<Self, PipelineError> {
    let required = triangle_counts.iter().map(|&n| n as u64 * 3).sum::<u64>();
    let total = u32::try_from(required).map_err(|_| PipelineError::IndexBufferOverflow { required })?;

    if triangle_counts.is_empty() {
      return Ok(Self {
        partitions: Vec::new(),
        bases: Vec::new(),
        total,
      });
    }

    let per_zone = triangle_counts.len().div_ceil(max_zones.max(1));
    let mut partitions = Vec::new();
    let mut bases = Vec::new();
    let mut offset = 0u32;
    for start in (0..triangle_counts.len()).step_by(per_zone) {
      let end = (start + per_zone).min(triangle_counts.len());
      bases.push(offset);
      partitions.push(start..end);
      // Fits: the whole sum was checked above
      offset += triangle_counts[start..end].iter().map(|&n| n as u32 * 3).sum::<u32>();
    }

    Ok(Self {
      partitions,
      bases,
      total,
    })
  }

  pub fn zone_count(&self) -> usize {
    self.partitions.len()
  }

  /// One past the last output slot of `zone`.
  pub fn zone_end(&self, zone: usize) -> u32 {
    self.bases.get(zone + 1).copied().unwrap_or(self.total)
  }
}

/// Concatenate stream B into a flat index buffer.
///
/// `zones` must be reset on entry; it is reset again on success.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "subdiv::gather"))]
pub fn gather_pass(
  stream: &PartitionedStream<[u32; 3]>,
  expected_partitions: usize,
  zones: &ZoneCounters,
) -> Result<Vec<u32>, PipelineError> {
  let reader = stream.reader(expected_partitions)?;
  let counts: Vec<usize> = reader.partition_lengths().collect();
  let layout = ZoneLayout::new(&counts, zones.zone_count())?;

  #[cfg(feature = "tracing")]
  tracing::trace!(zones = layout.zone_count(), indices = layout.total, "gather layout");

  zones.arm(&layout.bases)?;

  let output: Vec<AtomicU32> = (0..layout.total).map(|_| AtomicU32::new(0)).collect();

  let written: Result<(), PipelineError> = layout
    .partitions
    .par_iter()
    .enumerate()
    .try_for_each(|(zone, partitions)| {
      let capacity = layout.zone_end(zone);
      for partition in partitions.clone() {
        let triangles = reader.partition(partition);
        let count = triangles.len() as u32 * 3;
        let start = zones.reserve(zone, count)?;
        let slots = output
          .get(start as usize..start as usize + count as usize)
          .filter(|_| start + count <= capacity)
          .ok_or(PipelineError::ZoneOverrun {
            zone,
            reserved: start + count,
            capacity,
          })?;
        for (slot, &index) in slots.iter().zip(triangles.iter().flatten()) {
          slot.store(index, Ordering::Relaxed);
        }
      }
      Ok(())
    });

  if let Err(err) = written {
    zones.reset();
    return Err(err);
  }

  for zone in 0..layout.zone_count() {
    let reserved = zones.value(zone);
    let capacity = layout.zone_end(zone);
    if reserved != capacity {
      return Err(PipelineError::ZoneOverrun {
        zone,
        reserved,
        capacity,
      });
    }
  }
  zones.reset();

  Ok(output.into_iter().map(AtomicU32::into_inner).collect())
}
