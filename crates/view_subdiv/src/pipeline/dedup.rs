//! Stage 2: assign a dense index to every distinct vertex key.

use std::collections::HashMap;

use glam::Vec3;

use crate::error::PipelineError;
use crate::stream::PartitionedStream;
use crate::types::{Triangle, VertexKey, VertexKeyMode};

/// Map from vertex key to dense output index.
///
/// Indices are assigned in first-seen order while scanning stream A in
/// partition order, then corner order, so the same input always yields the
/// same map.
#[derive(Debug, Default)]
pub struct VertexIndexMap {
  map: HashMap<VertexKey, u32>,
  key_mode: VertexKeyMode,
}

impl VertexIndexMap {
  /// Number of distinct keys, which is the output vertex count.
  pub fn unique_count(&self) -> usize {
    self.map.len()
  }

  /// Index assigned to the key of `position`.
  #[inline]
  pub fn lookup(&self, position: Vec3) -> Option<u32> {
    self.index_of_key(&self.key_mode.key(position))
  }

  #[inline]
  pub fn index_of_key(&self, key: &VertexKey) -> Option<u32> {
    self.map.get(key).copied()
  }
}

/// Build the vertex index map from stream A.
///
/// Sequential: first-seen order is what makes indices deterministic.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "subdiv::dedup"))]
pub fn dedup_pass(
  stream: &PartitionedStream<Triangle>,
  expected_partitions: usize,
  key_mode: VertexKeyMode,
) -> Result<VertexIndexMap, PipelineError> {
  let reader = stream.reader(expected_partitions)?;

  // A connected triangle mesh has roughly half as many vertices as triangles
  let mut map = HashMap::with_capacity(stream.len() / 2 + 3);
  for (_, triangle) in reader.iter() {
    for &position in &triangle.positions {
      let next = map.len() as u32;
      map.entry(key_mode.key(position)).or_insert(next);
    }
  }

  Ok(VertexIndexMap { map, key_mode })
}
