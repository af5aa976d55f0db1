//! Stage 3: fill the vertex buffers and emit index triples into stream B.
//!
//! Every leaf corner writes its attributes to the slot of its dedup index.
//! Corners sharing a key write from different workers at the same time. The
//! stores are relaxed atomics: each component ends up holding the bits of one
//! of its writers. With exact keys all writers of a slot carry the same bits.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Vec3, Vec4};

use crate::error::PipelineError;
use crate::pipeline::dedup::VertexIndexMap;
use crate::stream::PartitionedStream;
use crate::types::Triangle;

/// Fixed-size attribute array written concurrently by many workers.
struct SharedAttributeBuffer<const N: usize> {
  bits: Vec<AtomicU32>,
}

impl<const N: usize> SharedAttributeBuffer<N> {
  fn new(count: usize) -> Self {
    Self {
      bits: (0..count * N).map(|_| AtomicU32::new(0)).collect(),
    }
  }

  #[inline]
  fn store(&self, index: usize, value: [f32; N]) {
    let slot = &self.bits[index * N..(index + 1) * N];
    for (cell, v) in slot.iter().zip(value) {
      cell.store(v.to_bits(), Ordering::Relaxed);
    }
  }

  fn into_values(self) -> Vec<[f32; N]> {
    let raw: Vec<u32> = self.bits.into_iter().map(AtomicU32::into_inner).collect();
    raw
      .chunks_exact(N)
      .map(|c| std::array::from_fn(|i| f32::from_bits(c[i])))
      .collect()
  }
}

/// Deduplicated vertex attributes, indexed by dedup index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexBuffers {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub colors: Vec<Vec4>,
}

/// Output of the reconstruction pass.
pub struct Reconstruction {
  pub vertices: VertexBuffers,
  /// Stream B: one index triple per leaf, partitioned like stream A.
  pub triangles: PartitionedStream<[u32; 3]>,
}

/// Resolve every leaf corner to its dedup index and write vertex attributes.
///
/// # Errors
/// `VertexKeyMissing` if a corner's key is not in `map`, which means the map
/// was built from a different stream.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "subdiv::reconstruct"))]
pub fn reconstruct_pass(
  stream: &PartitionedStream<Triangle>,
  expected_partitions: usize,
  map: &VertexIndexMap,
  batch_size: usize,
) -> Result<Reconstruction, PipelineError> {
  let reader = stream.reader(expected_partitions)?;
  let vertex_count = map.unique_count();

  let positions = SharedAttributeBuffer::<3>::new(vertex_count);
  let normals = SharedAttributeBuffer::<3>::new(vertex_count);
  let colors = SharedAttributeBuffer::<4>::new(vertex_count);

  let mut triangles = PartitionedStream::new(expected_partitions);
  triangles.par_fill(batch_size, |partition, writer| {
    for (triangle_index, leaf) in reader.partition(partition).iter().enumerate() {
      let mut indices = [0u32; 3];
      for corner in 0..3 {
        let index = map
          .lookup(leaf.positions[corner])
          .ok_or(PipelineError::VertexKeyMissing {
            partition,
            triangle: triangle_index,
            corner,
          })?;
        let slot = index as usize;
        positions.store(slot, leaf.positions[corner].to_array());
        normals.store(slot, leaf.normals[corner].to_array());
        colors.store(slot, leaf.colors[corner].to_array());
        indices[corner] = index;
      }
      writer.write(indices);
    }
    Ok(())
  })?;

  let vertices = VertexBuffers {
    positions: positions.into_values().into_iter().map(Vec3::from_array).collect(),
    normals: normals.into_values().into_iter().map(Vec3::from_array).collect(),
    colors: colors.into_values().into_iter().map(Vec4::from_array).collect(),
  };

  Ok(Reconstruction {
    vertices,
    triangles,
  })
}
