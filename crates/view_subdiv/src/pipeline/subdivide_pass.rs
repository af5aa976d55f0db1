//! Stage 1: subdivide every source triangle into stream A.

use crate::error::PipelineError;
use crate::pipeline::context::StatCells;
use crate::stream::PartitionedStream;
use crate::subdivide::{process_triangle, SubdivisionContext};
use crate::types::Triangle;

/// Run the subdivider over every source triangle on the worker pool.
///
/// Partition `i` of the returned stream holds the leaves of source triangle
/// `i` in depth-first order. Statistics are accumulated into `stats`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "subdiv::subdivide"))]
pub fn subdivide_pass(
  triangles: &[Triangle],
  context: &SubdivisionContext,
  stats: &StatCells,
  batch_size: usize,
) -> Result<PartitionedStream<Triangle>, PipelineError> {
  let mut stream = PartitionedStream::new(triangles.len());

  stream.par_fill(batch_size, |index, writer| {
    let mut deepest = 0u32;
    let outcome = process_triangle(&triangles[index], context, |leaf, depth| {
      deepest = deepest.max(depth);
      writer.write(leaf);
    });
    stats.record_partition(&outcome, writer.len() as u64, deepest);
    Ok(())
  })?;

  Ok(stream)
}
