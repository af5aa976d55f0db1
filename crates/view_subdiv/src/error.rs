//! Error type shared by every pipeline stage.
//!
//! All variants are fatal to the run that produced them: the pipeline is a
//! deterministic function of its inputs and never retries.

/// Failure surfaced by the subdivision pipeline.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PipelineError {
  /// Configuration rejected by [`SubdivisionConfig::validate`](crate::SubdivisionConfig::validate).
  #[error("invalid subdivision config: {0}")]
  InvalidConfig(String),

  /// Source index buffer does not describe whole triangles.
  #[error("index buffer length {len} is not a multiple of 3")]
  MalformedIndexBuffer { len: usize },

  /// Source index points past the end of the vertex arrays.
  #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
  IndexOutOfRange {
    position: usize,
    index: u32,
    vertex_count: usize,
  },

  /// Source attribute array has a different length than the position array.
  #[error("attribute `{attribute}` has {actual} entries, expected {expected}")]
  AttributeLengthMismatch {
    attribute: &'static str,
    expected: usize,
    actual: usize,
  },

  /// A partition was opened a second time by the same pass.
  #[error("partition {index} was reopened after being closed")]
  PartitionReopened { index: usize },

  /// Partition index beyond the count the stream was created with.
  #[error("partition {index} is out of range for a stream of {count} partitions")]
  PartitionOutOfRange { index: usize, count: usize },

  /// A reader was requested while a partition was still open or never written.
  #[error("partition {index} was read before it was closed")]
  PartitionNotClosed { index: usize },

  /// Reader and writer disagree on the number of partitions.
  #[error("stream declares {actual} partitions but the reader expected {expected}")]
  PartitionCountMismatch { expected: usize, actual: usize },

  /// Reconstruction could not find an index the dedup pass should have assigned.
  #[error("no vertex index for corner {corner} of triangle {triangle} in partition {partition}")]
  VertexKeyMissing {
    partition: usize,
    triangle: usize,
    corner: usize,
  },

  /// A zone counter was armed without being reset after its previous run.
  #[error("zone counter {zone} holds stale value {value}; counters must be reset before arming")]
  StaleZoneCounter { zone: usize, value: u32 },

  /// A zone reserved more (or fewer) index slots than its partitions hold.
  #[error("zone {zone} reserved up to slot {reserved} but owns slots up to {capacity}")]
  ZoneOverrun {
    zone: usize,
    reserved: u32,
    capacity: u32,
  },

  /// Final index count does not fit a 32-bit index buffer.
  #[error("output needs {required} indices, more than a u32 index buffer can address")]
  IndexBufferOverflow { required: u64 },
}
