//! Partitioned append-only streams.
//!
//! A [`PartitionedStream`] is created with a fixed number of partitions, one
//! per parallel work item of the producing pass. Each work item opens its own
//! partition, appends to it, and closes it; no synchronization is needed
//! between partitions. A later pass reads every partition back in partition
//! order through a [`StreamReader`].
//!
//! ```text
//! writer pass (parallel)             reader pass (sequential or parallel)
//! ┌─────────────┐
//! │ partition 0 │── open → write* → close ──┐
//! ├─────────────┤                           │
//! │ partition 1 │── open → write* → close ──┼──► reader(expected = N)
//! ├─────────────┤                           │     visits 0, 1, .., N-1
//! │ partition N │── open → write* → close ──┘
//! └─────────────┘
//! ```
//!
//! Invariants:
//! - A closed partition is never reopened (`PartitionReopened`).
//! - The reader must declare the same partition count the writer used
//!   (`PartitionCountMismatch`), and every partition must be closed
//!   (`PartitionNotClosed`).

use rayon::prelude::*;

use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PartitionState {
  Unopened,
  Open,
  Closed,
}

struct Partition<T> {
  items: Vec<T>,
  state: PartitionState,
}

impl<T> Partition<T> {
  fn open(&mut self, index: usize) -> Result<PartitionWriter<'_, T>, PipelineError> {
    if self.state != PartitionState::Unopened {
      return Err(PipelineError::PartitionReopened { index });
    }
    self.state = PartitionState::Open;
    Ok(PartitionWriter {
      index,
      items: &mut self.items,
      state: &mut self.state,
    })
  }
}

/// Append-only stream split into independently written partitions.
pub struct PartitionedStream<T> {
  partitions: Vec<Partition<T>>,
}

impl<T> PartitionedStream<T> {
  /// Create a stream with `partition_count` unopened partitions.
  pub fn new(partition_count: usize) -> Self {
    let partitions = (0..partition_count)
      .map(|_| Partition {
        items: Vec::new(),
        state: PartitionState::Unopened,
      })
      .collect();
    Self { partitions }
  }

  /// Number of partitions the writer declared.
  pub fn partition_count(&self) -> usize {
    self.partitions.len()
  }

  /// Total number of items across all partitions.
  pub fn len(&self) -> usize {
    self.partitions.iter().map(|p| p.items.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.partitions.iter().all(|p| p.items.is_empty())
  }

  /// Open a single partition for writing.
  pub fn open(&mut self, index: usize) -> Result<PartitionWriter<'_, T>, PipelineError> {
    let count = self.partitions.len();
    self
      .partitions
      .get_mut(index)
      .ok_or(PipelineError::PartitionOutOfRange { index, count })?
      .open(index)
  }

  /// Read the stream back, checking the writer/reader contract.
  ///
  /// `expected_partitions` is the partition count the reading pass iterates;
  /// it must match the count the stream was written with.
  pub fn reader(&self, expected_partitions: usize) -> Result<StreamReader<'_, T>, PipelineError> {
    if expected_partitions != self.partitions.len() {
      return Err(PipelineError::PartitionCountMismatch {
        expected: expected_partitions,
        actual: self.partitions.len(),
      });
    }
    if let Some(index) = self
      .partitions
      .iter()
      .position(|p| p.state != PartitionState::Closed)
    {
      return Err(PipelineError::PartitionNotClosed { index });
    }
    Ok(StreamReader {
      partitions: &self.partitions,
    })
  }
}

impl<T: Send> PartitionedStream<T> {
  /// Fill every partition on the worker pool.
  ///
  /// Each partition is opened, handed to `fill` together with its index, and
  /// closed when `fill` returns. Work is split into jobs of at least
  /// `batch_size` partitions. The first error aborts the pass.
  pub fn par_fill<F>(&mut self, batch_size: usize, fill: F) -> Result<(), PipelineError>
  where
    F: Fn(usize, &mut PartitionWriter<'_, T>) -> Result<(), PipelineError> + Sync + Send,
  {
    self
      .partitions
      .par_iter_mut()
      .enumerate()
      .with_min_len(batch_size.max(1))
      .try_for_each(|(index, partition)| {
        let mut writer = partition.open(index)?;
        fill(index, &mut writer)
      })
  }
}

/// Exclusive write access to one open partition.
///
/// The partition closes when the writer is dropped.
pub struct PartitionWriter<'a, T> {
  index: usize,
  items: &'a mut Vec<T>,
  state: &'a mut PartitionState,
}

impl<T> PartitionWriter<'_, T> {
  /// Index of the partition being written.
  pub fn index(&self) -> usize {
    self.index
  }

  /// Append one item.
  #[inline]
  pub fn write(&mut self, item: T) {
    self.items.push(item);
  }

  /// Items written so far.
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Close the partition explicitly.
  pub fn close(self) {}
}

impl<T> Drop for PartitionWriter<'_, T> {
  fn drop(&mut self) {
    *self.state = PartitionState::Closed;
  }
}

/// Read-only view over a fully written stream.
pub struct StreamReader<'a, T> {
  partitions: &'a [Partition<T>],
}

impl<T> Clone for StreamReader<'_, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for StreamReader<'_, T> {}

impl<'a, T> StreamReader<'a, T> {
  pub fn partition_count(&self) -> usize {
    self.partitions.len()
  }

  /// Items of one partition in write order.
  ///
  /// Panics if `index` is out of range.
  pub fn partition(&self, index: usize) -> &'a [T] {
    &self.partitions[index].items
  }

  /// Item count per partition, in partition order.
  pub fn partition_lengths(&self) -> impl Iterator<Item = usize> + 'a {
    self.partitions.iter().map(|p| p.items.len())
  }

  /// All items in partition order, then write order, tagged with their
  /// partition index.
  pub fn iter(&self) -> impl Iterator<Item = (usize, &'a T)> + 'a {
    self
      .partitions
      .iter()
      .enumerate()
      .flat_map(|(index, p)| p.items.iter().map(move |item| (index, item)))
  }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
