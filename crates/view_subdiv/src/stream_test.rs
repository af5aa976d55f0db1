use super::*;

#[test]
fn test_sequential_write_and_read_in_partition_order() {
  let mut stream = PartitionedStream::new(3);

  // Write out of order: partition order, not write order, drives the reader
  for index in [2, 0, 1] {
    let mut writer = stream.open(index).unwrap();
    writer.write(index * 10);
    writer.write(index * 10 + 1);
    writer.close();
  }

  let reader = stream.reader(3).unwrap();
  let items: Vec<_> = reader.iter().map(|(p, v)| (p, *v)).collect();
  assert_eq!(
    items,
    vec![(0, 0), (0, 1), (1, 10), (1, 11), (2, 20), (2, 21)]
  );
  assert_eq!(stream.len(), 6);
}

#[test]
fn test_reopening_closed_partition_fails() {
  let mut stream: PartitionedStream<u32> = PartitionedStream::new(2);
  stream.open(1).unwrap().write(5);

  let err = stream.open(1).err();
  assert_eq!(err, Some(PipelineError::PartitionReopened { index: 1 }));
}

#[test]
fn test_open_out_of_range() {
  let mut stream: PartitionedStream<u32> = PartitionedStream::new(2);
  let err = stream.open(2).err();
  assert_eq!(
    err,
    Some(PipelineError::PartitionOutOfRange { index: 2, count: 2 })
  );
}

#[test]
fn test_reader_rejects_partition_count_mismatch() {
  let mut stream: PartitionedStream<u32> = PartitionedStream::new(2);
  stream.par_fill(1, |_, _| Ok(())).unwrap();

  let err = stream.reader(3).err();
  assert_eq!(
    err,
    Some(PipelineError::PartitionCountMismatch {
      expected: 3,
      actual: 2
    })
  );
}

#[test]
fn test_reader_rejects_unwritten_partition() {
  let mut stream: PartitionedStream<u32> = PartitionedStream::new(3);
  stream.open(0).unwrap().close();
  stream.open(2).unwrap().close();

  let err = stream.reader(3).err();
  assert_eq!(err, Some(PipelineError::PartitionNotClosed { index: 1 }));
}

#[test]
fn test_par_fill_writes_each_partition_exclusively() {
  let mut stream = PartitionedStream::new(1_000);

  stream
    .par_fill(16, |index, writer| {
      assert_eq!(writer.index(), index);
      for k in 0..(index % 4) {
        writer.write((index, k));
      }
      Ok(())
    })
    .unwrap();

  let reader = stream.reader(1_000).unwrap();
  for index in 0..1_000 {
    let items = reader.partition(index);
    assert_eq!(items.len(), index % 4);
    assert!(items.iter().all(|(p, _)| *p == index));
  }

  let lengths: Vec<_> = reader.partition_lengths().collect();
  assert_eq!(lengths.len(), 1_000);
  assert_eq!(lengths.iter().sum::<usize>(), stream.len());
}

#[test]
fn test_par_fill_twice_reports_reopen() {
  let mut stream: PartitionedStream<u8> = PartitionedStream::new(4);
  stream.par_fill(1, |_, _| Ok(())).unwrap();

  let err = stream.par_fill(1, |_, _| Ok(())).unwrap_err();
  assert!(matches!(err, PipelineError::PartitionReopened { .. }));
}

#[test]
fn test_par_fill_propagates_worker_error() {
  let mut stream: PartitionedStream<u8> = PartitionedStream::new(8);
  let err = stream
    .par_fill(1, |index, _| {
      if index == 5 {
        Err(PipelineError::VertexKeyMissing {
          partition: index,
          triangle: 0,
          corner: 0,
        })
      } else {
        Ok(())
      }
    })
    .unwrap_err();

  assert!(matches!(
    err,
    PipelineError::VertexKeyMissing { partition: 5, .. }
  ));
}

#[test]
fn test_par_fill_lands_in_partition_order() {
  let mut stream = PartitionedStream::new(64);
  stream
    .par_fill(4, |index, writer| {
      writer.write(index as u64 * 3);
      Ok(())
    })
    .unwrap();

  let reader = stream.reader(64).unwrap();
  let collected: Vec<(usize, u64)> = reader.iter().map(|(index, &item)| (index, item)).collect();

  assert_eq!(collected.len(), 64);
  for (position, (index, item)) in collected.into_iter().enumerate() {
    assert_eq!(index, position);
    assert_eq!(item, index as u64 * 3);
  }
}

#[test]
fn test_empty_stream() {
  let stream: PartitionedStream<u32> = PartitionedStream::new(0);
  assert!(stream.is_empty());
  let reader = stream.reader(0).unwrap();
  assert_eq!(reader.partition_count(), 0);
  assert_eq!(reader.iter().count(), 0);
}
