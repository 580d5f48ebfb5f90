use rivulet_buffer::{
    Batch, BufferConfig, BufferError, Capacity, Record, Schema, StreamingBuffer, UpdateMode,
};

fn schema() -> Schema {
    Schema::new(["x", "y"]).unwrap()
}

fn point(v: f64) -> Record {
    Record::new(schema(), vec![v, v]).unwrap()
}

/// Batch sizes that cycle through empty, small and larger-than-capacity batches
fn batch_sizes() -> impl Iterator<Item = usize> {
    [1, 0, 3, 7, 2, 0, 11, 1, 4, 5, 9, 1].into_iter().cycle().take(60)
}

#[test]
fn test_append_keeps_last_capacity_records_in_arrival_order() {
    for cap in [1, 2, 3, 5, 8] {
        let mut buffer = StreamingBuffer::new(Capacity::bounded(cap).unwrap(), UpdateMode::Append);
        let mut arrived: Vec<Record> = Vec::new();
        let mut next = 0.0;

        for size in batch_sizes() {
            let batch: Batch = (0..size)
                .map(|_| {
                    next += 1.0;
                    point(next)
                })
                .collect();
            arrived.extend(batch.records().iter().cloned());

            let view = buffer.apply(batch).unwrap();

            let start = arrived.len().saturating_sub(cap);
            assert!(view.len() <= cap);
            assert_eq!(view.to_vec(), &arrived[start..], "capacity {}", cap);
        }
    }
}

#[test]
fn test_replace_holds_tail_of_latest_batch() {
    for cap in [1, 2, 4, 6] {
        let mut buffer =
            StreamingBuffer::new(Capacity::bounded(cap).unwrap(), UpdateMode::Replace);
        let mut expected: Vec<Record> = Vec::new();
        let mut next = 0.0;

        for size in batch_sizes() {
            let batch: Vec<Record> = (0..size)
                .map(|_| {
                    next += 1.0;
                    point(next)
                })
                .collect();
            if !batch.is_empty() {
                expected = batch[batch.len().saturating_sub(cap)..].to_vec();
            }

            let view = buffer.apply(batch.into()).unwrap();

            assert!(view.len() <= cap);
            assert_eq!(view.to_vec(), expected);
        }
    }
}

#[test]
fn test_snapshot_is_idempotent() {
    let mut buffer = StreamingBuffer::new(Capacity::bounded(4).unwrap(), UpdateMode::Append);
    buffer.apply(vec![point(1.0), point(2.0)].into()).unwrap();

    let first = buffer.snapshot();
    let second = buffer.snapshot();

    assert_eq!(first, second);
    assert_eq!(first.version(), second.version());
}

#[test]
fn test_schema_mismatch_signalled_and_state_kept() {
    let mut buffer = StreamingBuffer::new(Capacity::bounded(4).unwrap(), UpdateMode::Replace);
    buffer.apply(vec![point(1.0)].into()).unwrap();
    let before = buffer.snapshot();

    let swapped = Record::from_pairs([("y", 1.0), ("x", 1.0)]).unwrap();
    let err = buffer.apply(vec![swapped].into()).unwrap_err();

    match err {
        BufferError::SchemaMismatch { expected, found } => {
            assert_eq!(expected.fields(), &["x", "y"]);
            assert_eq!(found.fields(), &["y", "x"]);
        }
        other => panic!("Expected SchemaMismatch, got {:?}", other),
    }
    assert_eq!(buffer.snapshot(), before);
}

#[test]
fn test_documented_examples() {
    let mut append = StreamingBuffer::new(Capacity::bounded(3).unwrap(), UpdateMode::Append);
    append.apply(vec![point(1.0)].into()).unwrap();
    let view = append
        .apply(vec![point(2.0), point(3.0), point(4.0)].into())
        .unwrap();
    assert_eq!(view.column("x"), Some(vec![2.0, 3.0, 4.0]));

    let mut replace = StreamingBuffer::new(Capacity::bounded(2).unwrap(), UpdateMode::Replace);
    let view = replace
        .apply(vec![point(1.0), point(2.0), point(3.0)].into())
        .unwrap();
    assert_eq!(view.column("y"), Some(vec![2.0, 3.0]));

    let mut idle = StreamingBuffer::new(Capacity::bounded(5).unwrap(), UpdateMode::Append);
    let view = idle.apply(Batch::empty()).unwrap();
    assert!(view.is_empty());
    assert_eq!(view.version(), 0);
}

#[test]
fn test_invalid_configuration() {
    let zero = BufferConfig::new().with_capacity(0);
    assert!(matches!(
        StreamingBuffer::from_config(&zero),
        Err(BufferError::InvalidConfiguration(_))
    ));

    assert!(matches!(
        "prepend".parse::<UpdateMode>(),
        Err(BufferError::InvalidConfiguration(_))
    ));
}
