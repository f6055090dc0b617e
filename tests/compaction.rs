use anyhow::Result;
use wavestore::{CompactionOutcome, Error, Segment};

fn ramp(range: std::ops::Range<u32>) -> Vec<f32> {
    range.map(|value| value as f32).collect()
}

fn small_segment() -> Result<Segment> {
    Ok(Segment::builder(3)
        .max_chunk_bytes(64)
        .scale_power(2)
        .level_count(3)
        .build()?)
}

#[test]
fn compaction_is_skipped_while_segment_accepts_samples() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..20))?;
    assert_eq!(segment.free_unused_memory(), CompactionOutcome::Skipped);
    assert_eq!(segment.stats().compactions, 0);
    assert_eq!(segment.stats().sample_bytes, 128);
    Ok(())
}

#[test]
fn compaction_releases_the_unused_tail() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..20))?;
    assert!(segment.mark_complete());
    // Completion alone leaves memory untouched.
    assert_eq!(segment.stats().sample_bytes, 128);

    assert_eq!(
        segment.free_unused_memory(),
        CompactionOutcome::Compacted { released_bytes: 48 }
    );
    let stats = segment.stats();
    assert_eq!(stats.sample_bytes, 80);
    assert_eq!(stats.chunk_count, 2);
    assert_eq!(stats.compactions, 1);
    assert_eq!(segment.samples(0..20)?, ramp(0..20));
    Ok(())
}

#[test]
fn compaction_drops_the_eagerly_allocated_chunk() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..32))?;
    assert_eq!(segment.stats().chunk_count, 3);
    segment.mark_complete();

    assert_eq!(
        segment.free_unused_memory(),
        CompactionOutcome::Compacted { released_bytes: 64 }
    );
    assert_eq!(segment.stats().chunk_count, 2);
    assert_eq!(segment.sample(31)?, 31.0);
    Ok(())
}

#[test]
fn compaction_waits_for_the_last_iterator() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..20))?;
    segment.mark_complete();

    let first = segment.iter(0)?;
    let second = segment.iter(5)?;
    assert_eq!(segment.stats().outstanding_iterators, 2);
    assert_eq!(segment.free_unused_memory(), CompactionOutcome::Deferred);
    assert_eq!(segment.stats().compactions, 0);

    first.end();
    assert_eq!(segment.stats().compactions, 0);
    assert_eq!(segment.stats().sample_bytes, 128);

    second.end();
    let stats = segment.stats();
    assert_eq!(stats.outstanding_iterators, 0);
    assert_eq!(stats.compactions, 1);
    assert_eq!(stats.sample_bytes, 80);

    // Nothing pending any more: another traversal does not compact again.
    let third = segment.iter(0)?;
    drop(third);
    assert_eq!(segment.stats().compactions, 1);
    Ok(())
}

#[test]
fn abandoned_iterators_release_their_reference() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..20))?;
    segment.mark_complete();

    let found = {
        let mut iter = segment.iter(0)?;
        assert_eq!(segment.free_unused_memory(), CompactionOutcome::Deferred);
        iter.find(|&value| value > 3.0)
    };
    assert_eq!(found, Some(4.0));
    assert_eq!(segment.stats().outstanding_iterators, 0);
    assert_eq!(segment.stats().compactions, 1);
    Ok(())
}

#[test]
fn iterator_crosses_chunk_boundaries() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..100))?;

    let collected: Vec<f32> = segment.iter(10)?.collect();
    assert_eq!(collected, ramp(10..100));

    let mut iter = segment.iter(3)?;
    assert_eq!(iter.value()?, 3.0);
    iter.advance(16);
    assert_eq!(iter.value()?, 19.0);
    iter.advance(45);
    assert_eq!(iter.index(), 64);
    assert_eq!(iter.value()?, 64.0);

    let mut dest = [0f32; 40];
    assert_eq!(iter.read(&mut dest), 36);
    assert_eq!(dest[..36].to_vec(), ramp(64..100));
    assert_eq!(iter.remaining(), 0);
    assert!(matches!(
        iter.value().unwrap_err(),
        Error::OutOfRange { index: 100, len: 100 }
    ));
    Ok(())
}

#[test]
fn iterator_stops_at_count_captured_at_start() -> Result<()> {
    let segment = small_segment()?;
    segment.append(&ramp(0..10))?;

    let iter = segment.iter(8)?;
    segment.append(&ramp(10..30))?;
    assert_eq!(iter.end_index(), 10);
    assert_eq!(iter.collect::<Vec<_>>(), vec![8.0, 9.0]);

    assert!(segment.iter(30)?.next().is_none());
    assert!(matches!(
        segment.iter(31).unwrap_err(),
        Error::OutOfRange { index: 31, len: 30 }
    ));
    assert_eq!(segment.stats().outstanding_iterators, 0);
    Ok(())
}
