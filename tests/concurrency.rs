use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use wavestore::{CompactionOutcome, Segment};

const TOTAL: u64 = 200_000;
const READERS: usize = 4;

/// Readers must only ever see the writer's exact values for indices below the count they
/// observed, and envelopes consistent with that prefix.
#[test]
fn readers_observe_consistent_prefixes_while_writer_appends() -> Result<()> {
    let segment = Arc::new(
        Segment::builder(0)
            .samplerate(1.0e6)
            .max_chunk_bytes(4096)
            .build()?,
    );
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for reader in 0..READERS {
            let segment = Arc::clone(&segment);
            let done = &done;
            scope.spawn(move || {
                let mut probe = reader as u64;
                while !done.load(Ordering::Acquire) {
                    let count = segment.sample_count();
                    if count == 0 {
                        continue;
                    }
                    probe = (probe * 7919 + 13) % count;
                    assert_eq!(segment.sample(probe).unwrap(), probe as f32);
                    assert_eq!(segment.sample(count - 1).unwrap(), (count - 1) as f32);

                    let section = segment.envelope_section(0..count, 16.0).unwrap();
                    assert_eq!(section.len() as u64, count / 16);
                    if let Some(last) = section.pairs.last() {
                        let span = section.sample_span(section.len() - 1);
                        assert_eq!(last.min, span.start as f32);
                        assert_eq!(last.max, (span.end - 1) as f32);
                    }

                    let (min, max) = segment.min_max().unwrap();
                    assert_eq!(min, 0.0);
                    assert!(max >= (count - 1) as f32);
                }
            });
        }

        let writer = Arc::clone(&segment);
        let done = &done;
        scope.spawn(move || {
            let mut next = 0u64;
            let mut batch = 1u64;
            while next < TOTAL {
                let end = (next + batch).min(TOTAL);
                let samples: Vec<f32> = (next..end).map(|value| value as f32).collect();
                writer.append(&samples).unwrap();
                next = end;
                batch = batch % 997 + 1;
            }
            writer.mark_complete();
            done.store(true, Ordering::Release);
        });
    });

    assert_eq!(segment.sample_count(), TOTAL);
    assert_eq!(segment.min_max(), Some((0.0, (TOTAL - 1) as f32)));
    Ok(())
}

#[test]
fn compaction_interleaves_with_iterating_readers() -> Result<()> {
    let segment = Arc::new(Segment::builder(0).max_chunk_bytes(4096).build()?);
    let samples: Vec<f32> = (0..50_000).map(|value| value as f32).collect();
    segment.append(&samples)?;
    segment.mark_complete();

    thread::scope(|scope| {
        for reader in 0..READERS {
            let segment = Arc::clone(&segment);
            scope.spawn(move || {
                for round in 0..20u64 {
                    let start = (reader as u64 * 1_000 + round * 37) % 50_000;
                    let mut expected = start as f32;
                    for value in segment.iter(start).unwrap().take(500) {
                        assert_eq!(value, expected);
                        expected += 1.0;
                    }
                }
            });
        }

        let maintenance = Arc::clone(&segment);
        scope.spawn(move || {
            for _ in 0..50 {
                match maintenance.free_unused_memory() {
                    CompactionOutcome::Compacted { .. } | CompactionOutcome::Deferred => {}
                    CompactionOutcome::Skipped => panic!("segment is complete"),
                }
                thread::yield_now();
            }
        });
    });

    let stats = segment.stats();
    assert_eq!(stats.outstanding_iterators, 0);
    assert!(stats.compactions >= 1);
    assert_eq!(segment.samples(49_990..50_000)?, samples[49_990..].to_vec());
    Ok(())
}
