#![cfg(feature = "async")]

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tokio::runtime::Runtime;
use wavestore::Segment;

#[test]
fn watcher_sees_producer_progress() -> Result<()> {
    let segment = Arc::new(Segment::new(0, 1_000.0)?);
    let mut watcher = segment.watch();
    assert_eq!(watcher.current().sample_count, 0);

    let producer = Arc::clone(&segment);
    let handle = thread::spawn(move || -> wavestore::Result<()> {
        for batch in 0..10u32 {
            let samples: Vec<f32> = (batch * 100..(batch + 1) * 100)
                .map(|value| value as f32)
                .collect();
            producer.append(&samples)?;
        }
        producer.mark_complete();
        Ok(())
    });

    let rt = Runtime::new()?;
    rt.block_on(async {
        let progress = watcher
            .wait_for_samples(500)
            .await
            .expect("segment alive");
        assert!(progress.sample_count >= 500);

        let progress = watcher
            .wait_for_completion()
            .await
            .expect("segment alive");
        assert!(progress.complete);
        assert_eq!(progress.sample_count, 1_000);
        assert_eq!(progress.bounds, Some((0.0, 999.0)));
        Result::<()>::Ok(())
    })?;

    handle.join().expect("producer thread")?;
    Ok(())
}
