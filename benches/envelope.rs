use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use wavestore::Segment;

const TOTAL_SAMPLES: u64 = 1 << 22;

fn filled_segment() -> Segment {
    let segment = Segment::new(0, 1.0e6).expect("segment");
    let data: Vec<f32> = (0..TOTAL_SAMPLES)
        .map(|idx| (idx as f32 * 0.001).sin())
        .collect();
    for chunk in data.chunks(1 << 16) {
        segment.append(chunk).expect("append");
    }
    segment.mark_complete();
    segment.free_unused_memory();
    segment
}

fn bench_envelope(c: &mut Criterion) {
    let segment = filled_segment();

    // Typical plot widths: samples per pixel for a full-range view at 2k pixels and zoomed in.
    let mut group = c.benchmark_group("envelope_section");
    for resolution in [20.0f32, 300.0, 2048.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(resolution),
            &resolution,
            |b, &resolution| {
                b.iter(|| {
                    let section = segment
                        .envelope_section(0..TOTAL_SAMPLES, resolution)
                        .expect("query");
                    std::hint::black_box(section.len())
                });
            },
        );
    }
    group.finish();

    c.bench_function("sample_iterator_scan", |b| {
        b.iter(|| {
            let sum: f32 = segment.iter(0).expect("iterator").take(1 << 16).sum();
            std::hint::black_box(sum)
        });
    });
}

criterion_group!(benches, bench_envelope);
criterion_main!(benches);
