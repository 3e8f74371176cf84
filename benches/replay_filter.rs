//! Benchmarks for recomputing the visible event set during playback

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sessiontap::event::{ConsoleEvent, ConsoleLevel, Event};
use sessiontap::replay::{visible_at, ReplayCorrelator};

fn timeline(len: u64) -> Vec<Event> {
    (0..len)
        .map(|i| {
            Event::Console(ConsoleEvent {
                level: ConsoleLevel::Log,
                message: format!("\"event {i}\""),
                timestamp: i * 25,
            })
        })
        .collect()
}

fn bench_visible_at(c: &mut Criterion) {
    let mut group = c.benchmark_group("visible_at");
    for len in [100u64, 1_000, 10_000] {
        let events = timeline(len);
        let midpoint = (len * 25) as f64 / 2000.0;
        group.bench_with_input(BenchmarkId::from_parameter(len), &events, |b, events| {
            b.iter(|| visible_at(black_box(events), black_box(midpoint)));
        });
    }
    group.finish();
}

fn bench_scrub(c: &mut Criterion) {
    let mut replay = ReplayCorrelator::default();
    let _ = replay.load(None, timeline(5_000));
    replay.set_duration(125.0);

    c.bench_function("scrub_back_and_forth", |b| {
        let mut step = 0u32;
        b.iter(|| {
            step = step.wrapping_add(1);
            let fraction = f64::from(step % 100) / 100.0;
            replay.seek_fraction(black_box(fraction));
            black_box(replay.view().visible_events.len())
        });
    });
}

criterion_group!(benches, bench_visible_at, bench_scrub);
criterion_main!(benches);
