//! Simplification and playback throughput.
//!
//! Measures Douglas-Peucker per zoom tier on noisy recorded-looking tracks,
//! pass detection against a station catalog, and the per-frame cost of a
//! real-time tick.
//!
//! Run with: `cargo bench --bench simplify`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use route_playback::{
    detect_passes, douglas_peucker, Journey, PlaybackClock, PlaybackConfig, ProximityConfig,
    Station, TrajectoryPoint, ZoomTierTable,
};

/// Wandering track with small deterministic jitter, one sample per second.
fn synthetic_track(count: usize) -> Vec<TrajectoryPoint> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            let jitter = ((i * 7919) % 13) as f64 * 0.000003;
            TrajectoryPoint::new(
                t,
                48.1 + 0.002 * (t * 0.01).sin() + jitter,
                11.5 + t * 0.0001,
            )
        })
        .collect()
}

fn bench_douglas_peucker(c: &mut Criterion) {
    let mut group = c.benchmark_group("douglas_peucker");
    let tiers = ZoomTierTable::default();

    for count in [1_000, 5_000, 20_000] {
        let coords: Vec<_> = synthetic_track(count).iter().map(|p| p.coordinate()).collect();
        group.throughput(Throughput::Elements(count as u64));

        for (ordinal, tier) in tiers.entries().iter().enumerate() {
            group.bench_with_input(
                BenchmarkId::new(format!("tier_{}", ordinal), count),
                &coords,
                |b, coords| b.iter(|| douglas_peucker(black_box(coords), tier.epsilon)),
            );
        }
    }

    group.finish();
}

fn bench_detect_passes(c: &mut Criterion) {
    let trajectory = synthetic_track(10_000);
    let stations: Vec<Station> = (0..50)
        .map(|i| {
            Station::new(
                &format!("s{}", i),
                &format!("Station {}", i),
                48.1,
                11.5 + i as f64 * 0.02,
            )
        })
        .collect();
    let config = ProximityConfig::default();

    c.bench_function("detect_passes_10k_50_stations", |b| {
        b.iter(|| detect_passes(black_box(&trajectory), black_box(&stations), &config))
    });
}

fn bench_tick(c: &mut Criterion) {
    let journey = Journey::new(synthetic_track(10_000));
    let config = PlaybackConfig {
        duration: 1.0e9,
        ..PlaybackConfig::default()
    };
    let Ok(mut clock) = PlaybackClock::new(journey, config) else {
        return;
    };
    let Some(handle) = clock.start() else {
        return;
    };

    c.bench_function("tick_60hz", |b| {
        b.iter(|| clock.tick(handle, black_box(1.0 / 60.0)))
    });
}

criterion_group!(benches, bench_douglas_peucker, bench_detect_passes, bench_tick);
criterion_main!(benches);
