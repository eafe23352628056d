//! Throughput of the stateful filter stage and the analysis passes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hrv_processing::{
    find_peaks, AnalysisConfig, BeatHistory, FilterStage, PeakCriteria, VariabilityAnalyzer,
};
use hrv_simulation::{BeatPattern, EcgConfig, EcgSimulator};

fn simulated_signal(seconds: f64) -> Vec<f64> {
    let config = EcgConfig {
        seed: Some(1),
        ..EcgConfig::default()
    };
    EcgSimulator::new(config).unwrap().generate(seconds)
}

/// Benchmark chunked filtering at typical acquisition chunk sizes
fn bench_filter_stage(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_stage");
    let config = AnalysisConfig::default();
    let signal = simulated_signal(10.0);

    for &chunk in &[16usize, 128, 1024] {
        group.bench_with_input(BenchmarkId::new("apply", chunk), &chunk, |b, &chunk| {
            let mut stage = FilterStage::new(config.filters.clone(), config.sampling_rate).unwrap();
            b.iter(|| {
                for piece in signal.chunks(chunk) {
                    black_box(stage.apply(black_box(piece)));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark peak finding over a full sample window
fn bench_peak_finding(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let mut stage = FilterStage::new(config.filters.clone(), config.sampling_rate).unwrap();
    let filtered = stage.apply(&simulated_signal(config.window_seconds));
    let criteria = PeakCriteria::from(&config.detection);

    c.bench_function("find_peaks_window", |b| {
        b.iter(|| black_box(find_peaks(black_box(&filtered), &criteria)));
    });
}

/// Benchmark the variability spectrum on a full beat history
fn bench_variability(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let pattern = BeatPattern::Respiratory {
        mean_bpm: 65.0,
        depth_bpm: 8.0,
        breath_hz: 0.1,
    };
    let beats: Vec<hrv_core::Beat> = pattern
        .beat_times(1.0, 400.0)
        .into_iter()
        .map(|time| hrv_core::Beat {
            time,
            prominence: 1500.0,
        })
        .collect();
    let mut history = BeatHistory::from_config(&config.detection);
    history.record(&beats);
    let (times, intervals) = history.aligned_intervals();

    let mut analyzer = VariabilityAnalyzer::new(config.variability.clone()).unwrap();
    c.bench_function("variability_spectrum", |b| {
        b.iter(|| black_box(analyzer.analyze(&times, &intervals, config.sampling_rate)));
    });
}

criterion_group!(benches, bench_filter_stage, bench_peak_finding, bench_variability);
criterion_main!(benches);
