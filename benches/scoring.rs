//! Performance benchmarks for feature extraction and pool scoring

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use track_matcher::{
    audio::AudioSignal,
    config::{FeatureConfig, ScoreWeights, StretchConfig},
    features::{FeatureExtractor, TempoEstimate, TrackFeatures},
    matching::CompatibilityScorer,
    sync::TempoAligner,
};

fn noisy_clicks(seconds: usize, sample_rate: u32) -> AudioSignal {
    let mut rng = SmallRng::seed_from_u64(7);
    let period = sample_rate as usize / 2;
    let samples = (0..seconds * sample_rate as usize)
        .map(|i| {
            let click = if i % period < 400 { (i % 50) as f32 / 50.0 - 0.5 } else { 0.0 };
            click + rng.gen_range(-0.01..0.01)
        })
        .collect();
    AudioSignal::new(samples, sample_rate)
}

fn random_features(rng: &mut SmallRng) -> TrackFeatures {
    TrackFeatures {
        timbre: (0..13).map(|_| rng.gen_range(-50.0..50.0)).collect(),
        harmony: (0..12).map(|_| rng.gen_range(0.0..1.0)).collect(),
        tempo: TempoEstimate {
            bpm: rng.gen_range(100.0..140.0),
            beats: Vec::new(),
        },
    }
}

fn bench_extract_features(c: &mut Criterion) {
    let signal = noisy_clicks(30, 22050);
    let extractor = FeatureExtractor::new(FeatureConfig::default());

    c.bench_function("extract_features_30s", |b| {
        b.iter(|| {
            let _ = extractor.extract(black_box(&signal));
        });
    });
}

fn bench_score_pool(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(42);
    let reference = random_features(&mut rng);
    let pool: Vec<TrackFeatures> = (0..1000).map(|_| random_features(&mut rng)).collect();
    let scorer = CompatibilityScorer::new(ScoreWeights::default(), 0.15);

    c.bench_function("score_1000_candidates", |b| {
        b.iter(|| {
            for candidate in &pool {
                let _ = scorer.score(black_box(&reference), black_box(candidate));
            }
        });
    });
}

fn bench_time_stretch(c: &mut Criterion) {
    let signal = noisy_clicks(10, 22050);
    let aligner = TempoAligner::new(&StretchConfig::default());

    c.bench_function("stretch_10s", |b| {
        b.iter(|| {
            let _ = aligner.stretch(black_box(&signal), black_box(1.0417));
        });
    });
}

criterion_group!(benches, bench_extract_features, bench_score_pool, bench_time_stretch);
criterion_main!(benches);
