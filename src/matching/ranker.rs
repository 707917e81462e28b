use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::audio::AudioSource;
use crate::error::{MatchError, MatcherError, Result};
use crate::features::{FeatureExtractor, TempoEstimate, TrackFeatures};

use super::scorer::{CompatibilityScorer, ScoreBreakdown, ScoreOutcome};

/// A feasible pool track and how it scored
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: PathBuf,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub tempo: TempoEstimate,
}

impl Candidate {
    /// File name for reports, falling back to the full path
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// What happened to one pool track during the scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Scored(Candidate),

    /// Tempo too far from the reference
    Infeasible { path: PathBuf, bpm: f32, tempo_ratio: f32 },

    /// Could not be decoded or compared
    Skipped { path: PathBuf, reason: String },
}

/// A pool track left out of the ranking because it failed
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTrack {
    pub path: PathBuf,
    pub reason: String,
}

/// A pool track left out of the ranking because of its tempo
#[derive(Debug, Clone, PartialEq)]
pub struct InfeasibleTrack {
    pub path: PathBuf,
    pub bpm: f32,
    pub tempo_ratio: f32,
}

/// Feasible candidates, best first
///
/// Never empty: a scan with no feasible candidate is an error instead.
#[derive(Debug, Clone)]
pub struct RankedPool {
    candidates: Vec<Candidate>,
    infeasible: Vec<InfeasibleTrack>,
    skipped: Vec<SkippedTrack>,
}

impl RankedPool {
    /// Collect scan outcomes, given in input order, into a ranking
    ///
    /// Ties keep input order.
    pub fn from_outcomes(outcomes: Vec<ScanOutcome>, max_stretch: f32) -> Result<Self> {
        let scanned = outcomes.len();
        let mut candidates = Vec::new();
        let mut infeasible = Vec::new();
        let mut skipped = Vec::new();

        for outcome in outcomes {
            match outcome {
                ScanOutcome::Scored(candidate) => candidates.push(candidate),
                ScanOutcome::Infeasible { path, bpm, tempo_ratio } => {
                    infeasible.push(InfeasibleTrack { path, bpm, tempo_ratio })
                }
                ScanOutcome::Skipped { path, reason } => skipped.push(SkippedTrack { path, reason }),
            }
        }

        if candidates.is_empty() {
            return Err(MatchError::NoCompatibleTrack { max_stretch, scanned }.into());
        }

        // sort_by is stable, so equal scores stay in scan order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(Self { candidates, infeasible, skipped })
    }

    /// Highest-scoring candidate
    pub fn best(&self) -> &Candidate {
        &self.candidates[0]
    }

    /// Up to `k` best candidates
    pub fn top(&self, k: usize) -> &[Candidate] {
        &self.candidates[..k.min(self.candidates.len())]
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn infeasible(&self) -> &[InfeasibleTrack] {
        &self.infeasible
    }

    pub fn skipped(&self) -> &[SkippedTrack] {
        &self.skipped
    }
}

/// Scores a pool of tracks against a fixed reference
pub struct PoolRanker<'a> {
    extractor: &'a FeatureExtractor,
    scorer: CompatibilityScorer,
    scan_threads: Option<usize>,
}

impl<'a> PoolRanker<'a> {
    /// Sequential ranker
    pub fn new(extractor: &'a FeatureExtractor, scorer: CompatibilityScorer) -> Self {
        Self {
            extractor,
            scorer,
            scan_threads: None,
        }
    }

    /// Scan candidates on a thread pool of `threads` workers
    pub fn with_parallel_scan(mut self, threads: usize) -> Self {
        self.scan_threads = Some(threads.max(1));
        self
    }

    /// Rank every path against the reference features
    ///
    /// Per-track failures are logged and recorded as skipped; only an empty
    /// ranking fails the whole scan.
    pub fn rank(
        &self,
        source: &dyn AudioSource,
        reference: &TrackFeatures,
        paths: &[PathBuf],
    ) -> Result<RankedPool> {
        info!("Scanning {} candidate(s)", paths.len());

        let outcomes = match self.scan_threads {
            Some(threads) => self.scan_parallel(source, reference, paths, threads)?,
            None => paths
                .iter()
                .map(|path| self.scan_one(source, reference, path))
                .collect(),
        };

        let ranked = RankedPool::from_outcomes(outcomes, self.scorer.max_stretch())?;
        debug!(
            "Ranked {} feasible, {} infeasible, {} skipped",
            ranked.len(), ranked.infeasible().len(), ranked.skipped().len()
        );
        Ok(ranked)
    }

    fn scan_parallel(
        &self,
        source: &dyn AudioSource,
        reference: &TrackFeatures,
        paths: &[PathBuf],
        threads: usize,
    ) -> Result<Vec<ScanOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| MatcherError::generic(format!("Failed to build scan thread pool: {}", e)))?;

        let mut indexed: Vec<(usize, ScanOutcome)> = pool.install(|| {
            paths
                .par_iter()
                .enumerate()
                .map(|(idx, path)| (idx, self.scan_one(source, reference, path)))
                .collect()
        });

        // Restore input order before ranking
        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, outcome)| outcome).collect())
    }

    fn scan_one(&self, source: &dyn AudioSource, reference: &TrackFeatures, path: &Path) -> ScanOutcome {
        match self.evaluate(source, reference, path) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_recoverable() {
                    warn!("Skipping {}: {}", display_name(path), e);
                } else {
                    error!("Skipping {} after unexpected error: {}", display_name(path), e);
                }
                ScanOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn evaluate(&self, source: &dyn AudioSource, reference: &TrackFeatures, path: &Path) -> Result<ScanOutcome> {
        let signal = source.load(path)?;
        let features = self.extractor.extract(&signal)?;

        let outcome = match self.scorer.score(reference, &features)? {
            ScoreOutcome::Feasible(breakdown) => {
                debug!(
                    "{}: {:.1} BPM, score {:.3} (timbre {:.3}, harmony {:.3}, ratio {:.3})",
                    display_name(path), features.tempo.bpm, breakdown.composite,
                    breakdown.timbre, breakdown.harmony, breakdown.tempo_ratio
                );
                ScanOutcome::Scored(Candidate {
                    path: path.to_path_buf(),
                    score: breakdown.composite,
                    breakdown,
                    tempo: features.tempo,
                })
            }
            ScoreOutcome::Infeasible { tempo_ratio } => {
                debug!(
                    "{}: {:.1} BPM needs {:.1}% stretch, excluded",
                    display_name(path), features.tempo.bpm, tempo_ratio * 100.0
                );
                ScanOutcome::Infeasible {
                    path: path.to_path_buf(),
                    bpm: features.tempo.bpm,
                    tempo_ratio,
                }
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::audio::AudioSignal;
    use crate::config::{FeatureConfig, ScoreWeights};
    use crate::error::AudioError;

    fn scored(name: &str, score: f32) -> ScanOutcome {
        ScanOutcome::Scored(Candidate {
            path: PathBuf::from(name),
            score,
            breakdown: ScoreBreakdown {
                timbre: score,
                harmony: score,
                tempo_ratio: 0.0,
                composite: score,
            },
            tempo: TempoEstimate { bpm: 120.0, beats: vec![0.5] },
        })
    }

    fn names(candidates: &[Candidate]) -> Vec<String> {
        candidates.iter().map(|c| c.display_name()).collect()
    }

    #[test]
    fn test_ranking_orders_by_score() {
        let outcomes = vec![
            scored("b.wav", 0.74),
            ScanOutcome::Infeasible { path: PathBuf::from("c.wav"), bpm: 150.0, tempo_ratio: 0.25 },
            scored("a.wav", 0.81),
        ];

        let ranked = RankedPool::from_outcomes(outcomes, 0.15).unwrap();
        assert_eq!(names(ranked.top(5)), vec!["a.wav", "b.wav"]);
        assert_eq!(ranked.best().display_name(), "a.wav");
        assert_eq!(ranked.infeasible().len(), 1);
        assert_eq!(ranked.top(1).len(), 1);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let outcomes = vec![
            scored("first.wav", 0.5),
            scored("top.wav", 0.9),
            scored("second.wav", 0.5),
            scored("third.wav", 0.5),
        ];

        let ranked = RankedPool::from_outcomes(outcomes, 0.15).unwrap();
        assert_eq!(
            names(ranked.candidates()),
            vec!["top.wav", "first.wav", "second.wav", "third.wav"]
        );
    }

    #[test]
    fn test_no_feasible_candidate_is_an_error() {
        let outcomes = vec![
            ScanOutcome::Infeasible { path: PathBuf::from("a.wav"), bpm: 60.0, tempo_ratio: 0.5 },
            ScanOutcome::Skipped { path: PathBuf::from("b.mp3"), reason: "corrupt".to_string() },
        ];

        match RankedPool::from_outcomes(outcomes, 0.15) {
            Err(MatcherError::Match(MatchError::NoCompatibleTrack { scanned, .. })) => assert_eq!(scanned, 2),
            other => panic!("expected NoCompatibleTrack, got {:?}", other),
        }
    }

    /// Serves synthetic signals by file name
    struct MemorySource {
        tracks: HashMap<PathBuf, AudioSignal>,
    }

    impl AudioSource for MemorySource {
        fn load(&self, path: &Path) -> Result<AudioSignal> {
            self.tracks.get(path).cloned().ok_or_else(|| {
                AudioError::LoadFailed { path: path.display().to_string() }.into()
            })
        }
    }

    fn click_track(bpm: f64, click_hz: f64) -> AudioSignal {
        let sample_rate = 22050u32;
        let len = sample_rate as usize * 8;
        let mut samples = vec![0.0f32; len];
        let period = (60.0 / bpm * sample_rate as f64) as usize;
        for start in (sample_rate as usize / 4..len).step_by(period) {
            for i in 0..600.min(len - start) {
                let t = i as f64 / sample_rate as f64;
                samples[start + i] = ((2.0 * std::f64::consts::PI * click_hz * t).sin() * (-t * 200.0).exp()) as f32;
            }
        }
        AudioSignal::new(samples, sample_rate)
    }

    #[test]
    fn test_scan_skips_failures_and_matches_sequential_order() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let reference_signal = click_track(120.0, 1000.0);
        let reference = extractor.extract(&reference_signal).unwrap();

        let mut tracks = HashMap::new();
        tracks.insert(PathBuf::from("close.wav"), click_track(120.0, 1000.0));
        tracks.insert(PathBuf::from("bright.wav"), click_track(120.0, 3000.0));
        tracks.insert(PathBuf::from("silent.wav"), AudioSignal::silence(22050, 22050));
        let source = MemorySource { tracks };

        let paths: Vec<PathBuf> = ["bright.wav", "missing.wav", "close.wav", "silent.wav"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let scorer = CompatibilityScorer::new(ScoreWeights::default(), 0.15);
        let sequential = PoolRanker::new(&extractor, scorer).rank(&source, &reference, &paths).unwrap();
        let parallel = PoolRanker::new(&extractor, scorer)
            .with_parallel_scan(3)
            .rank(&source, &reference, &paths)
            .unwrap();

        assert_eq!(sequential.candidates(), parallel.candidates());
        assert_eq!(sequential.best().display_name(), "close.wav");
        assert_eq!(sequential.len() + sequential.infeasible().len(), 2);

        let skipped: Vec<String> = sequential.skipped().iter().map(|s| display_name(&s.path)).collect();
        assert_eq!(skipped, vec!["missing.wav", "silent.wav"]);
    }
}
