use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    audio::{AudioLoader, AudioSignal, AudioSink, AudioSource, AudioWriter, Resampler},
    config::Config,
    error::{MatchError, MatcherError, Result, Stage},
    features::{FeatureExtractor, TrackFeatures},
    matching::{Candidate, CompatibilityScorer, InfeasibleTrack, PoolRanker, RankedPool, SkippedTrack},
    sync::{BeatPhaseAligner, Mixer, TempoAligner},
};

/// The finished mashup
#[derive(Debug, Clone)]
pub struct MashupResult {
    /// Peak-normalized mix at the reference sample rate
    pub signal: AudioSignal,

    /// Pool track that was mixed in
    pub chosen: PathBuf,

    /// Composite score of the chosen track
    pub score: f32,

    /// `tempo_candidate / tempo_reference`, the stretch that was applied
    pub tempo_ratio: f64,

    pub report: MatchReport,
}

/// What the pool scan found, for display
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub reference: PathBuf,
    pub reference_bpm: f32,
    pub top: Vec<Candidate>,
    pub infeasible: Vec<InfeasibleTrack>,
    pub skipped: Vec<SkippedTrack>,
    pub output: PathBuf,
}

impl MatchReport {
    fn new(reference: &Path, reference_bpm: f32, ranked: &RankedPool, top_n: usize, output: &Path) -> Self {
        Self {
            reference: reference.to_path_buf(),
            reference_bpm,
            top: ranked.top(top_n).to_vec(),
            infeasible: ranked.infeasible().to_vec(),
            skipped: ranked.skipped().to_vec(),
            output: output.to_path_buf(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reference track: {}  |  BPM {:.1}", file_name(&self.reference), self.reference_bpm)?;

        writeln!(f)?;
        writeln!(f, "Top matches:")?;
        for (rank, candidate) in self.top.iter().enumerate() {
            writeln!(
                f,
                "{:>2}. {:30}  score={:.3}  BPM={:.1}",
                rank + 1, candidate.display_name(), candidate.score, candidate.tempo.bpm
            )?;
        }

        if !self.infeasible.is_empty() {
            writeln!(f)?;
            writeln!(f, "Outside stretch limit:")?;
            for track in &self.infeasible {
                writeln!(
                    f,
                    "    {:30}  BPM={:.1}  ({:.1}% away)",
                    file_name(&track.path), track.bpm, track.tempo_ratio * 100.0
                )?;
            }
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped:")?;
            for track in &self.skipped {
                writeln!(f, "    {:30}  {}", file_name(&track.path), track.reason)?;
            }
        }

        if let Some(chosen) = self.top.first() {
            writeln!(f)?;
            writeln!(f, "Chosen track: {}  (score {:.3})", chosen.display_name(), chosen.score)?;
        }

        Ok(())
    }
}

/// Runs the whole matching and mashup pipeline
///
/// The engine follows a fixed sequence of steps:
/// 1. Reference Analysis - decode the reference and extract its features
/// 2. Pool Scan - score every other track and rank the feasible ones
/// 3. Tempo Alignment - stretch the winner to the reference tempo
/// 4. Phase Alignment - shift it so the first beats coincide
/// 5. Mixing & Export - sum, normalize and write the result
///
/// Failures in steps 1 and 3-5 abort the run and name the stage and file.
/// Failures of individual pool tracks in step 2 only skip that track.
#[derive(Clone)]
pub struct MashupEngine {
    config: Config,
    source: Arc<dyn AudioSource>,
    sink: Arc<dyn AudioSink>,
}

impl MashupEngine {
    /// Engine reading and writing audio files on disk
    pub fn new(config: Config) -> Self {
        Self::with_io(config, Arc::new(AudioLoader::new()), Arc::new(AudioWriter::new()))
    }

    /// Engine with custom audio input and output
    pub fn with_io(config: Config, source: Arc<dyn AudioSource>, sink: Arc<dyn AudioSink>) -> Self {
        Self { config, source, sink }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline on tokio's blocking pool
    pub async fn run(&self) -> Result<MashupResult> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.run_blocking())
            .await
            .map_err(|e| MatcherError::generic(format!("Pipeline task failed: {}", e)))?
    }

    /// Run the pipeline on the current thread
    ///
    /// The configuration is validated first, so a bad value fails with a
    /// `ConfigError` before any audio is read.
    pub fn run_blocking(&self) -> Result<MashupResult> {
        self.config.validate()?;

        let reference_path = self.config.track_a.as_path();
        let output_path = self.config.out_path.as_path();

        info!("🎧 Starting track matching");
        info!("   Reference: {:?}", reference_path);
        info!("   Pool: {:?}", self.config.pool_dir);
        info!("   Output: {:?}", output_path);

        let extractor = FeatureExtractor::new(self.config.features.clone());

        // Pipeline Step 1: Reference Analysis
        let (reference_signal, reference) = self.analyze_reference(&extractor, reference_path)?;

        // Pipeline Step 2: Pool Scan
        let ranked = self.scan_pool(&extractor, &reference, reference_path)?;
        let report = MatchReport::new(
            reference_path,
            reference.tempo.bpm,
            &ranked,
            self.config.matching.top_n,
            output_path,
        );
        let chosen = ranked.best().clone();
        info!("🏆 Chosen: {} (score {:.3})", chosen.display_name(), chosen.score);

        // Pipeline Step 3: Tempo Alignment
        let tempo_ratio = chosen.tempo.bpm as f64 / reference.tempo.bpm as f64;
        let stretched = self
            .align_tempo(&chosen.path, reference_signal.sample_rate(), tempo_ratio)
            .map_err(|e| e.at_stage(Stage::TempoAlignment, chosen.path.display().to_string()))?;

        // Pipeline Step 4: Phase Alignment
        let aligned = self
            .align_phase(&extractor, &stretched, &reference)
            .map_err(|e| e.at_stage(Stage::PhaseAlignment, chosen.path.display().to_string()))?;

        // Pipeline Step 5: Mixing & Export
        let mix = Mixer::new()
            .mix(&reference_signal, &aligned)
            .map_err(|e| e.at_stage(Stage::Mixing, output_path.display().to_string()))?;

        self.sink
            .write(output_path, &mix)
            .map_err(|e| e.at_stage(Stage::Export, output_path.display().to_string()))?;

        info!("✅ Exported synced mix: {:?} ({:.1}s)", output_path, mix.duration());

        Ok(MashupResult {
            signal: mix,
            chosen: chosen.path,
            score: chosen.score,
            tempo_ratio,
            report,
        })
    }

    // ==========================================
    // PIPELINE STEP 1: REFERENCE ANALYSIS
    // ==========================================

    fn analyze_reference(
        &self,
        extractor: &FeatureExtractor,
        path: &Path,
    ) -> Result<(AudioSignal, TrackFeatures)> {
        info!("🎵 Step 1: Analyzing reference track...");

        let wrap = |e: MatcherError| e.at_stage(Stage::ReferenceAnalysis, path.display().to_string());
        let signal = self.source.load(path).map_err(wrap)?;
        let features = extractor.extract(&signal).map_err(wrap)?;

        info!(
            "   Loaded: {:.1}s at {} Hz, {:.1} BPM, {} beats",
            signal.duration(), signal.sample_rate(), features.tempo.bpm, features.tempo.beats.len()
        );

        Ok((signal, features))
    }

    // ==========================================
    // PIPELINE STEP 2: POOL SCAN
    // ==========================================

    fn scan_pool(&self, extractor: &FeatureExtractor, reference: &TrackFeatures, reference_path: &Path) -> Result<RankedPool> {
        info!("🔍 Step 2: Scanning pool...");

        let pool_dir = self.config.pool_dir.as_path();
        let wrap = |e: MatcherError| e.at_stage(Stage::PoolScan, pool_dir.display().to_string());

        let paths = list_pool(pool_dir, reference_path).map_err(wrap)?;
        let matching = &self.config.matching;
        let scorer = CompatibilityScorer::new(matching.weights, matching.max_stretch);

        let mut ranker = PoolRanker::new(extractor, scorer);
        if matching.parallel_scan {
            ranker = ranker.with_parallel_scan(matching.scan_threads);
        }

        let ranked = ranker.rank(self.source.as_ref(), reference, &paths).map_err(wrap)?;
        info!(
            "   {} feasible, {} outside stretch limit, {} skipped",
            ranked.len(), ranked.infeasible().len(), ranked.skipped().len()
        );

        Ok(ranked)
    }

    // ==========================================
    // PIPELINE STEP 3: TEMPO ALIGNMENT
    // ==========================================

    fn align_tempo(&self, path: &Path, reference_rate: u32, tempo_ratio: f64) -> Result<AudioSignal> {
        info!("⏱️  Step 3: Stretching by {:.4}...", tempo_ratio);

        let signal = self.source.load(path)?;
        let signal = if signal.sample_rate() != reference_rate {
            debug!("Resampling {} Hz -> {} Hz", signal.sample_rate(), reference_rate);
            Resampler::resample(&signal, reference_rate)?
        } else {
            signal
        };

        TempoAligner::new(&self.config.stretch).stretch(&signal, tempo_ratio)
    }

    // ==========================================
    // PIPELINE STEP 4: PHASE ALIGNMENT
    // ==========================================

    fn align_phase(
        &self,
        extractor: &FeatureExtractor,
        stretched: &AudioSignal,
        reference: &TrackFeatures,
    ) -> Result<AudioSignal> {
        info!("🥁 Step 4: Aligning first beats...");

        // Beats are re-detected because stretching moved them
        let beats = extractor.tempo(stretched)?.beats;
        debug!(
            "First beats: candidate {:?}, reference {:?}",
            beats.first(), reference.tempo.first_beat()
        );

        BeatPhaseAligner::new().align(stretched, &beats, &reference.tempo.beats, stretched.sample_rate())
    }
}

/// Candidate files in a pool directory, in file-name order
///
/// Hidden files, subdirectories and the reference itself are left out.
pub fn list_pool(pool_dir: &Path, reference: &Path) -> Result<Vec<PathBuf>> {
    if !pool_dir.is_dir() {
        return Err(MatchError::PoolNotFound { path: pool_dir.display().to_string() }.into());
    }

    let reference = reference.canonicalize().unwrap_or_else(|_| reference.to_path_buf());
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(pool_dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map_or(true, |name| name.to_string_lossy().starts_with('.'));
        if hidden || !path.is_file() {
            continue;
        }

        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if canonical == reference {
            continue;
        }
        paths.push(path);
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} candidate file(s) in {:?}", paths.len(), pool_dir);
    Ok(paths)
}
