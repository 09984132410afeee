use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::features::read_features;
use crate::models::base_model::AnomalyScorer;
use crate::utils::evaluation::{RocAccumulator, RocCurve, ThresholdMetrics};
use crate::utils::ground_truth::EvaluationVideo;
use crate::utils::realign::{expand_labels, expand_scores};
use crate::utils::worker_pool;

#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Worker threads for loading and scoring; `None` uses one per CPU.
    pub threads: Option<usize>,
    /// Operating point reported alongside the ROC curve.
    pub threshold: f64,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        EvaluationOptions {
            threads: None,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub videos: usize,
    pub frames: usize,
    pub threshold: f64,
    pub threshold_metrics: ThresholdMetrics,
    pub roc: RocCurve,
}

/// Per-frame `(predicted, actual)` vectors for one video.
pub fn realign_video<S: AnomalyScorer>(
    scorer: &S,
    video: &EvaluationVideo,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let segments = read_features(&video.key)?;
    let scores = scorer.score(&video.key, &segments)?;
    let predicted = expand_scores(&scores, video.frame_count)?;
    let actual = expand_labels(&video.intervals, video.frame_count)?;
    Ok((predicted, actual))
}

/// Realign every video on the worker pool, then merge in input order.
///
/// The first failing video (in input order) aborts the merge.
pub fn accumulate_videos<S: AnomalyScorer>(
    scorer: &S,
    videos: &[EvaluationVideo],
    options: &EvaluationOptions,
) -> Result<RocAccumulator> {
    let pool = worker_pool(options.threads)?;
    let realigned: Vec<Result<(Vec<f64>, Vec<f64>)>> = pool.install(|| {
        videos
            .par_iter()
            .map(|video| realign_video(scorer, video))
            .collect()
    });

    let mut accumulator = RocAccumulator::new();
    for (video, frames) in videos.iter().zip(realigned) {
        let (predicted, actual) = frames?;
        accumulator.accumulate(&predicted, &actual)?;
        debug!(video = %video.key, frames = video.frame_count, "accumulated video");
    }
    Ok(accumulator)
}

/// Score, realign and merge every video, then compute the ROC curve.
pub fn evaluate<S: AnomalyScorer>(
    scorer: &S,
    videos: &[EvaluationVideo],
    options: &EvaluationOptions,
) -> Result<EvaluationReport> {
    let accumulator = accumulate_videos(scorer, videos, options)?;
    let roc = accumulator.compute_roc()?;
    let threshold_metrics = accumulator.threshold_metrics(options.threshold);
    info!(
        videos = accumulator.videos(),
        frames = accumulator.len(),
        auc = roc.auc,
        "evaluation finished"
    );
    Ok(EvaluationReport {
        videos: accumulator.videos(),
        frames: accumulator.len(),
        threshold: options.threshold,
        threshold_metrics,
        roc,
    })
}
