use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{Result, VadError};
use crate::features::store::{FeaturesWriter, VideoKey};
use crate::models::base_model::FeatureExtractor;
use crate::utils::worker_pool;

/// One sampled clip waiting for extraction.
pub struct ClipRequest<C> {
    pub key: VideoKey,
    pub start_frame: u64,
    pub clip: C,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedVideo {
    pub key: VideoKey,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionSummary {
    pub videos_written: usize,
    pub clips_written: usize,
    /// Clips that arrived after their video was already written.
    pub ignored_clips: usize,
    pub skipped: Vec<SkippedVideo>,
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub batch_size: usize,
    /// Worker threads for the extractor; `None` uses one per CPU.
    pub threads: Option<usize>,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        ExtractionOptions {
            batch_size: 1,
            threads: None,
        }
    }
}

/// Serialises clip features from any number of producers into one
/// `FeaturesWriter`, isolating per-video failures.
///
/// A video whose extraction or flush fails is logged, its buffered clips are
/// dropped and its remaining clips are ignored; other videos carry on.
pub struct FeatureSink {
    writer: FeaturesWriter,
    failed: HashSet<VideoKey>,
    summary: ExtractionSummary,
}

impl FeatureSink {
    pub fn new(writer: FeaturesWriter) -> Self {
        FeatureSink {
            writer,
            failed: HashSet::new(),
            summary: ExtractionSummary::default(),
        }
    }

    /// Accept the extraction outcome for one clip.
    pub fn accept(&mut self, key: &VideoKey, start_frame: u64, outcome: Result<Vec<f32>>) {
        if self.failed.contains(key) {
            return;
        }
        if self.writer.was_written(key) {
            // The video's file is already complete; only this clip is lost.
            warn!(video = %key, start_frame, "ignoring clip for a video already written");
            self.summary.ignored_clips += 1;
            return;
        }

        let switching = self.writer.current().is_some_and(|current| current != key);
        if switching {
            self.flush_current();
        }

        let result = outcome.and_then(|feature| self.writer.write(feature, key, start_frame));
        if let Err(err) = result {
            if self.writer.current() == Some(key) {
                self.writer.discard();
            }
            self.skip(key.clone(), err);
        }
    }

    /// Flush the last video and return the run summary.
    pub fn finish(mut self) -> ExtractionSummary {
        self.flush_current();
        let mut summary = std::mem::take(&mut self.summary);
        summary.videos_written = self.writer.videos_written();
        info!(
            videos = summary.videos_written,
            clips = summary.clips_written,
            ignored = summary.ignored_clips,
            skipped = summary.skipped.len(),
            "feature extraction finished"
        );
        summary
    }

    fn flush_current(&mut self) {
        let Some(current) = self.writer.current().cloned() else {
            return;
        };
        let buffered = self.writer.pending_len();
        match self.writer.flush() {
            Ok(()) => self.summary.clips_written += buffered,
            Err(err) => self.skip(current, err),
        }
    }

    fn skip(&mut self, key: VideoKey, err: VadError) {
        warn!(video = %key, error = %err, "skipping video");
        self.failed.insert(key.clone());
        self.summary.skipped.push(SkippedVideo {
            key,
            reason: err.to_string(),
        });
    }
}

/// Drain a stream of per-clip extraction outcomes through one `FeatureSink`.
///
/// Each item is `(video, start_frame, feature)`. Clips of one video must be
/// contiguous; the last video is flushed when the stream ends.
pub fn ingest_clip_features<I>(clips: I, writer: FeaturesWriter) -> ExtractionSummary
where
    I: IntoIterator<Item = (VideoKey, u64, Result<Vec<f32>>)>,
{
    let mut sink = FeatureSink::new(writer);
    for (key, start_frame, outcome) in clips {
        sink.accept(&key, start_frame, outcome);
    }
    sink.finish()
}

/// Extract every clip and persist each video's segments.
///
/// Clips are grouped into batches of `options.batch_size`; each batch runs
/// through `extract_batch` on a dedicated worker pool, then its features are
/// written in input order through a single `FeatureSink`. Clips of one video
/// must be contiguous in `clips`.
pub fn extract_features<E, I>(
    extractor: &E,
    clips: I,
    writer: FeaturesWriter,
    options: &ExtractionOptions,
) -> Result<ExtractionSummary>
where
    E: FeatureExtractor,
    I: IntoIterator<Item = ClipRequest<E::Clip>>,
{
    let pool = worker_pool(options.threads)?;
    let batch_size = options.batch_size.max(1);
    let mut sink = FeatureSink::new(writer);

    let mut keys = Vec::with_capacity(batch_size);
    let mut batch = Vec::with_capacity(batch_size);
    let mut clips = clips.into_iter().peekable();
    while let Some(request) = clips.next() {
        keys.push((request.key, request.start_frame));
        batch.push(request.clip);
        if batch.len() < batch_size && clips.peek().is_some() {
            continue;
        }

        let outputs = pool.install(|| extractor.extract_batch(&batch));
        if outputs.len() != batch.len() {
            return Err(VadError::Extractor(format!(
                "batch of {} clips produced {} features",
                batch.len(),
                outputs.len()
            )));
        }
        for ((key, start_frame), outcome) in keys.drain(..).zip(outputs) {
            sink.accept(&key, start_frame, outcome);
        }
        batch.clear();
    }

    Ok(sink.finish())
}
