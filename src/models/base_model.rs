use rayon::prelude::*;

use crate::error::Result;
use crate::features::{SegmentedRepresentation, VideoKey};

/// A 3D CNN backbone seen from the outside: one clip in, one feature vector out.
///
/// Implementations must be deterministic for fixed weights and input. `Sync` is
/// required because a batch of clips is extracted on the rayon pool.
pub trait FeatureExtractor: Sync {
    type Clip: Sync;

    /// Extract the feature vector for one sampled clip.
    fn extract(&self, clip: &Self::Clip) -> Result<Vec<f32>>;

    /// Default: extract every clip of a batch independently, in parallel on the
    /// current rayon pool. Must return one result per clip, in input order.
    fn extract_batch(&self, clips: &[Self::Clip]) -> Vec<Result<Vec<f32>>> {
        clips.par_iter().map(|clip| self.extract(clip)).collect()
    }
}

/// The anomaly classifier: 32 segment vectors in, 32 scores in `[0, 1]` out.
pub trait AnomalyScorer: Sync {
    /// Score one video's segments.
    fn score(&self, key: &VideoKey, segments: &SegmentedRepresentation) -> Result<Vec<f64>>;

    /// Default: score every video of a batch independently, in parallel on the
    /// current rayon pool. Returns one result per video, in input order.
    fn score_batch(&self, videos: &[(VideoKey, SegmentedRepresentation)]) -> Vec<Result<Vec<f64>>> {
        videos
            .par_iter()
            .map(|(key, segments)| self.score(key, segments))
            .collect()
    }
}
