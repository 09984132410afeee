use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, VadError};
use crate::features::{SegmentedRepresentation, VideoKey, NUM_SEGMENTS};
use crate::models::base_model::AnomalyScorer;

/// Scores produced by a classifier run elsewhere, keyed by `subdir/video`
/// (a bare video name is accepted as a fallback).
#[derive(Debug, Clone, Default)]
pub struct PrecomputedScores {
    scores: HashMap<String, Vec<f64>>,
}

impl PrecomputedScores {
    pub fn new(scores: HashMap<String, Vec<f64>>) -> Self {
        PrecomputedScores { scores }
    }

    /// Load a JSON object mapping video ids to 32 segment scores.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| VadError::io(path, source))?;
        let scores = serde_json::from_str(&content).map_err(|source| VadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(PrecomputedScores { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl AnomalyScorer for PrecomputedScores {
    fn score(&self, key: &VideoKey, _segments: &SegmentedRepresentation) -> Result<Vec<f64>> {
        let scores = self
            .scores
            .get(&key.id())
            .or_else(|| self.scores.get(key.name()))
            .ok_or_else(|| VadError::Scorer {
                video: key.id(),
                message: "no precomputed scores".to_string(),
            })?;
        if scores.len() != NUM_SEGMENTS {
            return Err(VadError::SegmentCountMismatch {
                context: format!("scores of {key}"),
                expected: NUM_SEGMENTS,
                actual: scores.len(),
            });
        }
        Ok(scores.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn segments() -> SegmentedRepresentation {
        SegmentedRepresentation::from_array(Array2::zeros((NUM_SEGMENTS, 2)), "test")
            .expect("segments")
    }

    #[test]
    fn looks_up_by_id_then_name() {
        let mut map = HashMap::new();
        map.insert("Arson/Arson011".to_string(), vec![0.25; NUM_SEGMENTS]);
        map.insert("Normal_7".to_string(), vec![0.0; NUM_SEGMENTS]);
        let scorer = PrecomputedScores::new(map);

        let arson = VideoKey::new("/f", "Arson", "Arson011");
        assert_eq!(scorer.score(&arson, &segments()).expect("score")[0], 0.25);
        let normal = VideoKey::new("/f", "Testing_Normal", "Normal_7");
        assert_eq!(scorer.score(&normal, &segments()).expect("score")[31], 0.0);

        let unknown = VideoKey::new("/f", "x", "missing");
        assert!(matches!(
            scorer.score(&unknown, &segments()),
            Err(VadError::Scorer { .. })
        ));
    }

    #[test]
    fn batch_scoring_keeps_input_order() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), vec![0.1; NUM_SEGMENTS]);
        map.insert("b".to_string(), vec![0.9; NUM_SEGMENTS]);
        let scorer = PrecomputedScores::new(map);

        let videos = vec![
            (VideoKey::new("/f", "", "b"), segments()),
            (VideoKey::new("/f", "", "missing"), segments()),
            (VideoKey::new("/f", "", "a"), segments()),
        ];
        let results = scorer.score_batch(&videos);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().expect("b")[0], 0.9);
        assert!(matches!(results[1], Err(VadError::Scorer { .. })));
        assert_eq!(results[2].as_ref().expect("a")[0], 0.1);
    }

    #[test]
    fn rejects_wrong_score_count() {
        let mut map = HashMap::new();
        map.insert("v".to_string(), vec![0.5; 8]);
        let scorer = PrecomputedScores::new(map);
        let err = scorer
            .score(&VideoKey::new("/f", "", "v"), &segments())
            .unwrap_err();
        assert!(matches!(err, VadError::SegmentCountMismatch { actual: 8, .. }));
    }
}
