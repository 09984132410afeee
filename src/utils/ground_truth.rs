use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VadError};
use crate::features::VideoKey;

/// Anomalous frame range `[start, end)`. A start of `-1` marks "no anomaly".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct GroundTruthInterval {
    pub start: i64,
    pub end: i64,
}

impl GroundTruthInterval {
    pub const NONE: GroundTruthInterval = GroundTruthInterval { start: -1, end: -1 };

    pub fn new(start: i64, end: i64) -> Self {
        GroundTruthInterval { start, end }
    }

    pub fn is_sentinel(&self) -> bool {
        self.start == -1
    }
}

impl From<(i64, i64)> for GroundTruthInterval {
    fn from((start, end): (i64, i64)) -> Self {
        GroundTruthInterval { start, end }
    }
}

impl From<GroundTruthInterval> for (i64, i64) {
    fn from(interval: GroundTruthInterval) -> Self {
        (interval.start, interval.end)
    }
}

/// One manifest entry: where the features live, how long the video is, and
/// which frames are anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnnotation {
    #[serde(default)]
    pub subdir: String,
    pub video: String,
    pub frame_count: usize,
    #[serde(default)]
    pub intervals: Vec<GroundTruthInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationManifest {
    pub videos: Vec<VideoAnnotation>,
}

impl EvaluationManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| VadError::io(path, source))?;
        serde_json::from_str(&content).map_err(|source| VadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve each entry against the feature root, keeping manifest order.
    pub fn videos(&self, features_root: &Path) -> Vec<EvaluationVideo> {
        self.videos
            .iter()
            .map(|annotation| EvaluationVideo {
                key: VideoKey::new(
                    features_root,
                    annotation.subdir.clone(),
                    annotation.video.clone(),
                ),
                frame_count: annotation.frame_count,
                intervals: annotation.intervals.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationVideo {
    pub key: VideoKey,
    pub frame_count: usize,
    pub intervals: Vec<GroundTruthInterval>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_with_pairs_and_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"videos": [
                {"subdir": "Arson", "video": "Arson011_x264", "frame_count": 3200,
                 "intervals": [[150, 420], [680, 1267]]},
                {"video": "Normal_1", "frame_count": 100, "intervals": [[-1, -1]]},
                {"video": "Normal_2", "frame_count": 64}
            ]}"#,
        )
        .expect("write manifest");

        let manifest = EvaluationManifest::load(&path).expect("load");
        let videos = manifest.videos(Path::new("/features"));
        assert_eq!(videos.len(), 3);
        assert_eq!(
            videos[0].key.path(),
            Path::new("/features/Arson/Arson011_x264.txt")
        );
        assert_eq!(
            videos[0].intervals,
            vec![
                GroundTruthInterval::new(150, 420),
                GroundTruthInterval::new(680, 1267)
            ]
        );
        assert!(videos[1].intervals[0].is_sentinel());
        assert!(videos[2].intervals.is_empty());
        assert_eq!(videos[2].key.id(), "Normal_2");
    }

    #[test]
    fn reports_invalid_json_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"videos\": [").expect("write");
        let err = EvaluationManifest::load(&path).unwrap_err();
        assert!(matches!(err, VadError::Json { .. }));
    }
}
