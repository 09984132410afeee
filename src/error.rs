use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VadError>;

/// Errors raised by aggregation, feature storage, realignment and ROC evaluation.
#[derive(Debug, Error)]
pub enum VadError {
    /// A video reached aggregation without a single clip feature.
    #[error("No clip features accumulated for video")]
    EmptyVideo,
    #[error("Clip at frame {start_frame} has an empty feature vector")]
    EmptyFeatureVector { start_frame: u64 },
    /// The feature file for a video does not exist.
    #[error("Feature file doesn't exist: {path}")]
    MissingFeatureFile { path: PathBuf },
    /// A stored line is empty, unparsable, or has a different width than the first line.
    #[error("Malformed feature line {line} in {path}: {reason}")]
    MalformedFeatureLine {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Expected {expected} segments for {context}, got {actual}")]
    SegmentCountMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
    /// A clip vector width differs from the first clip of the same video.
    #[error("Clip at frame {start_frame} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        start_frame: u64,
        expected: usize,
        actual: usize,
    },
    #[error("Video {path} was already flushed in this run; refusing to overwrite it")]
    VideoRevisited { path: PathBuf },
    #[error("Predicted vector has {predicted} frames but label vector has {actual}")]
    LengthMismatch { predicted: usize, actual: usize },
    /// ROC is undefined without both classes present.
    #[error("ROC undefined: {positives} positive and {negatives} negative frames")]
    DegenerateLabels { positives: usize, negatives: usize },
    #[error("Invalid ground-truth interval [{start}, {end})")]
    InvalidInterval { start: i64, end: i64 },
    #[error("Frame label {value} at index {index} is neither 0 nor 1")]
    InvalidLabel { index: usize, value: f64 },
    #[error("Frame score at index {index} is NaN")]
    InvalidScore { index: usize },
    #[error("Feature extraction failed: {0}")]
    Extractor(String),
    #[error("Anomaly scoring failed for {video}: {message}")]
    Scorer { video: String, message: String },
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl VadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VadError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "python")]
impl From<VadError> for pyo3::PyErr {
    fn from(err: VadError) -> Self {
        use pyo3::exceptions::{PyFileNotFoundError, PyOSError, PyValueError};

        match err {
            VadError::MissingFeatureFile { .. } => PyFileNotFoundError::new_err(err.to_string()),
            VadError::Io { .. } => PyOSError::new_err(err.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}
