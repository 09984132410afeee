use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

use crate::error::{Result, VadError};
use crate::features::NUM_SEGMENTS;

/// Exactly `NUM_SEGMENTS` averaged feature vectors for one video, in temporal order.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedRepresentation {
    segments: Array2<f32>,
}

impl SegmentedRepresentation {
    /// Wrap a `NUM_SEGMENTS x D` array. `context` names the source for the error message.
    pub fn from_array(segments: Array2<f32>, context: &str) -> Result<Self> {
        if segments.nrows() != NUM_SEGMENTS {
            return Err(VadError::SegmentCountMismatch {
                context: context.to_string(),
                expected: NUM_SEGMENTS,
                actual: segments.nrows(),
            });
        }
        Ok(SegmentedRepresentation { segments })
    }

    /// Feature dimensionality D.
    pub fn dim(&self) -> usize {
        self.segments.ncols()
    }

    pub fn segment(&self, index: usize) -> ArrayView1<'_, f32> {
        self.segments.row(index)
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.segments.view()
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.segments
    }
}

/// Number of zero vectors appended so `n` clips divide evenly into segments.
pub fn padding_for(n: usize) -> usize {
    (NUM_SEGMENTS - n % NUM_SEGMENTS) % NUM_SEGMENTS
}

/// Scale a vector to unit L2 norm in place. Zero vectors stay zero.
///
/// Squares are summed in f64 so the norm of any finite f32 vector neither
/// underflows to zero nor overflows to infinity.
pub fn l2_normalize(mut row: ArrayViewMut1<'_, f32>) {
    let norm = row
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        row.mapv_inplace(|value| (f64::from(value) / norm) as f32);
    }
}

/// Reduce a video's clip features, keyed by start frame, to `NUM_SEGMENTS` vectors.
///
/// Clips are ordered by start frame regardless of input order, L2-normalised,
/// zero-padded to a multiple of `NUM_SEGMENTS`, split into equal contiguous
/// chunks and mean-pooled per chunk. With fewer clips than segments the
/// trailing segments come out all zero.
pub fn aggregate<I>(clips: I) -> Result<SegmentedRepresentation>
where
    I: IntoIterator<Item = (u64, Vec<f32>)>,
{
    let mut clips: Vec<(u64, Vec<f32>)> = clips.into_iter().collect();
    if clips.is_empty() {
        return Err(VadError::EmptyVideo);
    }
    clips.sort_by_key(|(start_frame, _)| *start_frame);

    let (first_frame, first) = &clips[0];
    let dim = first.len();
    if dim == 0 {
        return Err(VadError::EmptyFeatureVector {
            start_frame: *first_frame,
        });
    }

    let n = clips.len();
    let padded = n + padding_for(n);
    let mut features = Array2::<f32>::zeros((padded, dim));
    for (row, (start_frame, vector)) in clips.iter().enumerate() {
        if vector.len() != dim {
            return Err(VadError::DimensionMismatch {
                start_frame: *start_frame,
                expected: dim,
                actual: vector.len(),
            });
        }
        let mut target = features.row_mut(row);
        target.assign(&ArrayView1::from(vector.as_slice()));
        l2_normalize(target);
    }

    let chunk = padded / NUM_SEGMENTS;
    let mut segments = Array2::<f32>::zeros((NUM_SEGMENTS, dim));
    for (index, mut segment) in segments.axis_iter_mut(Axis(0)).enumerate() {
        let pooled = features
            .slice(s![index * chunk..(index + 1) * chunk, ..])
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(dim));
        segment.assign(&pooled);
    }

    Ok(SegmentedRepresentation { segments })
}

#[cfg(feature = "python")]
pub mod python {
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    /// Python-exposed aggregation: `start_frames[i]` is the start frame of `features[i]`.
    #[pyfunction]
    pub fn aggregate_segments<'py>(
        py: Python<'py>,
        start_frames: Vec<u64>,
        features: PyReadonlyArray2<'py, f32>,
    ) -> PyResult<&'py PyArray2<f32>> {
        let features = features.as_array();
        if start_frames.len() != features.nrows() {
            return Err(PyValueError::new_err(format!(
                "got {} start frames for {} feature rows",
                start_frames.len(),
                features.nrows()
            )));
        }
        let clips = start_frames
            .into_iter()
            .zip(features.outer_iter().map(|row| row.to_vec()));
        let segments = super::aggregate(clips)?;
        Ok(segments.into_inner().into_pyarray(py))
    }
}
