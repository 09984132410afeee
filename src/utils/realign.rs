use crate::error::{Result, VadError};
use crate::features::NUM_SEGMENTS;
use crate::utils::ground_truth::GroundTruthInterval;

/// Spread segment scores back over a video's frames.
///
/// Each segment covers `frame_count / 32` frames (integer division). Frames
/// past `32 * (frame_count / 32)` stay at 0.0, and a video shorter than 32
/// frames gets no scores at all.
pub fn expand_scores(segment_scores: &[f64], frame_count: usize) -> Result<Vec<f64>> {
    if segment_scores.len() != NUM_SEGMENTS {
        return Err(VadError::SegmentCountMismatch {
            context: "segment scores".to_string(),
            expected: NUM_SEGMENTS,
            actual: segment_scores.len(),
        });
    }

    let segment_len = frame_count / NUM_SEGMENTS;
    let mut frames = vec![0.0; frame_count];
    for (index, score) in segment_scores.iter().enumerate() {
        let start = index * segment_len;
        frames[start..start + segment_len].fill(*score);
    }
    Ok(frames)
}

/// Binary per-frame labels: 1.0 inside any interval, 0.0 elsewhere.
///
/// Sentinel intervals are skipped, ends are clamped to `frame_count`, and
/// overlapping intervals simply union.
pub fn expand_labels(intervals: &[GroundTruthInterval], frame_count: usize) -> Result<Vec<f64>> {
    let mut frames = vec![0.0; frame_count];
    for interval in intervals {
        if interval.is_sentinel() {
            continue;
        }
        if interval.start < 0 {
            return Err(VadError::InvalidInterval {
                start: interval.start,
                end: interval.end,
            });
        }
        let start = clamp_frame(interval.start, frame_count);
        let end = clamp_frame(interval.end, frame_count);
        if start < end {
            frames[start..end].fill(1.0);
        }
    }
    Ok(frames)
}

fn clamp_frame(frame: i64, frame_count: usize) -> usize {
    usize::try_from(frame.max(0)).map_or(frame_count, |frame| frame.min(frame_count))
}

#[cfg(feature = "python")]
pub mod python {
    use numpy::{IntoPyArray, PyArray1};
    use pyo3::prelude::*;

    use crate::utils::ground_truth::GroundTruthInterval;

    #[pyfunction]
    pub fn expand_scores<'py>(
        py: Python<'py>,
        segment_scores: Vec<f64>,
        frame_count: usize,
    ) -> PyResult<&'py PyArray1<f64>> {
        let frames = super::expand_scores(&segment_scores, frame_count)?;
        Ok(frames.into_pyarray(py))
    }

    #[pyfunction]
    pub fn expand_labels<'py>(
        py: Python<'py>,
        intervals: Vec<(i64, i64)>,
        frame_count: usize,
    ) -> PyResult<&'py PyArray1<f64>> {
        let intervals: Vec<GroundTruthInterval> = intervals.into_iter().map(Into::into).collect();
        let frames = super::expand_labels(&intervals, frame_count)?;
        Ok(frames.into_pyarray(py))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_interval_labels_nothing() {
        let labels = expand_labels(&[GroundTruthInterval::NONE], 100).expect("labels");
        assert_eq!(labels, vec![0.0; 100]);
    }

    #[test]
    fn interval_labels_half_open_range() {
        let labels = expand_labels(&[GroundTruthInterval::new(10, 20)], 100).expect("labels");
        assert_eq!(labels.len(), 100);
        assert_eq!(labels.iter().filter(|value| **value == 1.0).count(), 10);
        assert!(labels[10..20].iter().all(|value| *value == 1.0));
        assert_eq!(labels[9], 0.0);
        assert_eq!(labels[20], 0.0);
    }

    #[test]
    fn overlapping_intervals_union_and_clamp() {
        let intervals = [
            GroundTruthInterval::new(5, 15),
            GroundTruthInterval::new(10, 20),
            GroundTruthInterval::new(90, 150),
            GroundTruthInterval::new(40, 30),
        ];
        let labels = expand_labels(&intervals, 100).expect("labels");
        assert_eq!(labels.iter().filter(|value| **value == 1.0).count(), 25);
        assert!(labels[90..].iter().all(|value| *value == 1.0));
    }

    #[test]
    fn negative_non_sentinel_start_is_rejected() {
        let err = expand_labels(&[GroundTruthInterval::new(-5, 10)], 100).unwrap_err();
        assert!(matches!(err, VadError::InvalidInterval { start: -5, end: 10 }));
    }

    #[test]
    fn scores_are_piecewise_constant_per_segment() {
        let mut scores = vec![0.1; 16];
        scores.extend(vec![0.9; 16]);
        let frames = expand_scores(&scores, 3200).expect("frames");
        assert_eq!(frames.len(), 3200);
        assert!(frames[..1600].iter().all(|value| *value == 0.1));
        assert!(frames[1600..].iter().all(|value| *value == 0.9));
    }

    #[test]
    fn trailing_remainder_frames_stay_zero() {
        let scores = vec![0.5; NUM_SEGMENTS];
        let frames = expand_scores(&scores, 100).expect("frames");
        // 100 / 32 = 3 frames per segment, so frames 96..100 are never scored.
        assert!(frames[..96].iter().all(|value| *value == 0.5));
        assert!(frames[96..].iter().all(|value| *value == 0.0));
    }

    #[test]
    fn short_video_gets_no_scores() {
        let frames = expand_scores(&[1.0; NUM_SEGMENTS], 20).expect("frames");
        assert_eq!(frames, vec![0.0; 20]);
    }

    #[test]
    fn score_vector_must_have_thirty_two_entries() {
        let err = expand_scores(&[0.5; 31], 320).unwrap_err();
        assert!(matches!(
            err,
            VadError::SegmentCountMismatch { actual: 31, .. }
        ));
    }
}
