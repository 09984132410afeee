use serde::Serialize;

use crate::error::{Result, VadError};

/// One ROC operating point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
    /// Frames scoring at or above this value are predicted anomalous.
    pub threshold: f64,
}

/// ROC curve ordered by descending threshold, starting at `(0, 0)` with an
/// infinite threshold, plus the trapezoidal area under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Running per-frame predictions and labels over every evaluated video.
#[derive(Debug, Clone, Default)]
pub struct RocAccumulator {
    predicted: Vec<f64>,
    actual: Vec<f64>,
    videos: usize,
}

impl RocAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one video's frame scores and labels. Rejected input leaves the
    /// running totals untouched.
    pub fn accumulate(&mut self, predicted: &[f64], actual: &[f64]) -> Result<()> {
        if predicted.len() != actual.len() {
            return Err(VadError::LengthMismatch {
                predicted: predicted.len(),
                actual: actual.len(),
            });
        }
        if let Some(index) = predicted.iter().position(|score| score.is_nan()) {
            return Err(VadError::InvalidScore {
                index: self.predicted.len() + index,
            });
        }
        if let Some((index, value)) = actual
            .iter()
            .enumerate()
            .find(|(_, label)| **label != 0.0 && **label != 1.0)
        {
            return Err(VadError::InvalidLabel {
                index: self.actual.len() + index,
                value: *value,
            });
        }

        self.predicted.extend_from_slice(predicted);
        self.actual.extend_from_slice(actual);
        self.videos += 1;
        Ok(())
    }

    /// Total frames accumulated.
    pub fn len(&self) -> usize {
        self.predicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicted.is_empty()
    }

    pub fn videos(&self) -> usize {
        self.videos
    }

    pub fn predicted(&self) -> &[f64] {
        &self.predicted
    }

    pub fn actual(&self) -> &[f64] {
        &self.actual
    }

    fn class_counts(&self) -> (usize, usize) {
        let positives = self.actual.iter().filter(|label| **label == 1.0).count();
        (positives, self.actual.len() - positives)
    }

    /// ROC over everything accumulated so far, one point per distinct score.
    pub fn compute_roc(&self) -> Result<RocCurve> {
        let (positives, negatives) = self.class_counts();
        if positives == 0 || negatives == 0 {
            return Err(VadError::DegenerateLabels {
                positives,
                negatives,
            });
        }

        let mut order: Vec<usize> = (0..self.predicted.len()).collect();
        order.sort_by(|&a, &b| self.predicted[b].total_cmp(&self.predicted[a]));

        let mut points = vec![RocPoint {
            false_positive_rate: 0.0,
            true_positive_rate: 0.0,
            threshold: f64::INFINITY,
        }];
        let mut true_positives = 0usize;
        let mut false_positives = 0usize;
        let mut cursor = 0;
        while cursor < order.len() {
            let threshold = self.predicted[order[cursor]];
            // Tied scores cross the threshold together.
            while cursor < order.len() && self.predicted[order[cursor]] == threshold {
                if self.actual[order[cursor]] == 1.0 {
                    true_positives += 1;
                } else {
                    false_positives += 1;
                }
                cursor += 1;
            }
            points.push(RocPoint {
                false_positive_rate: false_positives as f64 / negatives as f64,
                true_positive_rate: true_positives as f64 / positives as f64,
                threshold,
            });
        }

        let auc = trapezoid_area(&points);
        Ok(RocCurve { points, auc })
    }

    /// Precision, recall and F1 when frames scoring above `threshold` are flagged.
    pub fn threshold_metrics(&self, threshold: f64) -> ThresholdMetrics {
        calculate_threshold_metrics(&self.actual, &self.predicted, threshold)
    }
}

fn trapezoid_area(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            let width = pair[1].false_positive_rate - pair[0].false_positive_rate;
            width * (pair[1].true_positive_rate + pair[0].true_positive_rate) / 2.0
        })
        .sum()
}

fn calculate_threshold_metrics(true_labels: &[f64], scores: &[f64], threshold: f64) -> ThresholdMetrics {
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut fn_count = 0.0;

    for (label, score) in true_labels.iter().zip(scores.iter()) {
        let predicted = *score > threshold;
        let anomalous = *label > 0.0;
        match (anomalous, predicted) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_count += 1.0,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_count > 0.0 { tp / (tp + fn_count) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ThresholdMetrics {
        precision,
        recall,
        f1,
    }
}

#[cfg(feature = "python")]
pub mod python {
    use pyo3::prelude::*;

    type Curve = (Vec<f64>, Vec<f64>, Vec<f64>, f64);

    /// Python-exposed wrapper around RocAccumulator
    #[pyclass(name = "RocAccumulator")]
    pub struct PyRocAccumulator {
        inner: super::RocAccumulator,
    }

    #[pymethods]
    impl PyRocAccumulator {
        #[new]
        fn new() -> Self {
            PyRocAccumulator {
                inner: super::RocAccumulator::new(),
            }
        }

        fn accumulate(&mut self, predicted: Vec<f64>, actual: Vec<f64>) -> PyResult<()> {
            Ok(self.inner.accumulate(&predicted, &actual)?)
        }

        /// Returns `(fpr, tpr, thresholds, auc)`.
        fn compute_roc(&self) -> PyResult<Curve> {
            let curve = self.inner.compute_roc()?;
            let fpr = curve.points.iter().map(|p| p.false_positive_rate).collect();
            let tpr = curve.points.iter().map(|p| p.true_positive_rate).collect();
            let thresholds = curve.points.iter().map(|p| p.threshold).collect();
            Ok((fpr, tpr, thresholds, curve.auc))
        }

        /// Returns `(precision, recall, f1)`.
        #[pyo3(signature = (threshold=0.5))]
        fn threshold_metrics(&self, threshold: f64) -> (f64, f64, f64) {
            let metrics = self.inner.threshold_metrics(threshold);
            (metrics.precision, metrics.recall, metrics.f1)
        }

        #[getter]
        fn frames(&self) -> usize {
            self.inner.len()
        }

        #[getter]
        fn videos(&self) -> usize {
            self.inner.videos()
        }
    }
}
