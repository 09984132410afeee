pub mod error;
pub mod features;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use error::{Result, VadError};
pub use features::{
    aggregate, read_features, ClipFeature, FeaturesWriter, SegmentedRepresentation, VideoKey,
    NUM_SEGMENTS,
};
pub use models::base_model::{AnomalyScorer, FeatureExtractor};
pub use utils::evaluation::{RocAccumulator, RocCurve, RocPoint};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn vad_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    // Aggregation:
    m.add_function(wrap_pyfunction!(features::aggregator::python::aggregate_segments, m)?)?;

    // Feature files:
    m.add_class::<features::store::python::PyFeaturesWriter>()?;
    m.add_function(wrap_pyfunction!(features::store::python::read_features, m)?)?;

    // Realignment:
    m.add_function(wrap_pyfunction!(utils::realign::python::expand_scores, m)?)?;
    m.add_function(wrap_pyfunction!(utils::realign::python::expand_labels, m)?)?;

    // ROC:
    m.add_class::<utils::evaluation::python::PyRocAccumulator>()?;
    m.add("NUM_SEGMENTS", NUM_SEGMENTS)?;
    Ok(())
}
