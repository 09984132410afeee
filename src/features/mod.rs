pub mod aggregator;
pub mod extraction;
pub mod store;

/// Fixed number of temporal segments per video.
pub const NUM_SEGMENTS: usize = 32;

pub use aggregator::{aggregate, SegmentedRepresentation};
pub use store::{read_features, ClipFeature, FeaturesWriter, VideoKey};
