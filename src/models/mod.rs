pub mod base_model;
pub mod precomputed;
