//! # bscem core
//!
//! Truth inference for items observed through noisy binary channels, trained
//! by expectation-maximization over a factor graph.

pub mod dist;
pub mod engine;
pub mod model;

// Re-export commonly used types
pub use engine::em::{EmConfig, EmDiagnostics, Stage};
pub use engine::errors::ModelError;
pub use engine::factor_graph::FactorGraph;
pub use model::multiple_bsc::MultipleBscModel;
pub use model::multiple_bsc_pair::MultipleBscPairModel;
