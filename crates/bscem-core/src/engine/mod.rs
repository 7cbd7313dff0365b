//! The inference engine for noisy binary channel models.
//!
//! This module provides:
//! - **errors**: Error types for model construction and inference failures
//! - **variable**: Random variables and their ids
//! - **factor**: Factor kinds scoring assignments of adjacent variables
//! - **factor_graph**: The variable arena, factor list and adjacency index
//! - **channel**: Binary symmetric channels and their likelihoods
//! - **em**: The expectation-maximization driver and shared E/M steps
//! - **gibbs**: Gibbs sampling over discrete and continuous variables
//! - **process**: Stochastic processes drawing variables tied to shared parameters

pub mod channel;
pub mod em;
pub mod errors;
pub mod factor;
pub mod factor_graph;
pub mod gibbs;
pub mod process;
pub mod variable;
