//! # quad-invariance: cyclic-invariant networks for quadrilaterals
//!
//! This library implements neural architectures whose predictions about a
//! quadrilateral (its area, whether a point lies inside it, ...) do not depend
//! on which of the four vertices is listed first.
//!
//! ## Features
//!
//! - **Group averaging**: run a shared network on all 4 cyclic rotations and average
//! - **Algebraic invariant**: combine 4 per-vertex channels into a cyclic product sum
//! - **Message passing**: hidden states exchanged over the 4-cycle graph
//! - **Evaluation**: checkpoint discovery, batched inference and MAE statistics

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Points, quadrilaterals and random sampling
pub mod geometry;

/// Invariance constructions, configuration, checkpoints and evaluation
pub mod core;

/// Layers, models and datasets
pub mod nn;

/// Utility functions and helpers
pub mod utils;

// Re-export commonly used types
pub use geometry::{Point, Quad, QuadSampler};
pub use core::{Architecture, EvalConfig};
pub use nn::{QuadModel, QuadRegressor};

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum QuadInvError {
    /// Tensor has the wrong shape for an operation
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Configuration failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// No checkpoint file matched the requested run and tag
    #[error("No checkpoint matching {0}")]
    CheckpointNotFound(String),

    /// Stored parameters do not fit the model
    #[error("State mismatch: {0}")]
    StateMismatch(String),

    /// Dataset is empty or malformed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// ndarray reshape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for the library
pub type Result<T> = std::result::Result<T, QuadInvError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        core::{
            cyclic_product_invariant, group_average, roll_vertices, Architecture,
            ChannelLayout, EvalConfig,
        },
        geometry::{quads_to_tensor, Point, Quad, QuadSampler},
        nn::{Module, QuadModel, QuadRegressor, Strictness},
        QuadInvError, Result,
    };
}
