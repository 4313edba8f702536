//! Layers, parameter state and the quadrilateral architectures

mod layers;
mod state;
mod model;
mod averaged;
mod segment;
mod algebraic;
mod message_passing;
mod polynomial;
mod classifiers;
mod datasets;

pub use layers::{dense_stack, forward_stack, wrap_pad, Activation, Conv1d, Dense, Padding};
pub use state::{load_state_dict, LoadReport, Module, StateDict, Strictness};
pub use model::{Head, QuadModel, QuadRegressor};
pub use averaged::{AveragedConv, AveragedMlp};
pub use segment::SegmentNet;
pub use algebraic::{AlgebraicConv, AlgebraicMlp};
pub use message_passing::MessagePassing;
pub use polynomial::{monomial_exponents, PolynomialInvariant};
pub use classifiers::{PointInQuadNet, QuadPairNet};
pub use datasets::{
    seed_for_path, split_path, AreaDataset, PairSample, PointInsideDataset, PointSample,
    QuadPairDataset,
};
