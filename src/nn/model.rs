//! Model interface and the enum over every quadrilateral architecture

use super::algebraic::{AlgebraicConv, AlgebraicMlp};
use super::averaged::{AveragedConv, AveragedMlp};
use super::message_passing::MessagePassing;
use super::polynomial::PolynomialInvariant;
use super::segment::SegmentNet;
use super::state::{LoadReport, Module, StateDict};
use crate::core::Architecture;
use crate::geometry::NUM_VERTICES;
use crate::{QuadInvError, Result};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// A network mapping `(batch, 4, 2)` quadrilaterals to `(batch, out)`
pub trait QuadRegressor {
    /// Forward pass
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>>;

    /// Description sufficient to rebuild the model's shape
    fn architecture(&self) -> Architecture;

    /// Width of the output
    fn output_dim(&self) -> usize;
}

/// What sits at the end of a quadrilateral network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Head {
    /// A final linear layer with a single output
    Regression,
    /// Stop at the `num_features` wide representation
    Features,
}

pub(crate) fn check_quads(x: &Array3<f32>) -> Result<()> {
    let (_, n, c) = x.dim();
    if n != NUM_VERTICES || c != 2 {
        return Err(QuadInvError::InvalidShape(format!(
            "expected (batch, {}, 2) quadrilaterals, got {:?}",
            NUM_VERTICES,
            x.dim()
        )));
    }
    Ok(())
}

/// Any of the quadrilateral architectures
#[derive(Clone, Debug, PartialEq)]
pub enum QuadModel {
    /// Averaged MLP
    AveragedMlp(AveragedMlp),
    /// Averaged convolution
    AveragedConv(AveragedConv),
    /// Edge-sum network
    Segment(SegmentNet),
    /// Cyclic product over dense features
    AlgebraicMlp(AlgebraicMlp),
    /// Cyclic product over convolution features
    AlgebraicConv(AlgebraicConv),
    /// Message passing on the 4-cycle
    MessagePassing(MessagePassing),
    /// Orbit-summed monomials
    Polynomial(PolynomialInvariant),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            QuadModel::AveragedMlp($m) => $body,
            QuadModel::AveragedConv($m) => $body,
            QuadModel::Segment($m) => $body,
            QuadModel::AlgebraicMlp($m) => $body,
            QuadModel::AlgebraicConv($m) => $body,
            QuadModel::MessagePassing($m) => $body,
            QuadModel::Polynomial($m) => $body,
        }
    };
}

impl QuadRegressor for QuadModel {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        dispatch!(self, m => m.forward(quads))
    }

    fn architecture(&self) -> Architecture {
        dispatch!(self, m => m.architecture())
    }

    fn output_dim(&self) -> usize {
        dispatch!(self, m => m.output_dim())
    }
}

impl Module for QuadModel {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        dispatch!(self, m => m.export_state(prefix, state))
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        dispatch!(self, m => m.import_state(prefix, state, report))
    }
}
