//! Binary classifiers built on quadrilateral inputs

use super::layers::{dense_stack, forward_stack, Activation, Dense};
use super::model::{check_quads, Head, QuadModel, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::Architecture;
use crate::{QuadInvError, Result};
use ndarray::{concatenate, Array1, Array2, Array3, Axis};
use rand::Rng;

use Activation::{Sigmoid, Tanh};

/// Decides whether a point lies inside a quadrilateral
///
/// The quadrilateral is flattened as given, so this model is not invariant.
#[derive(Clone, Debug, PartialEq)]
pub struct PointInQuadNet {
    layers: Vec<Dense>,
}

impl PointInQuadNet {
    /// `[quad (8), point (2)]` -> Dense 32 -> Dense 64 -> Dense 32 -> sigmoid
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        PointInQuadNet {
            layers: dense_stack(10, &[(32, Tanh), (64, Tanh), (32, Tanh), (1, Sigmoid)], rng),
        }
    }

    /// Probability of "inside" for each `(quad, point)` pair
    pub fn predict(&self, quads: &Array3<f32>, points: &Array2<f32>) -> Result<Array1<f32>> {
        check_quads(quads)?;
        let batch = quads.dim().0;
        if points.dim() != (batch, 2) {
            return Err(QuadInvError::InvalidShape(format!(
                "expected ({}, 2) points, got {:?}",
                batch,
                points.dim()
            )));
        }

        let flat = quads.to_shape((batch, 8))?;
        let input = concatenate(Axis(1), &[flat.view(), points.view()])?;
        Ok(forward_stack(&self.layers, input)?.index_axis_move(Axis(1), 0))
    }
}

impl Module for PointInQuadNet {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.layers.export_state(&join(prefix, "layers"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.layers.import_state(&join(prefix, "layers"), state, report)
    }
}

/// Decides whether the second quadrilateral lies inside the first
#[derive(Clone, Debug, PartialEq)]
pub struct QuadPairNet {
    encoder: QuadModel,
    classifier: Vec<Dense>,
}

impl QuadPairNet {
    /// Shared encoder on both quads, concatenated -> Dense 32 -> sigmoid
    pub fn new<R: Rng + ?Sized>(encoder: &Architecture, rng: &mut R) -> Result<Self> {
        let encoder = encoder.build(Head::Features, rng)?;
        let width = 2 * encoder.output_dim();
        Ok(QuadPairNet {
            encoder,
            classifier: dense_stack(width, &[(32, Tanh), (1, Sigmoid)], rng),
        })
    }

    /// The shared quadrilateral encoder
    pub fn encoder(&self) -> &QuadModel {
        &self.encoder
    }

    /// Probability that `inner[b]` lies inside `outer[b]`
    pub fn predict(&self, outer: &Array3<f32>, inner: &Array3<f32>) -> Result<Array1<f32>> {
        if outer.dim() != inner.dim() {
            return Err(QuadInvError::InvalidShape(format!(
                "quad pair batches differ: {:?} vs {:?}",
                outer.dim(),
                inner.dim()
            )));
        }
        let a = self.encoder.forward(outer)?;
        let b = self.encoder.forward(inner)?;
        let joined = concatenate(Axis(1), &[a.view(), b.view()])?;
        Ok(forward_stack(&self.classifier, joined)?.index_axis_move(Axis(1), 0))
    }
}

impl Module for QuadPairNet {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.encoder.export_state(&join(prefix, "encoder"), state);
        self.classifier.export_state(&join(prefix, "classifier"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.encoder.import_state(&join(prefix, "encoder"), state, report)?;
        self.classifier.import_state(&join(prefix, "classifier"), state, report)
    }
}
