//! Group-averaged models: any network made invariant by averaging over rotations

use super::layers::{dense_stack, forward_stack, wrap_pad, Activation, Conv1d, Dense, Padding};
use super::model::{check_quads, Head, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::{group_average, Architecture};
use crate::Result;
use ndarray::{Array2, Array3};
use rand::Rng;

use Activation::Tanh;

fn head_layers(num_features: usize, head: Head) -> Vec<(usize, Activation)> {
    let mut shape = vec![(num_features, Tanh)];
    if head == Head::Regression {
        shape.push((1, Activation::Linear));
    }
    shape
}

/// MLP over the 8 flattened coordinates, averaged over the 4 rotations
#[derive(Clone, Debug, PartialEq)]
pub struct AveragedMlp {
    num_features: usize,
    features: Vec<Dense>,
}

impl AveragedMlp {
    /// Dense 64 -> Dense 6n -> Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(num_features: usize, head: Head, rng: &mut R) -> Self {
        let mut shape = vec![(64, Tanh), (6 * num_features, Tanh)];
        shape.extend(head_layers(num_features, head));
        AveragedMlp {
            num_features,
            features: dense_stack(8, &shape, rng),
        }
    }

    /// The network for one fixed labelling
    pub fn process(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        let batch = quads.dim().0;
        let flat = quads.to_shape((batch, 8))?.into_owned();
        forward_stack(&self.features, flat)
    }
}

impl QuadRegressor for AveragedMlp {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        check_quads(quads)?;
        group_average(quads, |q| self.process(q))
    }

    fn architecture(&self) -> Architecture {
        Architecture::AveragedMlp {
            num_features: self.num_features,
        }
    }

    fn output_dim(&self) -> usize {
        self.features.last().map_or(0, Dense::output_dim)
    }
}

impl Module for AveragedMlp {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.features.export_state(&join(prefix, "features"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.features.import_state(&join(prefix, "features"), state, report)
    }
}

/// Convolutions over the wrap-padded vertex sequence, averaged over rotations
#[derive(Clone, Debug, PartialEq)]
pub struct AveragedConv {
    num_features: usize,
    conv_width: usize,
    convs: Vec<Conv1d>,
    fc: Vec<Dense>,
}

impl AveragedConv {
    /// Conv k3 32 -> Conv k1 `conv_width` -> Dense 32 -> Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(num_features: usize, conv_width: usize, head: Head, rng: &mut R) -> Self {
        let convs = vec![
            Conv1d::new(2, 32, 3, Padding::Valid, Tanh, rng),
            Conv1d::new(32, conv_width, 1, Padding::Same, Tanh, rng),
        ];
        let mut shape = vec![(32, Tanh)];
        shape.extend(head_layers(num_features, head));
        AveragedConv {
            num_features,
            conv_width,
            convs,
            fc: dense_stack(4 * conv_width, &shape, rng),
        }
    }

    /// The network for one fixed labelling
    pub fn process(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        let batch = quads.dim().0;
        let x = self
            .convs
            .iter()
            .try_fold(wrap_pad(quads)?, |x, conv| conv.forward(&x))?;
        let flat = x.to_shape((batch, 4 * self.conv_width))?.into_owned();
        forward_stack(&self.fc, flat)
    }
}

impl QuadRegressor for AveragedConv {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        check_quads(quads)?;
        group_average(quads, |q| self.process(q))
    }

    fn architecture(&self) -> Architecture {
        Architecture::AveragedConv {
            num_features: self.num_features,
            conv_width: self.conv_width,
        }
    }

    fn output_dim(&self) -> usize {
        self.fc.last().map_or(0, Dense::output_dim)
    }
}

impl Module for AveragedConv {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.convs.export_state(&join(prefix, "convs"), state);
        self.fc.export_state(&join(prefix, "fc"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.convs.import_state(&join(prefix, "convs"), state, report)?;
        self.fc.import_state(&join(prefix, "fc"), state, report)
    }
}
