//! Cyclic product models: invariant by construction, single forward pass

use super::layers::{
    dense_stack, forward_stack, forward_stack_vertices, wrap_pad, Activation, Conv1d, Dense,
    Padding,
};
use super::model::{check_quads, Head, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::{cyclic_product_invariant, Architecture, ChannelLayout};
use crate::Result;
use ndarray::{Array2, Array3};
use rand::Rng;

use Activation::{Linear, Tanh};

/// Per-vertex MLP producing `4 * channel_width` features, combined with the
/// interleaved cyclic product
#[derive(Clone, Debug, PartialEq)]
pub struct AlgebraicMlp {
    num_features: usize,
    channel_width: usize,
    features: Vec<Dense>,
    fc: Vec<Dense>,
}

impl AlgebraicMlp {
    /// Dense 16 -> Dense 64 -> Dense 4k (linear), product, Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(num_features: usize, channel_width: usize, head: Head, rng: &mut R) -> Self {
        let features = dense_stack(2, &[(16, Tanh), (64, Tanh), (4 * channel_width, Linear)], rng);
        let mut shape = vec![(num_features, Tanh)];
        if head == Head::Regression {
            shape.push((1, Linear));
        }
        AlgebraicMlp {
            num_features,
            channel_width,
            features,
            fc: dense_stack(channel_width, &shape, rng),
        }
    }

    /// The invariant `(batch, channel_width)` representation
    pub fn invariant_features(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        check_quads(quads)?;
        let per_vertex = forward_stack_vertices(&self.features, quads.to_owned())?;
        cyclic_product_invariant(&per_vertex, ChannelLayout::Interleaved)
    }
}

impl QuadRegressor for AlgebraicMlp {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        forward_stack(&self.fc, self.invariant_features(quads)?)
    }

    fn architecture(&self) -> Architecture {
        Architecture::AlgebraicMlp {
            num_features: self.num_features,
            channel_width: self.channel_width,
        }
    }

    fn output_dim(&self) -> usize {
        self.fc.last().map_or(0, Dense::output_dim)
    }
}

impl Module for AlgebraicMlp {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.features.export_state(&join(prefix, "features"), state);
        self.fc.export_state(&join(prefix, "fc"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.features.import_state(&join(prefix, "features"), state, report)?;
        self.fc.import_state(&join(prefix, "fc"), state, report)
    }
}

/// Wrap-padded convolutions producing `4 * channel_width` features per
/// vertex, combined with the blocked cyclic product
#[derive(Clone, Debug, PartialEq)]
pub struct AlgebraicConv {
    num_features: usize,
    channel_width: usize,
    convs: Vec<Conv1d>,
    fc: Vec<Dense>,
}

impl AlgebraicConv {
    /// Conv k3 32 -> Conv k1 4k (linear), product, Dense 32 -> Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(num_features: usize, channel_width: usize, head: Head, rng: &mut R) -> Self {
        let convs = vec![
            Conv1d::new(2, 32, 3, Padding::Valid, Tanh, rng),
            Conv1d::new(32, 4 * channel_width, 1, Padding::Same, Linear, rng),
        ];
        let mut shape = vec![(32, Tanh), (num_features, Tanh)];
        if head == Head::Regression {
            shape.push((1, Linear));
        }
        AlgebraicConv {
            num_features,
            channel_width,
            convs,
            fc: dense_stack(channel_width, &shape, rng),
        }
    }

    /// The invariant `(batch, channel_width)` representation
    pub fn invariant_features(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        check_quads(quads)?;
        // the wrap padding keeps the conv equivariant, so the product stays invariant
        let per_vertex = self
            .convs
            .iter()
            .try_fold(wrap_pad(quads)?, |x, conv| conv.forward(&x))?;
        cyclic_product_invariant(&per_vertex, ChannelLayout::Blocked)
    }
}

impl QuadRegressor for AlgebraicConv {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        forward_stack(&self.fc, self.invariant_features(quads)?)
    }

    fn architecture(&self) -> Architecture {
        Architecture::AlgebraicConv {
            num_features: self.num_features,
            channel_width: self.channel_width,
        }
    }

    fn output_dim(&self) -> usize {
        self.fc.last().map_or(0, Dense::output_dim)
    }
}

impl Module for AlgebraicConv {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.convs.export_state(&join(prefix, "convs"), state);
        self.fc.export_state(&join(prefix, "fc"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.convs.import_state(&join(prefix, "convs"), state, report)?;
        self.fc.import_state(&join(prefix, "fc"), state, report)
    }
}
