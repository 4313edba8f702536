//! Dense and 1-D convolution layers over ndarray tensors

use super::state::{join, restore, LoadReport, Module, StateDict};
use crate::{QuadInvError, Result};
use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Element-wise activation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Identity
    Linear,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Sigmoid,
    /// Rectified linear unit
    Relu,
}

impl Activation {
    /// Apply to a single value
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
        }
    }
}

fn glorot_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> impl FnMut() -> f32 + '_ {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    move || rng.gen_range(-limit..=limit)
}

/// Fully connected layer applied to the last axis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl Dense {
    /// Glorot-uniform weights, zero bias
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let mut init = glorot_uniform(input_dim, output_dim, rng);
        Dense {
            weight: Array2::from_shape_simple_fn((input_dim, output_dim), &mut init),
            bias: Array1::zeros(output_dim),
            activation,
        }
    }

    /// Build from explicit parameters
    pub fn from_parts(weight: Array2<f32>, bias: Array1<f32>, activation: Activation) -> Result<Self> {
        if weight.ncols() != bias.len() {
            return Err(QuadInvError::InvalidShape(format!(
                "dense weight has {} outputs but bias has {}",
                weight.ncols(),
                bias.len()
            )));
        }
        Ok(Dense {
            weight,
            bias,
            activation,
        })
    }

    /// Input width
    pub fn input_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Output width
    pub fn output_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// `(batch, in)` to `(batch, out)`
    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.input_dim() {
            return Err(QuadInvError::InvalidShape(format!(
                "dense layer expects {} features, got {}",
                self.input_dim(),
                x.ncols()
            )));
        }
        let mut y = x.dot(&self.weight) + &self.bias;
        let act = self.activation;
        y.mapv_inplace(|v| act.apply(v));
        Ok(y)
    }

    /// `(batch, vertices, in)` to `(batch, vertices, out)`, shared across vertices
    pub fn forward_vertices(&self, x: &Array3<f32>) -> Result<Array3<f32>> {
        let (batch, n, f) = x.dim();
        let flat = x.to_shape((batch * n, f))?.into_owned();
        let y = self.forward(&flat)?;
        Ok(y.into_shape_with_order((batch, n, self.output_dim()))?)
    }
}

impl Module for Dense {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        state.insert(join(prefix, "weight"), self.weight.clone().into_dyn());
        state.insert(join(prefix, "bias"), self.bias.clone().into_dyn());
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        restore(&mut self.weight, join(prefix, "weight"), state, report)?;
        restore(&mut self.bias, join(prefix, "bias"), state, report)
    }
}

/// Run `x` through a stack of dense layers
pub fn forward_stack(layers: &[Dense], x: Array2<f32>) -> Result<Array2<f32>> {
    layers.iter().try_fold(x, |x, layer| layer.forward(&x))
}

/// Run every vertex of `x` through a stack of dense layers
pub fn forward_stack_vertices(layers: &[Dense], x: Array3<f32>) -> Result<Array3<f32>> {
    layers.iter().try_fold(x, |x, layer| layer.forward_vertices(&x))
}

/// Build a dense stack from `(width, activation)` pairs
pub fn dense_stack<R: Rng + ?Sized>(
    input_dim: usize,
    shape: &[(usize, Activation)],
    rng: &mut R,
) -> Vec<Dense> {
    let mut layers = Vec::with_capacity(shape.len());
    let mut width = input_dim;
    for &(out, act) in shape {
        layers.push(Dense::new(width, out, act, rng));
        width = out;
    }
    layers
}

/// Convolution padding mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// No padding; output is `len - kernel + 1` long
    Valid,
    /// Zero padding keeping the length
    Same,
}

/// 1-D convolution over `(batch, length, channels)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conv1d {
    kernel: Array3<f32>,
    bias: Array1<f32>,
    activation: Activation,
    padding: Padding,
}

impl Conv1d {
    /// Glorot-uniform kernel of shape `(kernel_size, in, out)`, zero bias
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: Padding,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let mut init = glorot_uniform(kernel_size * in_channels, kernel_size * out_channels, rng);
        Conv1d {
            kernel: Array3::from_shape_simple_fn((kernel_size, in_channels, out_channels), &mut init),
            bias: Array1::zeros(out_channels),
            activation,
            padding,
        }
    }

    /// Number of output channels
    pub fn out_channels(&self) -> usize {
        self.kernel.len_of(Axis(2))
    }

    /// Length of the output sequence for an input of `len`
    pub fn output_len(&self, len: usize) -> Option<usize> {
        let k = self.kernel.len_of(Axis(0));
        match self.padding {
            Padding::Valid => len.checked_sub(k).map(|d| d + 1),
            Padding::Same => Some(len),
        }
    }

    /// Convolve
    pub fn forward(&self, x: &Array3<f32>) -> Result<Array3<f32>> {
        let (batch, len, channels) = x.dim();
        let (k, in_channels, out_channels) = self.kernel.dim();
        if channels != in_channels {
            return Err(QuadInvError::InvalidShape(format!(
                "conv layer expects {} channels, got {}",
                in_channels, channels
            )));
        }
        let out_len = self.output_len(len).ok_or_else(|| {
            QuadInvError::InvalidShape(format!("sequence of {} is shorter than kernel {}", len, k))
        })?;
        let pad_left = match self.padding {
            Padding::Valid => 0,
            Padding::Same => (k - 1) / 2,
        };

        let act = self.activation;
        let mut out = Array3::zeros((batch, out_len, out_channels));
        for b in 0..batch {
            for t in 0..out_len {
                let mut acc = self.bias.clone();
                for j in 0..k {
                    let pos = t + j;
                    if pos < pad_left || pos - pad_left >= len {
                        continue;
                    }
                    let column = x.slice(s![b, pos - pad_left, ..]);
                    acc += &column.dot(&self.kernel.index_axis(Axis(0), j));
                }
                out.slice_mut(s![b, t, ..]).assign(&acc.mapv(|v| act.apply(v)));
            }
        }
        Ok(out)
    }
}

impl Module for Conv1d {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        state.insert(join(prefix, "kernel"), self.kernel.clone().into_dyn());
        state.insert(join(prefix, "bias"), self.bias.clone().into_dyn());
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        restore(&mut self.kernel, join(prefix, "kernel"), state, report)?;
        restore(&mut self.bias, join(prefix, "bias"), state, report)
    }
}

/// Prepend the last vertex and append the first one.
///
/// A width-3 valid convolution over the result sees every vertex together
/// with both of its neighbours on the cycle.
pub fn wrap_pad(x: &Array3<f32>) -> Result<Array3<f32>> {
    let n = x.len_of(Axis(1));
    if n == 0 {
        return Err(QuadInvError::InvalidShape("cannot wrap an empty sequence".to_string()));
    }
    Ok(ndarray::concatenate(
        Axis(1),
        &[x.slice(s![.., n - 1.., ..]), x.view(), x.slice(s![.., ..1, ..])],
    )?)
}
