//! Message passing over the 4-cycle of vertices
//!
//! Node states are refined by messages along the cycle edges and then read
//! out by concatenation. The concatenation fixes an order, so unlike the
//! other models this one is not invariant to relabelling.

use super::layers::{dense_stack, forward_stack, forward_stack_vertices, Activation, Dense};
use super::model::{check_quads, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::Architecture;
use crate::Result;
use ndarray::{concatenate, Array2, Array3, Axis};
use rand::Rng;

use Activation::{Linear, Tanh};

/// Shared message, update and readout networks on the vertex cycle
#[derive(Clone, Debug, PartialEq)]
pub struct MessagePassing {
    hidden_dim: usize,
    rounds: usize,
    features: Vec<Dense>,
    message: Vec<Dense>,
    update: Vec<Dense>,
    readout: Vec<Dense>,
}

impl MessagePassing {
    /// Build with node states of width `hidden_dim`
    pub fn new<R: Rng + ?Sized>(hidden_dim: usize, rounds: usize, rng: &mut R) -> Self {
        let h = hidden_dim;
        MessagePassing {
            hidden_dim,
            rounds,
            features: dense_stack(2, &[(16, Tanh), (64, Tanh), (h, Tanh)], rng),
            message: dense_stack(2 * h, &[(64, Tanh), (h, Tanh)], rng),
            update: dense_stack(3 * h, &[(64, Tanh), (h, Tanh)], rng),
            readout: dense_stack(4 * h, &[(32, Tanh), (1, Linear)], rng),
        }
    }

    /// Node states after all rounds, one `(batch, hidden)` array per vertex
    pub fn node_states(&self, quads: &Array3<f32>) -> Result<Vec<Array2<f32>>> {
        check_quads(quads)?;
        let inputs = forward_stack_vertices(&self.features, quads.to_owned())?;
        let n = inputs.len_of(Axis(1));
        let raw: Vec<Array2<f32>> = inputs.axis_iter(Axis(1)).map(|v| v.to_owned()).collect();
        let mut states = raw.clone();

        for _ in 0..self.rounds {
            // messages[i] travels along the edge (i, i + 1)
            let messages = (0..n)
                .map(|i| {
                    let pair = concatenate(Axis(1), &[states[i].view(), states[(i + 1) % n].view()])?;
                    forward_stack(&self.message, pair)
                })
                .collect::<Result<Vec<_>>>()?;

            states = (0..n)
                .map(|i| {
                    let incoming = &messages[(i + n - 1) % n];
                    let joined = concatenate(Axis(1), &[incoming.view(), states[i].view(), raw[i].view()])?;
                    forward_stack(&self.update, joined)
                })
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(states)
    }
}

impl QuadRegressor for MessagePassing {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        let states = self.node_states(quads)?;
        let views: Vec<_> = states.iter().map(|s| s.view()).collect();
        forward_stack(&self.readout, concatenate(Axis(1), &views)?)
    }

    fn architecture(&self) -> Architecture {
        Architecture::MessagePassing {
            hidden_dim: self.hidden_dim,
            rounds: self.rounds,
        }
    }

    fn output_dim(&self) -> usize {
        1
    }
}

impl Module for MessagePassing {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.features.export_state(&join(prefix, "features"), state);
        self.message.export_state(&join(prefix, "message"), state);
        self.update.export_state(&join(prefix, "update"), state);
        self.readout.export_state(&join(prefix, "readout"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.features.import_state(&join(prefix, "features"), state, report)?;
        self.message.import_state(&join(prefix, "message"), state, report)?;
        self.update.import_state(&join(prefix, "update"), state, report)?;
        self.readout.import_state(&join(prefix, "readout"), state, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::roll_vertices;
    use rand::{rngs::StdRng, SeedableRng};

    fn batch() -> Array3<f32> {
        Array3::from_shape_fn((2, 4, 2), |(b, v, c)| ((b + v * 2 + c) % 4) as f32 * 0.5 - 0.7)
    }

    #[test]
    fn test_node_states_shape() {
        let mut rng = StdRng::seed_from_u64(31);
        let model = MessagePassing::new(8, 2, &mut rng);
        let states = model.node_states(&batch()).unwrap();
        assert_eq!(states.len(), 4);
        assert_eq!(states[0].dim(), (2, 8));
        assert_eq!(model.forward(&batch()).unwrap().dim(), (2, 1));
    }

    #[test]
    fn test_node_states_are_equivariant() {
        // the rounds themselves commute with rotation; only the readout breaks invariance
        let mut rng = StdRng::seed_from_u64(32);
        let model = MessagePassing::new(8, 2, &mut rng);
        let x = batch();
        let states = model.node_states(&x).unwrap();
        let rolled = model.node_states(&roll_vertices(&x, 1)).unwrap();
        for i in 0..4 {
            let diff = (&rolled[(i + 1) % 4] - &states[i]).mapv(f32::abs);
            assert!(diff.iter().all(|d| *d < 1e-5));
        }
    }
}
