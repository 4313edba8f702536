//! Edge-sum network: one shared encoder per edge, summed

use super::layers::{dense_stack, forward_stack, Activation, Dense};
use super::model::{check_quads, Head, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::Architecture;
use crate::Result;
use ndarray::{concatenate, s, Array2, Array3, Axis};
use rand::Rng;

/// Encodes each edge `[p_i, p_(i+1)]` and sums over the four edges.
///
/// Summation over the edge cycle makes it invariant without averaging.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentNet {
    num_features: usize,
    features: Vec<Dense>,
    fc: Vec<Dense>,
}

impl SegmentNet {
    /// Dense 64 -> Dense 6n per edge, then Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(num_features: usize, head: Head, rng: &mut R) -> Self {
        let features = dense_stack(
            4,
            &[(64, Activation::Tanh), (6 * num_features, Activation::Tanh)],
            rng,
        );
        let mut shape = vec![(num_features, Activation::Tanh)];
        if head == Head::Regression {
            shape.push((1, Activation::Linear));
        }
        SegmentNet {
            num_features,
            features,
            fc: dense_stack(6 * num_features, &shape, rng),
        }
    }
}

impl QuadRegressor for SegmentNet {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        check_quads(quads)?;
        let (batch, n, _) = quads.dim();

        let mut total = Array2::zeros((batch, 6 * self.num_features));
        for i in 0..n {
            let segment = concatenate(
                Axis(1),
                &[quads.slice(s![.., i, ..]), quads.slice(s![.., (i + 1) % n, ..])],
            )?;
            total += &forward_stack(&self.features, segment)?;
        }

        forward_stack(&self.fc, total)
    }

    fn architecture(&self) -> Architecture {
        Architecture::Segment {
            num_features: self.num_features,
        }
    }

    fn output_dim(&self) -> usize {
        self.fc.last().map_or(0, Dense::output_dim)
    }
}

impl Module for SegmentNet {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        self.features.export_state(&join(prefix, "features"), state);
        self.fc.export_state(&join(prefix, "fc"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        self.features.import_state(&join(prefix, "features"), state, report)?;
        self.fc.import_state(&join(prefix, "fc"), state, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::roll_vertices;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_segment_net_is_invariant() {
        let mut rng = StdRng::seed_from_u64(5);
        let model = SegmentNet::new(4, Head::Regression, &mut rng);
        let x = Array3::from_shape_fn((2, 4, 2), |(b, v, c)| (b + 2 * v + 3 * c) as f32 * 0.25);

        let base = model.forward(&x).unwrap();
        let rolled = model.forward(&roll_vertices(&x, 3)).unwrap();
        for (a, b) in base.iter().zip(rolled.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
