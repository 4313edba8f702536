//! Orbit-summed monomial features
//!
//! Every monomial of a fixed total degree in the 8 coordinates
//! `x0..x3, y0..y3` is summed over the 4 cyclic vertex relabellings. The sums
//! are invariant polynomials; an MLP on top maps them to the target. A small
//! shared network may stand in for each monomial product, in which case its
//! error against the exact product is returned as an auxiliary loss.

use super::layers::{dense_stack, forward_stack, forward_stack_vertices, Activation, Dense};
use super::model::{check_quads, Head, QuadRegressor};
use super::state::{join, LoadReport, Module, StateDict};
use crate::core::{roll_vertices, Architecture};
use crate::geometry::NUM_VERTICES;
use crate::Result;
use ndarray::{Array1, Array2, Array3, Axis};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use Activation::{Linear, Tanh};

/// Coordinates per quadrilateral
pub const NUM_COORDS: usize = 2 * NUM_VERTICES;

/// Exponents of one monomial, ordered `x0..x3, y0..y3`
pub type Exponents = [u32; NUM_COORDS];

static EXPONENT_TABLES: Lazy<Mutex<HashMap<usize, Arc<Vec<Exponents>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// All exponent tuples summing to `degree`, cached per degree
pub fn monomial_exponents(degree: usize) -> Arc<Vec<Exponents>> {
    let mut tables = EXPONENT_TABLES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    tables
        .entry(degree)
        .or_insert_with(|| {
            let mut out = Vec::new();
            compositions(degree as u32, 0, &mut [0; NUM_COORDS], &mut out);
            Arc::new(out)
        })
        .clone()
}

fn compositions(remaining: u32, slot: usize, current: &mut Exponents, out: &mut Vec<Exponents>) {
    if slot == NUM_COORDS - 1 {
        current[slot] = remaining;
        out.push(*current);
        return;
    }
    for e in 0..=remaining {
        current[slot] = e;
        compositions(remaining - e, slot + 1, current, out);
    }
}

/// Monomial orbit sums followed by an MLP
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialInvariant {
    num_features: usize,
    degree: usize,
    exponents: Arc<Vec<Exponents>>,
    product_net: Option<Vec<Dense>>,
    features: Vec<Dense>,
}

impl PolynomialInvariant {
    /// Monomials of `degree` -> Dense 64 -> Dense n (-> Dense 1)
    pub fn new<R: Rng + ?Sized>(
        num_features: usize,
        degree: usize,
        learned_products: bool,
        head: Head,
        rng: &mut R,
    ) -> Self {
        let exponents = monomial_exponents(degree);
        let product_net = learned_products.then(|| dense_stack(NUM_COORDS, &[(64, Tanh), (1, Linear)], rng));

        let mut shape = vec![(64, Tanh), (num_features, Tanh)];
        if head == Head::Regression {
            shape.push((1, Linear));
        }
        PolynomialInvariant {
            num_features,
            degree,
            features: dense_stack(exponents.len(), &shape, rng),
            exponents,
            product_net,
        }
    }

    /// Number of monomials
    pub fn num_monomials(&self) -> usize {
        self.exponents.len()
    }

    /// Monomial values for one labelling: `(exact, used)`, each `(batch, monomials)`
    fn monomials(&self, quads: &Array3<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
        let batch = quads.dim().0;
        let m = self.exponents.len();

        // factors[b, k, v] = coord_v ^ exponent_kv
        let factors = Array3::from_shape_fn((batch, m, NUM_COORDS), |(b, k, v)| {
            let coord = quads[(b, v % NUM_VERTICES, v / NUM_VERTICES)];
            coord.powi(self.exponents[k][v] as i32)
        });
        let exact = factors.map_axis(Axis(2), |f| f.product());

        match &self.product_net {
            Some(net) => {
                let learned = forward_stack_vertices(net, factors)?.index_axis_move(Axis(2), 0);
                Ok((exact, learned))
            }
            None => Ok((exact.clone(), exact)),
        }
    }

    /// Invariant features and the per-sample product-approximation loss
    pub fn invariant_features(&self, quads: &Array3<f32>) -> Result<(Array2<f32>, Array1<f32>)> {
        check_quads(quads)?;
        let batch = quads.dim().0;

        let mut sums = Array2::zeros((batch, self.exponents.len()));
        let mut loss = Array1::zeros(batch);
        for shift in 0..NUM_VERTICES {
            let (exact, used) = self.monomials(&roll_vertices(quads, shift))?;
            if self.product_net.is_some() {
                loss += &(&exact - &used)
                    .mapv(f32::abs)
                    .mean_axis(Axis(1))
                    .unwrap_or_else(|| Array1::zeros(batch));
            }
            sums += &used;
        }

        Ok((sums, loss))
    }

    /// Prediction together with the auxiliary product loss
    pub fn forward_with_aux(&self, quads: &Array3<f32>) -> Result<(Array2<f32>, Array1<f32>)> {
        let (features, loss) = self.invariant_features(quads)?;
        Ok((forward_stack(&self.features, features)?, loss))
    }
}

impl QuadRegressor for PolynomialInvariant {
    fn forward(&self, quads: &Array3<f32>) -> Result<Array2<f32>> {
        Ok(self.forward_with_aux(quads)?.0)
    }

    fn architecture(&self) -> Architecture {
        Architecture::Polynomial {
            num_features: self.num_features,
            degree: self.degree,
            learned_products: self.product_net.is_some(),
        }
    }

    fn output_dim(&self) -> usize {
        self.features.last().map_or(0, Dense::output_dim)
    }
}

impl Module for PolynomialInvariant {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        if let Some(net) = &self.product_net {
            net.export_state(&join(prefix, "products"), state);
        }
        self.features.export_state(&join(prefix, "features"), state);
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        if let Some(net) = &mut self.product_net {
            net.import_state(&join(prefix, "products"), state, report)?;
        }
        self.features.import_state(&join(prefix, "features"), state, report)
    }
}
