//! Cyclic-group invariance constructions
//!
//! Two ways of making a network's output independent of which vertex comes
//! first:
//!
//! - [`group_average`] evaluates any function on every cyclic rotation of its
//!   input and averages. Works for arbitrary functions, costs one pass per
//!   rotation.
//! - [`cyclic_product_invariant`] combines per-vertex channels as
//!   `a0·b1·c2·d3 + b0·c1·d2·a3 + c0·d1·a2·b3 + d0·a1·b2·c3`, which is
//!   invariant by construction and needs a single pass.

use crate::geometry::{quads_to_tensor, Quad};
use crate::nn::QuadRegressor;
use crate::{QuadInvError, Result};
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

/// Rotate a `(batch, vertices, features)` tensor along the vertex axis.
///
/// Output vertex `i` is input vertex `(i - shift) mod n`.
pub fn roll_vertices(x: &Array3<f32>, shift: usize) -> Array3<f32> {
    let n = x.len_of(Axis(1));
    if n == 0 {
        return x.clone();
    }

    let mut out = Array3::zeros(x.raw_dim());
    for i in 0..n {
        out.index_axis_mut(Axis(1), (i + shift) % n)
            .assign(&x.index_axis(Axis(1), i));
    }
    out
}

/// Average `process` over all cyclic rotations of the vertex axis.
///
/// The result is invariant to rotating `inputs` for any `process`, up to
/// floating-point rounding of the sum.
pub fn group_average<F>(inputs: &Array3<f32>, mut process: F) -> Result<Array2<f32>>
where
    F: FnMut(&Array3<f32>) -> Result<Array2<f32>>,
{
    let n = inputs.len_of(Axis(1));
    if n == 0 {
        return Err(QuadInvError::InvalidShape(
            "group averaging needs at least one vertex".to_string(),
        ));
    }

    let mut sum = process(inputs)?;
    for shift in 1..n {
        let out = process(&roll_vertices(inputs, shift))?;
        if out.dim() != sum.dim() {
            return Err(QuadInvError::InvalidShape(format!(
                "rotation {} produced {:?}, expected {:?}",
                shift,
                out.dim(),
                sum.dim()
            )));
        }
        sum += &out;
    }

    Ok(sum / n as f32)
}

/// How the channel groups are laid out along a vertex's feature axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// Channel `c` of slot `j` sits at `j * n + c`
    Interleaved,
    /// Channel `c` of slot `j` sits at `c * k + j`
    Blocked,
}

impl ChannelLayout {
    fn index(self, channel: usize, slot: usize, n: usize, k: usize) -> usize {
        match self {
            ChannelLayout::Interleaved => slot * n + channel,
            ChannelLayout::Blocked => channel * k + slot,
        }
    }
}

/// The individual cyclic product terms, shape `(n, batch, k)`.
///
/// Term `s` is `prod_c v[(s + c) mod n][channel c]` for every slot.
pub fn cyclic_terms(features: &Array3<f32>, layout: ChannelLayout) -> Result<Array3<f32>> {
    let (batch, n, width) = features.dim();
    if n == 0 {
        return Err(QuadInvError::InvalidShape(
            "cyclic product needs at least one vertex".to_string(),
        ));
    }
    if width % n != 0 {
        return Err(QuadInvError::InvalidShape(format!(
            "feature width {} is not a multiple of the {} vertices",
            width, n
        )));
    }
    let k = width / n;

    Ok(Array3::from_shape_fn((n, batch, k), |(s, b, j)| {
        (0..n)
            .map(|c| features[(b, (s + c) % n, layout.index(c, j, n, k))])
            .product()
    }))
}

/// Sum of the cyclic product terms, shape `(batch, width / n)`
pub fn cyclic_product_invariant(features: &Array3<f32>, layout: ChannelLayout) -> Result<Array2<f32>> {
    Ok(cyclic_terms(features, layout)?.sum_axis(Axis(0)))
}

/// Largest absolute change of a model's output over all relabellings of `quads`
pub fn max_rotation_deviation<M>(model: &M, quads: &[Quad]) -> Result<f32>
where
    M: QuadRegressor + ?Sized,
{
    let base = model.forward(&quads_to_tensor(quads))?;
    let mut worst = 0.0f32;

    for k in 1..crate::geometry::NUM_VERTICES {
        let rotated: Vec<Quad> = quads.iter().map(|q| q.rotated(k)).collect();
        let out = model.forward(&quads_to_tensor(&rotated))?;
        let deviation = (&out - &base)
            .iter()
            .fold(0.0f32, |acc, d| acc.max(d.abs()));
        worst = worst.max(deviation);
    }

    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roll_matches_rotation_convention() {
        let x = Array3::from_shape_fn((1, 4, 1), |(_, v, _)| v as f32);
        let rolled = roll_vertices(&x, 1);
        let values: Vec<f32> = rolled.iter().copied().collect();
        assert_eq!(values, vec![3.0, 0.0, 1.0, 2.0]);

        assert_eq!(roll_vertices(&x, 4), x);
    }

    #[test]
    fn test_group_average_of_first_vertex_is_centroid() {
        let x = array![[[0.0f32, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]];
        let out = group_average(&x, |q| Ok(q.index_axis(Axis(1), 0).to_owned())).unwrap();
        assert_eq!(out, array![[1.0f32, 1.0]]);
    }

    #[test]
    fn test_group_average_rejects_mismatched_outputs() {
        let x = Array3::<f32>::zeros((2, 4, 2));
        let mut calls = 0;
        let result = group_average(&x, |_| {
            calls += 1;
            Ok(Array2::zeros((2, calls)))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_cyclic_product_by_hand() {
        // one slot, channels laid out [c0, c1, c2, c3] for vertices a..d
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [5.0f32, 6.0, 7.0, 8.0];
        let c = [9.0f32, 10.0, 11.0, 12.0];
        let d = [13.0f32, 14.0, 15.0, 16.0];
        let rows = [a, b, c, d];
        let x = Array3::from_shape_fn((1, 4, 4), |(_, v, f)| rows[v][f]);

        let expected = a[0] * b[1] * c[2] * d[3]
            + b[0] * c[1] * d[2] * a[3]
            + c[0] * d[1] * a[2] * b[3]
            + d[0] * a[1] * b[2] * c[3];

        let out = cyclic_product_invariant(&x, ChannelLayout::Interleaved).unwrap();
        assert_eq!(out.dim(), (1, 1));
        assert_eq!(out[(0, 0)], expected);
    }

    #[test]
    fn test_layouts_address_different_features() {
        let x = Array3::from_shape_fn((1, 4, 8), |(_, v, f)| (v * 8 + f) as f32 + 1.0);
        let interleaved = cyclic_terms(&x, ChannelLayout::Interleaved).unwrap();
        let blocked = cyclic_terms(&x, ChannelLayout::Blocked).unwrap();

        // slot 1, term 0: interleaved reads feature 4 + c, blocked reads 2c + 1
        let inter: f32 = (0..4).map(|c| x[(0, c, 4 + c)]).product();
        let block: f32 = (0..4).map(|c| x[(0, c, 2 * c + 1)]).product();
        assert_eq!(interleaved[(0, 0, 1)], inter);
        assert_eq!(blocked[(0, 0, 1)], block);
    }

    #[test]
    fn test_cyclic_product_rejects_width() {
        let x = Array3::<f32>::zeros((1, 4, 6));
        assert!(cyclic_product_invariant(&x, ChannelLayout::Blocked).is_err());
    }
}
