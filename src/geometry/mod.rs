//! Plane geometry of quadrilaterals and conversion to network inputs

mod quad;
mod sampler;

pub use quad::{Point, Quad, NUM_VERTICES};
pub use sampler::QuadSampler;

use crate::{QuadInvError, Result};
use ndarray::{Array2, Array3};

/// Stack quadrilaterals into a `(batch, 4, 2)` tensor
pub fn quads_to_tensor(quads: &[Quad]) -> Array3<f32> {
    Array3::from_shape_fn((quads.len(), NUM_VERTICES, 2), |(b, v, c)| {
        let p = quads[b].vertex(v);
        if c == 0 {
            p.x
        } else {
            p.y
        }
    })
}

/// Inverse of [`quads_to_tensor`]
pub fn tensor_to_quads(tensor: &Array3<f32>) -> Result<Vec<Quad>> {
    let (batch, n, c) = tensor.dim();
    if n != NUM_VERTICES || c != 2 {
        return Err(QuadInvError::InvalidShape(format!(
            "expected (batch, {}, 2), got ({}, {}, {})",
            NUM_VERTICES, batch, n, c
        )));
    }

    Ok((0..batch)
        .map(|b| {
            Quad::new(std::array::from_fn(|v| {
                Point::new(tensor[(b, v, 0)], tensor[(b, v, 1)])
            }))
        })
        .collect())
}

/// Stack points into a `(batch, 2)` tensor
pub fn points_to_tensor(points: &[Point]) -> Array2<f32> {
    Array2::from_shape_fn((points.len(), 2), |(b, c)| {
        if c == 0 {
            points[b].x
        } else {
            points[b].y
        }
    })
}
