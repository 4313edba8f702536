//! Random quadrilateral generation

use super::quad::{Point, Quad, NUM_VERTICES};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Draws random star-shaped quadrilaterals around a centre point
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadSampler {
    /// Smallest distance of a vertex from the centre
    pub min_radius: f32,
    /// Largest distance of a vertex from the centre
    pub max_radius: f32,
    /// Half-width of the random translation applied to the whole quad
    pub shift: f32,
}

impl Default for QuadSampler {
    fn default() -> Self {
        QuadSampler {
            min_radius: 0.5,
            max_radius: 2.0,
            shift: 0.0,
        }
    }
}

impl QuadSampler {
    /// Sampler with a random translation in `[-shift, shift]^2`
    pub fn with_shift(mut self, shift: f32) -> Self {
        self.shift = shift;
        self
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_radius > 0.0) {
            return Err("min_radius must be positive".to_string());
        }
        if self.max_radius < self.min_radius {
            return Err("max_radius must not be below min_radius".to_string());
        }
        if self.shift < 0.0 {
            return Err("shift must not be negative".to_string());
        }
        Ok(())
    }

    /// Sample one quadrilateral; the starting vertex is random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Quad {
        // jitter stays below a quarter turn per vertex, so every angular gap is
        // under pi and the quad is star-shaped around the centre
        let sector = TAU / NUM_VERTICES as f32;
        let jitter = 0.45 * sector;
        let phase = rng.gen_range(0.0..TAU);
        let angles: [f32; NUM_VERTICES] = std::array::from_fn(|i| {
            phase + i as f32 * sector + rng.gen_range(-jitter..jitter)
        });

        let vertices = angles.map(|theta| {
            let r = if self.max_radius > self.min_radius {
                rng.gen_range(self.min_radius..self.max_radius)
            } else {
                self.min_radius
            };
            Point::new(r * theta.cos(), r * theta.sin())
        });

        let quad = Quad::new(vertices).rotated(rng.gen_range(0..NUM_VERTICES));
        if self.shift > 0.0 {
            quad.translated(
                rng.gen_range(-self.shift..=self.shift),
                rng.gen_range(-self.shift..=self.shift),
            )
        } else {
            quad
        }
    }

    /// Sample a point inside the sampler's bounding box
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let extent = self.max_radius + self.shift;
        Point::new(
            rng.gen_range(-extent..=extent),
            rng.gen_range(-extent..=extent),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_samples_are_counter_clockwise_and_bounded() {
        let sampler = QuadSampler::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let quad = sampler.sample(&mut rng);
            assert!(quad.signed_area() >= 0.0);
            for v in quad.vertices() {
                let r = (v.x * v.x + v.y * v.y).sqrt();
                assert!(r <= sampler.max_radius + 1e-4);
            }
        }
    }

    #[test]
    fn test_shift_moves_quads() {
        let sampler = QuadSampler::default().with_shift(10.0);
        let mut rng = StdRng::seed_from_u64(3);
        let far = (0..50)
            .map(|_| sampler.sample(&mut rng))
            .any(|q| q.vertex(0).x.abs() > sampler.max_radius);
        assert!(far);
    }

    #[test]
    fn test_validate() {
        assert!(QuadSampler::default().validate().is_ok());
        let bad = QuadSampler {
            min_radius: 2.0,
            max_radius: 1.0,
            shift: 0.0,
        };
        assert!(bad.validate().is_err());
    }
}
