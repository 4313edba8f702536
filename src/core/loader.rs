//! Shuffled mini-batches of quadrilateral samples

use crate::geometry::{quads_to_tensor, Quad};
use ndarray::{Array1, Array3};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// One mini-batch: its index, quads `(b, 4, 2)` and targets `(b)`
pub type Batch = (usize, Array3<f32>, Array1<f32>);

/// Iterates over `(quad, target)` pairs in batches
pub struct DataLoader {
    data: Vec<(Quad, f32)>,
    batch_size: usize,
    rng: Option<StdRng>,
    current_idx: usize,
    batch_idx: usize,
}

impl DataLoader {
    /// Create a loader; `seed` enables shuffling, `None` keeps file order
    pub fn new(data: Vec<(Quad, f32)>, batch_size: usize, seed: Option<u64>) -> Self {
        let mut loader = DataLoader {
            data,
            batch_size: batch_size.max(1),
            rng: seed.map(StdRng::seed_from_u64),
            current_idx: 0,
            batch_idx: 0,
        };
        loader.shuffle_data();
        loader
    }

    fn shuffle_data(&mut self) {
        if let Some(rng) = &mut self.rng {
            self.data.shuffle(rng);
        }
    }

    /// Rewind, reshuffling if enabled
    pub fn reset(&mut self) {
        self.current_idx = 0;
        self.batch_idx = 0;
        self.shuffle_data();
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of batches per pass
    pub fn num_batches(&self) -> usize {
        self.data.len().div_ceil(self.batch_size)
    }
}

impl Iterator for DataLoader {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.current_idx >= self.data.len() {
            return None;
        }

        let end_idx = (self.current_idx + self.batch_size).min(self.data.len());
        let slice = &self.data[self.current_idx..end_idx];
        let quads: Vec<Quad> = slice.iter().map(|(q, _)| *q).collect();
        let targets = slice.iter().map(|(_, t)| *t).collect();
        let index = self.batch_idx;

        self.current_idx = end_idx;
        self.batch_idx += 1;
        Some((index, quads_to_tensor(&quads), targets))
    }
}
