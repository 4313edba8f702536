//! Synthetic quadrilateral datasets

use crate::geometry::{points_to_tensor, quads_to_tensor, Point, Quad, QuadSampler};
use crate::utils::{load_json, save_json};
use crate::{QuadInvError, Result};
use ndarray::{Array1, Array2, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Quadrilaterals labelled with their area
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaDataset {
    /// `(quad, area)` pairs
    pub samples: Vec<(Quad, f32)>,
}

/// Quadrilateral and point, labelled 1.0 when the point is inside
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    /// The polygon
    pub quad: Quad,
    /// The probe point
    pub point: Point,
    /// 1.0 inside, 0.0 outside
    pub label: f32,
}

/// Point-inside classification samples
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInsideDataset {
    /// Samples
    pub samples: Vec<PointSample>,
}

/// Two quadrilaterals, labelled 1.0 when `inner` lies inside `outer`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairSample {
    /// Candidate container
    pub outer: Quad,
    /// Candidate contained quadrilateral
    pub inner: Quad,
    /// 1.0 contained, 0.0 otherwise
    pub label: f32,
}

/// Quad-in-quad classification samples
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadPairDataset {
    /// Samples
    pub samples: Vec<PairSample>,
}

// mixed into every path-derived seed
const DEFAULT_SEED: u64 = 444;

/// One seed per sample, all drawn from a single generator seeded with `seed`,
/// so nearby seeds give unrelated datasets
fn sample_seeds(seed: u64, n: usize) -> Vec<u64> {
    let mut root = StdRng::seed_from_u64(seed);
    (0..n).map(|_| root.gen()).collect()
}

/// Default seed for a dataset file, distinct per path (FNV-1a over the path)
pub fn seed_for_path(path: &Path) -> u64 {
    path.to_string_lossy()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64 ^ DEFAULT_SEED, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

fn check_samples<T>(samples: &[T], path: &Path) -> Result<()> {
    if samples.is_empty() {
        return Err(QuadInvError::Dataset(format!("{} has no samples", path.display())));
    }
    Ok(())
}

fn check_sampler(sampler: &QuadSampler) -> Result<()> {
    sampler.validate().map_err(QuadInvError::InvalidConfig)
}

impl AreaDataset {
    /// Draw `n` random quadrilaterals, deterministic per `seed`
    pub fn generate(n: usize, sampler: &QuadSampler, seed: u64) -> Result<Self> {
        check_sampler(sampler)?;
        let samples = sample_seeds(seed, n)
            .into_par_iter()
            .map(|sample_seed| {
                let quad = sampler.sample(&mut StdRng::seed_from_u64(sample_seed));
                (quad, quad.area())
            })
            .collect();
        Ok(AreaDataset { samples })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All quads and targets as tensors
    pub fn to_tensors(&self) -> (Array3<f32>, Array1<f32>) {
        let quads: Vec<Quad> = self.samples.iter().map(|(q, _)| *q).collect();
        let areas = self.samples.iter().map(|(_, a)| *a).collect();
        (quads_to_tensor(&quads), areas)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let dataset: AreaDataset = load_json(path)?;
        check_samples(&dataset.samples, path)?;
        Ok(dataset)
    }

    /// Save as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }
}

impl PointInsideDataset {
    /// Draw `n` quad/point pairs; points come from the same sampler's extent
    pub fn generate(n: usize, sampler: &QuadSampler, seed: u64) -> Result<Self> {
        check_sampler(sampler)?;
        let samples = sample_seeds(seed, n)
            .into_par_iter()
            .map(|sample_seed| {
                let mut rng = StdRng::seed_from_u64(sample_seed);
                let quad = sampler.sample(&mut rng);
                let point = sampler.sample_point(&mut rng);
                let label = if quad.contains(&point) { 1.0 } else { 0.0 };
                PointSample { quad, point, label }
            })
            .collect();
        Ok(PointInsideDataset { samples })
    }

    /// Quads `(b, 4, 2)`, points `(b, 2)` and labels `(b)`
    pub fn to_tensors(&self) -> (Array3<f32>, Array2<f32>, Array1<f32>) {
        let quads: Vec<Quad> = self.samples.iter().map(|s| s.quad).collect();
        let points: Vec<Point> = self.samples.iter().map(|s| s.point).collect();
        let labels = self.samples.iter().map(|s| s.label).collect();
        (quads_to_tensor(&quads), points_to_tensor(&points), labels)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let dataset: Self = load_json(path)?;
        check_samples(&dataset.samples, path)?;
        Ok(dataset)
    }

    /// Save as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }
}

impl QuadPairDataset {
    /// Draw `n` quad pairs; half the inner quads are shrunk copies placed
    /// inside the outer one, the rest are independent draws
    pub fn generate(n: usize, sampler: &QuadSampler, seed: u64) -> Result<Self> {
        check_sampler(sampler)?;
        let samples = sample_seeds(seed, n)
            .into_par_iter()
            .map(|sample_seed| {
                let mut rng = StdRng::seed_from_u64(sample_seed);
                let outer = sampler.sample(&mut rng);
                let inner = if rng.gen_bool(0.5) {
                    shrink_towards_centroid(&sampler.sample(&mut rng), &outer, &mut rng)
                } else {
                    sampler.sample(&mut rng)
                };
                let label = if outer.contains_quad(&inner) { 1.0 } else { 0.0 };
                PairSample { outer, inner, label }
            })
            .collect();
        Ok(QuadPairDataset { samples })
    }

    /// Outer quads, inner quads and labels
    pub fn to_tensors(&self) -> (Array3<f32>, Array3<f32>, Array1<f32>) {
        let outer: Vec<Quad> = self.samples.iter().map(|s| s.outer).collect();
        let inner: Vec<Quad> = self.samples.iter().map(|s| s.inner).collect();
        let labels = self.samples.iter().map(|s| s.label).collect();
        (quads_to_tensor(&outer), quads_to_tensor(&inner), labels)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let dataset: Self = load_json(path)?;
        check_samples(&dataset.samples, path)?;
        Ok(dataset)
    }

    /// Save as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }
}

// Scale `quad` about its centroid and move it onto the centroid of `target`.
fn shrink_towards_centroid<R: Rng + ?Sized>(quad: &Quad, target: &Quad, rng: &mut R) -> Quad {
    let centroid = |q: &Quad| {
        let (sx, sy) = q
            .vertices()
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        (sx / 4.0, sy / 4.0)
    };
    let (cx, cy) = centroid(quad);
    let (tx, ty) = centroid(target);
    let scale = rng.gen_range(0.05..0.3);

    let mut vertices = *quad.vertices();
    for v in vertices.iter_mut() {
        *v = Point::new(tx + (v.x - cx) * scale, ty + (v.y - cy) * scale);
    }
    Quad::new(vertices)
}

/// The path of another split of a scenario: the last `train` in `path` is
/// replaced with `split`
///
/// Fails for any split other than `train` when `path` has no `train` in it.
pub fn split_path(path: &Path, split: &str) -> Result<PathBuf> {
    if split == "train" {
        return Ok(path.to_path_buf());
    }
    let text = path.to_str().ok_or_else(|| {
        QuadInvError::InvalidConfig(format!("scenario path {} is not UTF-8", path.display()))
    })?;
    let at = text.rfind("train").ok_or_else(|| {
        QuadInvError::InvalidConfig(format!(
            "scenario path {} has no `train` to replace with `{}`",
            text, split
        ))
    })?;
    Ok(PathBuf::from(format!("{}{}{}", &text[..at], split, &text[at + "train".len()..])))
}
