//! Parameter snapshots on disk
//!
//! A run replicate lives in `<base>_<k>/checkpoints/`, holding JSON files
//! named `<prefix>-<step>.json`.

use super::model_config::{Architecture, CheckpointTag};
use crate::nn::{load_state_dict, LoadReport, Module, QuadRegressor, StateDict, Strictness};
use crate::utils::{load_json, save_json};
use crate::{QuadInvError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A saved model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Shape of the model the parameters belong to
    pub architecture: Architecture,
    /// Training step at which the snapshot was taken
    pub step: u64,
    /// Named parameters
    pub state: StateDict,
}

impl Checkpoint {
    /// Snapshot `model` at `step`
    pub fn capture<M: QuadRegressor + Module>(model: &M, step: u64) -> Self {
        Checkpoint {
            architecture: model.architecture(),
            step,
            state: model.state_dict(),
        }
    }
}

/// Directory of replicate `replicate` of the run at `base`
pub fn run_dir(base: &Path, replicate: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_{}", replicate));
    PathBuf::from(name)
}

/// File a checkpoint with `tag` at `step` is written to
pub fn checkpoint_path(base: &Path, replicate: usize, tag: CheckpointTag, step: u64) -> PathBuf {
    run_dir(base, replicate)
        .join("checkpoints")
        .join(format!("{}-{}.json", tag.prefix(), step))
}

/// Write `model` as the `tag` checkpoint of a replicate
pub fn save_checkpoint<M: QuadRegressor + Module>(
    model: &M,
    base: &Path,
    replicate: usize,
    tag: CheckpointTag,
    step: u64,
) -> Result<PathBuf> {
    let path = checkpoint_path(base, replicate, tag, step);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    save_json(&Checkpoint::capture(model, step), &path)?;
    debug!("saved checkpoint {}", path.display());
    Ok(path)
}

/// Most recent checkpoint with `tag` for a replicate.
///
/// Candidates are ordered by name length, then by name, so `best-10` sorts
/// after `best-9`.
pub fn find_checkpoint(base: &Path, replicate: usize, tag: CheckpointTag) -> Result<PathBuf> {
    let dir = run_dir(base, replicate).join("checkpoints");
    let entries = fs::read_dir(&dir)
        .map_err(|e| QuadInvError::CheckpointNotFound(format!("{}: {}", dir.display(), e)))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(tag.prefix()) && name.ends_with(".json") {
            candidates.push(name.to_string());
        }
    }

    candidates
        .into_iter()
        .max_by(|a, b| (a.len(), a).cmp(&(b.len(), b)))
        .map(|name| dir.join(name))
        .ok_or_else(|| {
            QuadInvError::CheckpointNotFound(format!(
                "no {} checkpoint in {}",
                tag.prefix(),
                dir.display()
            ))
        })
}

/// Restore `model` from the checkpoint at `path`.
///
/// The stored architecture must be of the same kind as the model.
pub fn load_checkpoint<M: QuadRegressor + Module>(
    path: &Path,
    model: &mut M,
    strictness: Strictness,
) -> Result<LoadReport> {
    let checkpoint: Checkpoint = load_json(path)?;
    let expected = model.architecture();
    if checkpoint.architecture.kind() != expected.kind() {
        return Err(QuadInvError::StateMismatch(format!(
            "{} holds a {} model, expected {}",
            path.display(),
            checkpoint.architecture.kind(),
            expected.kind()
        )));
    }

    let report = load_state_dict(model, &checkpoint.state, strictness)?;
    if !report.is_complete() {
        warn!(
            "partially restored {}: {} missing, {} ignored",
            path.display(),
            report.missing.len(),
            report.unexpected.len()
        );
    }
    debug!(
        "restored {} tensors from {} (step {})",
        report.restored.len(),
        path.display(),
        checkpoint.step
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Head;
    use rand::{rngs::StdRng, SeedableRng};

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "{}").unwrap();
    }

    #[test]
    fn test_run_dir_appends_replicate() {
        assert_eq!(
            run_dir(Path::new("work/area/avg_fc"), 3),
            PathBuf::from("work/area/avg_fc_3")
        );
    }

    #[test]
    fn test_find_checkpoint_orders_by_length_then_name() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("segment_net");
        let dir = run_dir(&base, 1).join("checkpoints");
        fs::create_dir_all(&dir).unwrap();
        for name in ["best-9.json", "best-10.json", "best-228.json", "best-31.json", "last_n-500.json", "best-999.txt"] {
            touch(&dir, name);
        }

        let best = find_checkpoint(&base, 1, CheckpointTag::Best).unwrap();
        assert_eq!(best, dir.join("best-228.json"));
        let last = find_checkpoint(&base, 1, CheckpointTag::Last).unwrap();
        assert_eq!(last, dir.join("last_n-500.json"));
    }

    #[test]
    fn test_missing_checkpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("maron");
        assert!(matches!(
            find_checkpoint(&base, 1, CheckpointTag::Best),
            Err(QuadInvError::CheckpointNotFound(_))
        ));

        fs::create_dir_all(run_dir(&base, 1).join("checkpoints")).unwrap();
        assert!(matches!(
            find_checkpoint(&base, 1, CheckpointTag::Best),
            Err(QuadInvError::CheckpointNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_restore() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("my_inv_fc");
        let arch = Architecture::AlgebraicMlp {
            num_features: 4,
            channel_width: 8,
        };

        let mut rng = StdRng::seed_from_u64(1);
        let saved = arch.build(Head::Regression, &mut rng).unwrap();
        save_checkpoint(&saved, &base, 2, CheckpointTag::Best, 17).unwrap();

        let mut fresh = arch.build(Head::Regression, &mut rng).unwrap();
        assert_ne!(fresh, saved);
        let path = find_checkpoint(&base, 2, CheckpointTag::Best).unwrap();
        let report = load_checkpoint(&path, &mut fresh, Strictness::Strict).unwrap();
        assert!(report.is_complete());
        let restored = fresh.state_dict();
        for (name, value) in saved.state_dict() {
            let diff = (&restored[&name] - &value).mapv(f32::abs);
            assert!(diff.iter().all(|d| *d < 1e-6), "{} differs", name);
        }

        let mut other = Architecture::Segment { num_features: 4 }
            .build(Head::Regression, &mut rng)
            .unwrap();
        assert!(load_checkpoint(&path, &mut other, Strictness::ExpectPartial).is_err());
    }
}
