//! Batch evaluation of trained replicates
//!
//! For every run and split, each replicate's checkpoint is restored and the
//! model is run over the shuffled split. Replicate MAEs are summarised by
//! their mean and population standard deviation; inference time by the same
//! statistics over all timed batches of the split except the first one.

use super::checkpoint::{find_checkpoint, load_checkpoint};
use super::loader::DataLoader;
use super::model_config::{EvalConfig, RunSpec};
use crate::nn::{split_path, AreaDataset, Head, QuadModel, QuadRegressor, Strictness};
use crate::utils::timing::Timer;
use crate::{QuadInvError, Result};
use log::{debug, info};
use ndarray::{Array1, Axis};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Summary row for one run on one split
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    /// Run name
    pub run: String,
    /// Split name
    pub split: String,
    /// Mean of the replicate MAEs
    pub mae_mean: f64,
    /// Population standard deviation of the replicate MAEs
    pub mae_std: f64,
    /// Mean seconds per batch forward pass
    pub time_mean: f64,
    /// Standard deviation of seconds per batch forward pass
    pub time_std: f64,
}

/// Outcome of running one replicate over one split
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplicaOutcome {
    /// Mean absolute error over all samples
    pub mae: f64,
    /// Seconds spent in each batch's forward pass, in order
    pub batch_times: Vec<f64>,
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for an empty slice
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Run `model` over every batch of `loader`
pub fn evaluate_replica<M: QuadRegressor + ?Sized>(model: &M, loader: DataLoader) -> Result<ReplicaOutcome> {
    let mut error_sum = 0.0f64;
    let mut count = 0usize;
    let mut batch_times = Vec::with_capacity(loader.num_batches());

    for (index, quads, targets) in loader {
        let timer = Timer::new("forward");
        let pred = model.forward(&quads)?;
        batch_times.push(timer.elapsed());

        let pred = pred.index_axis_move(Axis(1), 0);
        let errors: Array1<f32> = (&pred - &targets).mapv(f32::abs);
        error_sum += errors.iter().map(|e| *e as f64).sum::<f64>();
        count += errors.len();
        debug!("batch {}: mae {:.5}", index, errors.mean().unwrap_or(0.0));
    }

    if count == 0 {
        return Err(QuadInvError::Dataset("no samples to evaluate".to_string()));
    }
    Ok(ReplicaOutcome {
        mae: error_sum / count as f64,
        batch_times,
    })
}

/// Fold replicate outcomes into a summary row
pub fn summarize(run: &str, split: &str, outcomes: &[ReplicaOutcome]) -> EvalResult {
    let maes: Vec<f64> = outcomes.iter().map(|o| o.mae).collect();
    // the first forward pass of a split pays for warm-up
    let times: Vec<f64> = outcomes
        .iter()
        .flat_map(|o| o.batch_times.iter().copied())
        .skip(1)
        .collect();

    EvalResult {
        run: run.to_string(),
        split: split.to_string(),
        mae_mean: mean(&maes),
        mae_std: population_std(&maes),
        time_mean: mean(&times),
        time_std: population_std(&times),
    }
}

fn restore_replica(config: &EvalConfig, run: &RunSpec, replicate: usize) -> Result<QuadModel> {
    // parameters are overwritten by the checkpoint, the seed only fixes unrestored ones
    let mut rng = StdRng::seed_from_u64(replicate as u64);
    let mut model = run.architecture.build(Head::Regression, &mut rng)?;
    let path = find_checkpoint(&config.working_dir.join(&run.name), replicate, config.tag)?;
    load_checkpoint(&path, &mut model, Strictness::ExpectPartial)?;
    Ok(model)
}

/// Evaluate one run on one split over all replicates
pub fn evaluate_split(config: &EvalConfig, run: &RunSpec, split: &str, dataset: &AreaDataset) -> Result<EvalResult> {
    let mut outcomes = Vec::with_capacity(config.replicas);
    for replicate in 1..=config.replicas {
        let model = restore_replica(config, run, replicate)?;
        let seed = config.seed.map(|s| s.wrapping_add(replicate as u64));
        let loader = DataLoader::new(dataset.samples.clone(), config.batch_size, seed);
        let outcome = evaluate_replica(&model, loader)?;
        debug!("{} {} replicate {}: mae {:.5}", run.name, split, replicate, outcome.mae);
        outcomes.push(outcome);
    }

    let result = summarize(&run.name, split, &outcomes);
    info!(
        "{} {}: mae {:.5} +- {:.5}, {:.6}s per batch",
        result.run, result.split, result.mae_mean, result.mae_std, result.time_mean
    );
    Ok(result)
}

/// Evaluate every configured run on every split
pub fn evaluate(config: &EvalConfig) -> Result<Vec<EvalResult>> {
    config.validate()?;
    let mut results = Vec::new();
    for run in &config.runs {
        for split in &config.splits {
            let path = split_path(&config.scenario_path, split)?;
            let dataset = AreaDataset::load(&path)?;
            info!("{} on {} ({} samples)", run.name, path.display(), dataset.len());
            results.push(evaluate_split(config, run, split, &dataset)?);
        }
    }
    Ok(results)
}

/// Tab-separated rows `run, split, mae mean, mae std, time mean, time std`
pub fn format_results_tsv(results: &[EvalResult]) -> String {
    let mut out = String::new();
    for r in results {
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "{}\t{}\t{:.5}\t{:.5}\t{:.6}\t{:.6}",
            r.run, r.split, r.mae_mean, r.mae_std, r.time_mean, r.time_std
        );
    }
    out
}

/// Write the TSV artifact, creating parent directories
pub fn write_results_tsv(results: &[EvalResult], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, format_results_tsv(results))?;
    Ok(())
}

/// Fraction of probabilities on the correct side of 0.5
pub fn classification_accuracy(probabilities: &Array1<f32>, labels: &Array1<f32>) -> Result<f64> {
    if probabilities.len() != labels.len() {
        return Err(QuadInvError::InvalidShape(format!(
            "{} predictions for {} labels",
            probabilities.len(),
            labels.len()
        )));
    }
    if labels.is_empty() {
        return Ok(0.0);
    }
    let correct = probabilities
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| (**p >= 0.5) == (**l >= 0.5))
        .count();
    Ok(correct as f64 / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checkpoint::save_checkpoint;
    use crate::core::model_config::{Architecture, CheckpointTag};
    use crate::geometry::QuadSampler;
    use ndarray::array;

    #[test]
    fn test_statistics() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
        // population, not sample, deviation
        assert!((population_std(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(population_std(&[5.0]), 0.0);
    }

    #[test]
    fn test_summary_drops_first_batch_time_of_split() {
        let outcomes = vec![
            ReplicaOutcome {
                mae: 0.2,
                batch_times: vec![10.0, 1.0, 1.0],
            },
            ReplicaOutcome {
                mae: 0.4,
                batch_times: vec![3.0, 3.0],
            },
        ];
        let r = summarize("fc_avg", "val", &outcomes);
        assert!((r.mae_mean - 0.3).abs() < 1e-12);
        assert!((r.mae_std - 0.1).abs() < 1e-12);
        assert!((r.time_mean - 2.0).abs() < 1e-12);
        assert!((r.time_std - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tsv_format() {
        let r = EvalResult {
            run: "my_inv_fc".to_string(),
            split: "test".to_string(),
            mae_mean: 0.123456,
            mae_std: 0.01,
            time_mean: 0.0012344,
            time_std: 0.0,
        };
        assert_eq!(
            format_results_tsv(&[r]),
            "my_inv_fc\ttest\t0.12346\t0.01000\t0.001234\t0.000000\n"
        );
    }

    #[test]
    fn test_accuracy() {
        let p = array![0.9f32, 0.2, 0.6, 0.4];
        let l = array![1.0f32, 0.0, 0.0, 0.0];
        assert!((classification_accuracy(&p, &l).unwrap() - 0.75).abs() < 1e-12);
        assert!(classification_accuracy(&p, &array![1.0f32]).is_err());
    }

    #[test]
    fn test_evaluate_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        let sampler = QuadSampler::default();
        for (split, seed) in [("train", 1), ("test", 2)] {
            AreaDataset::generate(20, &sampler, seed)
                .unwrap()
                .save(&data_dir.join(split).join("area4.json"))
                .unwrap();
        }

        let run = RunSpec {
            name: "segment_net".to_string(),
            architecture: Architecture::Segment { num_features: 4 },
        };
        let working_dir = tmp.path().join("work");
        for replicate in 1..=2 {
            let mut rng = StdRng::seed_from_u64(100 + replicate as u64);
            let model = run.architecture.build(Head::Regression, &mut rng).unwrap();
            save_checkpoint(&model, &working_dir.join(&run.name), replicate, CheckpointTag::Best, 5).unwrap();
        }

        let config = EvalConfig {
            runs: vec![run],
            working_dir,
            scenario_path: data_dir.join("train").join("area4.json"),
            splits: vec!["train".to_string(), "test".to_string()],
            replicas: 2,
            batch_size: 8,
            output: tmp.path().join("out/area.tsv"),
            ..EvalConfig::default()
        };
        let results = evaluate(&config).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.mae_mean > 0.0 && r.time_mean >= 0.0));

        write_results_tsv(&results, &config.output).unwrap();
        let text = fs::read_to_string(&config.output).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("segment_net\ttrain\t"));

        let missing = EvalConfig {
            replicas: 3,
            ..config
        };
        assert!(matches!(evaluate(&missing), Err(QuadInvError::CheckpointNotFound(_))));
    }
}
