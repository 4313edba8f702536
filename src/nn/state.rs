//! Named parameter dictionaries and partial restoration

use crate::{QuadInvError, Result};
use ndarray::{Array, ArrayD, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name to array, e.g. `features.0.weight`
pub type StateDict = BTreeMap<String, ArrayD<f32>>;

/// How to treat names present on only one side when restoring
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Every model parameter must be restored and nothing else may be stored
    Strict,
    /// Restore what matches, report the rest
    ExpectPartial,
}

/// Outcome of restoring a state dictionary
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Parameters that were overwritten
    pub restored: Vec<String>,
    /// Model parameters absent from the dictionary
    pub missing: Vec<String>,
    /// Stored names the model does not have
    pub unexpected: Vec<String>,
}

impl LoadReport {
    /// Whether every parameter matched on both sides
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Something with named parameters
pub trait Module {
    /// Insert every parameter under `prefix`
    fn export_state(&self, prefix: &str, state: &mut StateDict);

    /// Overwrite parameters found in `state`, noting missing ones in `report`
    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()>;

    /// All parameters with their full names
    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        self.export_state("", &mut state);
        state
    }

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.state_dict().values().map(|a| a.len()).sum()
    }
}

impl<M: Module> Module for Vec<M> {
    fn export_state(&self, prefix: &str, state: &mut StateDict) {
        for (i, layer) in self.iter().enumerate() {
            layer.export_state(&join(prefix, &i.to_string()), state);
        }
    }

    fn import_state(&mut self, prefix: &str, state: &StateDict, report: &mut LoadReport) -> Result<()> {
        for (i, layer) in self.iter_mut().enumerate() {
            layer.import_state(&join(prefix, &i.to_string()), state, report)?;
        }
        Ok(())
    }
}

/// Restore `module` from `state`.
///
/// Shape mismatches are always errors; names present on only one side are
/// errors only under [`Strictness::Strict`].
pub fn load_state_dict<M: Module + ?Sized>(
    module: &mut M,
    state: &StateDict,
    strictness: Strictness,
) -> Result<LoadReport> {
    let current = module.state_dict();

    // reject before touching any parameter, so a failed load leaves the module as it was
    for (name, value) in &current {
        if let Some(stored) = state.get(name) {
            if stored.shape() != value.shape() {
                return Err(QuadInvError::StateMismatch(format!(
                    "{} has shape {:?}, model expects {:?}",
                    name,
                    stored.shape(),
                    value.shape()
                )));
            }
        }
    }
    let missing: Vec<String> = current
        .keys()
        .filter(|name| !state.contains_key(*name))
        .cloned()
        .collect();
    let unexpected: Vec<String> = state
        .keys()
        .filter(|name| !current.contains_key(*name))
        .cloned()
        .collect();
    if strictness == Strictness::Strict && !(missing.is_empty() && unexpected.is_empty()) {
        return Err(QuadInvError::StateMismatch(format!(
            "missing {:?}, unexpected {:?}",
            missing, unexpected
        )));
    }

    let mut report = LoadReport::default();
    module.import_state("", state, &mut report)?;
    report.unexpected = unexpected;
    Ok(report)
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

pub(crate) fn restore<D: Dimension>(
    target: &mut Array<f32, D>,
    name: String,
    state: &StateDict,
    report: &mut LoadReport,
) -> Result<()> {
    let Some(stored) = state.get(&name) else {
        report.missing.push(name);
        return Ok(());
    };

    if stored.shape() != target.shape() {
        return Err(QuadInvError::StateMismatch(format!(
            "{} has shape {:?}, model expects {:?}",
            name,
            stored.shape(),
            target.shape()
        )));
    }

    *target = stored.clone().into_dimensionality::<D>()?;
    report.restored.push(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::layers::{Activation, Dense};
    use rand::{rngs::StdRng, SeedableRng};

    fn two_layers(seed: u64) -> Vec<Dense> {
        let mut rng = StdRng::seed_from_u64(seed);
        vec![
            Dense::new(2, 3, Activation::Tanh, &mut rng),
            Dense::new(3, 1, Activation::Linear, &mut rng),
        ]
    }

    #[test]
    fn test_state_names() {
        let names: Vec<String> = two_layers(0).state_dict().into_keys().collect();
        assert_eq!(names, vec!["0.bias", "0.weight", "1.bias", "1.weight"]);
    }

    #[test]
    fn test_strict_roundtrip() {
        let source = two_layers(1);
        let mut target = two_layers(2);
        assert_ne!(source, target);

        let report = load_state_dict(&mut target, &source.state_dict(), Strictness::Strict).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.restored.len(), 4);
        assert_eq!(source, target);
    }

    #[test]
    fn test_expect_partial_ignores_extras() {
        let mut state = two_layers(1).state_dict();
        state.remove("1.bias");
        state.insert("optimizer.step".to_string(), ArrayD::zeros(vec![1]));

        let mut target = two_layers(2);
        assert!(load_state_dict(&mut target, &state, Strictness::Strict).is_err());
        assert_eq!(target, two_layers(2));

        let mut target = two_layers(2);
        let report = load_state_dict(&mut target, &state, Strictness::ExpectPartial).unwrap();
        assert_eq!(report.missing, vec!["1.bias".to_string()]);
        assert_eq!(report.unexpected, vec!["optimizer.step".to_string()]);
        assert_eq!(report.restored.len(), 3);
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let mut state = two_layers(1).state_dict();
        state.insert("0.bias".to_string(), ArrayD::zeros(vec![5]));

        let mut target = two_layers(2);
        assert!(load_state_dict(&mut target, &state, Strictness::ExpectPartial).is_err());
        // 0.weight sorts after 0.bias but must not have been restored either
        assert_eq!(target, two_layers(2));
    }
}
