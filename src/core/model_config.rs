//! Architecture descriptions and evaluation configuration

use crate::nn::{
    AlgebraicConv, AlgebraicMlp, AveragedConv, AveragedMlp, Head, MessagePassing,
    PolynomialInvariant, QuadModel, SegmentNet,
};
use crate::{QuadInvError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Highest monomial degree a polynomial model accepts (6435 monomials)
pub const MAX_POLYNOMIAL_DEGREE: usize = 8;

// C(degree + 7, 7): monomials of `degree` in the 8 coordinates
fn monomial_count(degree: usize) -> usize {
    (1..=7).fold(1, |acc, k| acc * (degree + k) / k)
}

/// Neural network architecture for quadrilateral inputs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Architecture {
    /// MLP over the flattened quad, averaged over rotations
    AveragedMlp {
        /// Width of the last hidden layer
        num_features: usize,
    },
    /// Wrap-padded convolutions, averaged over rotations
    AveragedConv {
        /// Width of the last hidden layer
        num_features: usize,
        /// Channels of the second convolution
        conv_width: usize,
    },
    /// Shared edge encoder summed over the 4 edges
    Segment {
        /// Width of the last hidden layer
        num_features: usize,
    },
    /// Per-vertex MLP followed by the cyclic product
    AlgebraicMlp {
        /// Width of the last hidden layer
        num_features: usize,
        /// Slots per channel group
        channel_width: usize,
    },
    /// Wrap-padded convolutions followed by the cyclic product
    AlgebraicConv {
        /// Width of the last hidden layer
        num_features: usize,
        /// Slots per channel group
        channel_width: usize,
    },
    /// Message passing on the 4-cycle
    MessagePassing {
        /// Width of node states and messages
        hidden_dim: usize,
        /// Number of message/update rounds
        rounds: usize,
    },
    /// Monomials of the coordinates summed over the vertex relabellings
    Polynomial {
        /// Width of the last hidden layer
        num_features: usize,
        /// Total degree of every monomial
        degree: usize,
        /// Approximate each monomial with a small product network
        learned_products: bool,
    },
}

impl Architecture {
    /// Default-shaped architecture for an experiment run name
    /// (`my_inv_conv_none_tanh` resolves as `my_inv_conv`)
    pub fn from_run_name(name: &str, num_features: usize) -> Result<Self> {
        const PREFIXES: [&str; 9] = [
            "my_inv_conv",
            "my_inv_fc",
            "avg_conv",
            "conv_avg",
            "avg_fc",
            "fc_avg",
            "segment_net",
            "maron",
            "message_passing",
        ];
        let prefix = PREFIXES
            .iter()
            .find(|p| name.starts_with(*p))
            .ok_or_else(|| QuadInvError::InvalidConfig(format!("unknown run name {}", name)))?;

        Ok(match *prefix {
            "my_inv_conv" => Architecture::AlgebraicConv {
                num_features,
                channel_width: 128,
            },
            "my_inv_fc" => Architecture::AlgebraicMlp {
                num_features,
                channel_width: 64,
            },
            "avg_conv" | "conv_avg" => Architecture::AveragedConv {
                num_features,
                conv_width: 128,
            },
            "avg_fc" | "fc_avg" => Architecture::AveragedMlp { num_features },
            "segment_net" => Architecture::Segment { num_features },
            "maron" => Architecture::Polynomial {
                num_features,
                degree: 4,
                learned_products: true,
            },
            _ => Architecture::MessagePassing {
                hidden_dim: 32,
                rounds: 1,
            },
        })
    }

    /// Short name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Architecture::AveragedMlp { .. } => "averaged_mlp",
            Architecture::AveragedConv { .. } => "averaged_conv",
            Architecture::Segment { .. } => "segment",
            Architecture::AlgebraicMlp { .. } => "algebraic_mlp",
            Architecture::AlgebraicConv { .. } => "algebraic_conv",
            Architecture::MessagePassing { .. } => "message_passing",
            Architecture::Polynomial { .. } => "polynomial",
        }
    }

    /// Whether the output is invariant to cyclic relabelling by construction
    pub fn is_cyclic_invariant(&self) -> bool {
        !matches!(self, Architecture::MessagePassing { .. })
    }

    /// Validate sizes; polynomial degrees are capped at [`MAX_POLYNOMIAL_DEGREE`]
    pub fn validate(&self) -> Result<()> {
        let positive = |value: usize, what: &str| {
            if value == 0 {
                Err(QuadInvError::InvalidConfig(format!("{} must be positive", what)))
            } else {
                Ok(())
            }
        };

        match *self {
            Architecture::AveragedMlp { num_features } | Architecture::Segment { num_features } => {
                positive(num_features, "num_features")
            }
            Architecture::AveragedConv {
                num_features,
                conv_width,
            } => {
                positive(num_features, "num_features")?;
                positive(conv_width, "conv_width")
            }
            Architecture::AlgebraicMlp {
                num_features,
                channel_width,
            }
            | Architecture::AlgebraicConv {
                num_features,
                channel_width,
            } => {
                positive(num_features, "num_features")?;
                positive(channel_width, "channel_width")
            }
            Architecture::MessagePassing { hidden_dim, rounds } => {
                positive(hidden_dim, "hidden_dim")?;
                positive(rounds, "rounds")
            }
            Architecture::Polynomial {
                num_features,
                degree,
                ..
            } => {
                positive(num_features, "num_features")?;
                positive(degree, "degree")?;
                if degree > MAX_POLYNOMIAL_DEGREE {
                    return Err(QuadInvError::InvalidConfig(format!(
                        "degree {} exceeds {} ({} monomials)",
                        degree,
                        MAX_POLYNOMIAL_DEGREE,
                        monomial_count(degree)
                    )));
                }
                Ok(())
            }
        }
    }

    /// Build a freshly initialised model
    pub fn build<R: Rng + ?Sized>(&self, head: Head, rng: &mut R) -> Result<QuadModel> {
        self.validate()?;
        Ok(match *self {
            Architecture::AveragedMlp { num_features } => {
                QuadModel::AveragedMlp(AveragedMlp::new(num_features, head, rng))
            }
            Architecture::AveragedConv {
                num_features,
                conv_width,
            } => QuadModel::AveragedConv(AveragedConv::new(num_features, conv_width, head, rng)),
            Architecture::Segment { num_features } => {
                QuadModel::Segment(SegmentNet::new(num_features, head, rng))
            }
            Architecture::AlgebraicMlp {
                num_features,
                channel_width,
            } => QuadModel::AlgebraicMlp(AlgebraicMlp::new(num_features, channel_width, head, rng)),
            Architecture::AlgebraicConv {
                num_features,
                channel_width,
            } => QuadModel::AlgebraicConv(AlgebraicConv::new(num_features, channel_width, head, rng)),
            Architecture::MessagePassing { hidden_dim, rounds } => {
                if head == Head::Features {
                    return Err(QuadInvError::InvalidConfig(
                        "message passing has no feature head".to_string(),
                    ));
                }
                QuadModel::MessagePassing(MessagePassing::new(hidden_dim, rounds, rng))
            }
            Architecture::Polynomial {
                num_features,
                degree,
                learned_products,
            } => QuadModel::Polynomial(PolynomialInvariant::new(
                num_features,
                degree,
                learned_products,
                head,
                rng,
            )),
        })
    }
}

/// One evaluated run: a name and the architecture its checkpoints hold
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Run name; replicate directories are `<name>_<k>`
    pub name: String,
    /// Architecture of every replicate
    pub architecture: Architecture,
}

impl RunSpec {
    /// Run whose architecture is inferred from its name
    pub fn from_name(name: &str, num_features: usize) -> Result<Self> {
        Ok(RunSpec {
            name: name.to_string(),
            architecture: Architecture::from_run_name(name, num_features)?,
        })
    }

    /// One run per feature width, named `<name>_<width>`
    pub fn sweep(name: &str, widths: &[usize]) -> Result<Vec<Self>> {
        widths
            .iter()
            .map(|&width| {
                Ok(RunSpec {
                    name: format!("{}_{}", name, width),
                    architecture: Architecture::from_run_name(name, width)?,
                })
            })
            .collect()
    }
}

/// Which checkpoint of a run to restore
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTag {
    /// Best validation score
    Best,
    /// Most recent
    Last,
}

impl CheckpointTag {
    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            CheckpointTag::Best => "best",
            CheckpointTag::Last => "last_n",
        }
    }
}

/// Evaluation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Runs to evaluate
    pub runs: Vec<RunSpec>,
    /// Directory holding the `<run>_<k>` replicate directories
    pub working_dir: PathBuf,
    /// Training split dataset; other splits replace `train` in the path
    pub scenario_path: PathBuf,
    /// Splits to evaluate
    pub splits: Vec<String>,
    /// Replicates `1..=replicas` are evaluated
    pub replicas: usize,
    /// Batch size
    pub batch_size: usize,
    /// Which checkpoint to restore
    pub tag: CheckpointTag,
    /// Shuffle seed
    pub seed: Option<u64>,
    /// Output TSV
    pub output: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            runs: Vec::new(),
            working_dir: PathBuf::from("./working_dir/area"),
            scenario_path: PathBuf::from("./data/train/area4.json"),
            splits: vec!["train".to_string(), "val".to_string(), "test".to_string()],
            replicas: 9,
            batch_size: 64,
            tag: CheckpointTag::Best,
            seed: Some(444),
            output: PathBuf::from("./results/area.tsv"),
        }
    }
}

impl EvalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.runs.is_empty() {
            return Err(QuadInvError::InvalidConfig("no runs to evaluate".to_string()));
        }
        if self.splits.is_empty() {
            return Err(QuadInvError::InvalidConfig("no splits to evaluate".to_string()));
        }
        if self.replicas == 0 {
            return Err(QuadInvError::InvalidConfig("replicas must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(QuadInvError::InvalidConfig("batch size must be positive".to_string()));
        }
        for run in &self.runs {
            run.architecture.validate()?;
        }
        Ok(())
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let config: EvalConfig = crate::utils::load_json(path)?;
        config.validate()?;
        Ok(config)
    }
}
