//! Invariance constructions, configuration, checkpoints and evaluation

mod invariance;
mod model_config;
mod checkpoint;
mod loader;
mod evaluation;

pub use invariance::{
    cyclic_product_invariant, cyclic_terms, group_average, max_rotation_deviation, roll_vertices,
    ChannelLayout,
};
pub use model_config::{Architecture, CheckpointTag, EvalConfig, RunSpec, MAX_POLYNOMIAL_DEGREE};
pub use checkpoint::{
    checkpoint_path, find_checkpoint, load_checkpoint, run_dir, save_checkpoint, Checkpoint,
};
pub use loader::{Batch, DataLoader};
pub use evaluation::{
    classification_accuracy, evaluate, evaluate_replica, evaluate_split, format_results_tsv, mean,
    population_std, summarize, write_results_tsv, EvalResult, ReplicaOutcome,
};
