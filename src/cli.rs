use crate::{
    model::BackboneConfig,
    training::{train, TrainOptions, TrainingConfig},
    Result,
};
use burn::{config::Config, optim::AdamConfig, tensor::backend::AutodiffBackend};
use clap::Parser;
use std::path::PathBuf;

/// Trains a two-layer classifier on MNIST with a stratified validation split.
///
/// Hyperparameters left unset fall back to the `--config` file when given,
/// otherwise to the training defaults.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[arg(long, alias = "batch_size")]
    pub batch_size: Option<usize>,
    /// Width of the hidden layer.
    #[arg(long, alias = "hidden_dim")]
    pub hidden_dim: Option<usize>,
    #[arg(long)]
    pub num_workers: Option<usize>,
    #[arg(long)]
    pub random_seed: Option<u64>,
    /// Fraction of the training set used for validation.
    #[arg(long)]
    pub val_size: Option<f64>,
    #[arg(long, alias = "learning_rate")]
    pub learning_rate: Option<f64>,
    #[arg(long, visible_alias = "max-epochs")]
    pub num_epochs: Option<usize>,
    /// Evaluate the model on the official test set after training.
    #[arg(long)]
    pub evaluate: bool,
    /// Where config, checkpoints, metric logs and the model are written.
    #[arg(long, default_value = "/tmp/mnist-classifier")]
    pub artifact_dir: String,
    /// Resume training from the checkpoint saved at this epoch.
    #[arg(long, value_name = "EPOCH")]
    pub resume_from: Option<usize>,
    /// Training config to start from, e.g. the `config.json` of a previous run.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Effective hyperparameters: the base config with explicit flags applied.
    pub fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)?,
            None => TrainingConfig::new(BackboneConfig::new(), AdamConfig::new()),
        };

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(hidden_dim) = self.hidden_dim {
            config.backbone.hidden_dim = hidden_dim;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        if let Some(seed) = self.random_seed {
            config.seed = seed;
        }
        if let Some(val_size) = self.val_size {
            config.val_size = val_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }

        Ok(config)
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            evaluate: self.evaluate,
            resume_from: self.resume_from,
        }
    }

    /// Trains on `device` and prints the test report when one is produced.
    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<()> {
        let config = self.training_config()?;
        log::info!("Training with {config}");

        let report = train::<B>(&self.artifact_dir, config, device, self.train_options())?;
        if let Some(report) = report {
            println!("{report}");
        }

        Ok(())
    }
}
