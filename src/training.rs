use crate::{
    data::{MnistBatch, MnistBatcher, MnistData},
    evaluation::{evaluate, TestReport},
    model::{BackboneConfig, ImageClassifier},
};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{vision::MnistItem, Dataset},
    },
    module::AutodiffModule,
    optim::{AdamConfig, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        metric::{AccuracyMetric, LossMetric},
        LearnerBuilder,
    },
};
use std::sync::Arc;

#[derive(Config)]
pub struct TrainingConfig {
    pub backbone: BackboneConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    /// Loader threads. Zero loads batches on the calling thread.
    #[config(default = 8)]
    pub num_workers: usize,
    #[config(default = 1234)]
    pub seed: u64,
    /// Fraction of the training set held out for validation.
    #[config(default = 0.15)]
    pub val_size: f64,
    #[config(default = 1.0e-4)]
    pub learning_rate: f64,
}

impl TrainingConfig {
    /// Optimizer updating the classifier's parameters. The learning rate is
    /// handed to the learner separately as a constant schedule.
    pub fn configure_optimizer<B: AutodiffBackend>(
        &self,
    ) -> impl Optimizer<ImageClassifier<B>, B> {
        self.optimizer.init()
    }
}

/// Run options that are not hyperparameters.
#[derive(Clone, Debug, Default)]
pub struct TrainOptions {
    /// Evaluate on the official test set after fitting.
    pub evaluate: bool,
    /// Resume from the checkpoint written at the end of this epoch.
    pub resume_from: Option<usize>,
}

/// Loaders for the three subsets of a run. Validation and test batches live on
/// the inner backend since they never need gradients.
pub struct Dataloaders<B: AutodiffBackend> {
    pub train: Arc<dyn DataLoader<MnistBatch<B>>>,
    pub valid: Arc<dyn DataLoader<MnistBatch<B::InnerBackend>>>,
    pub test: Arc<dyn DataLoader<MnistBatch<B::InnerBackend>>>,
}

fn dataloader<B, D>(
    config: &TrainingConfig,
    device: B::Device,
    dataset: D,
) -> Arc<dyn DataLoader<MnistBatch<B>>>
where
    B: Backend,
    D: Dataset<MnistItem> + 'static,
{
    let mut builder = DataLoaderBuilder::new(MnistBatcher::<B>::new(device))
        .batch_size(config.batch_size);

    // burn always spawns threads once `num_workers` is set, even for zero.
    if config.num_workers > 0 {
        builder = builder.num_workers(config.num_workers);
    }

    builder.build(dataset)
}

/// Builds the loaders in dataset order, batching `config.batch_size` items
/// over `config.num_workers` threads.
pub fn dataloaders<B, DT, DV, DE>(
    config: &TrainingConfig,
    device: &B::Device,
    train: DT,
    valid: DV,
    test: DE,
) -> Dataloaders<B>
where
    B: AutodiffBackend,
    DT: Dataset<MnistItem> + 'static,
    DV: Dataset<MnistItem> + 'static,
    DE: Dataset<MnistItem> + 'static,
{
    Dataloaders {
        train: dataloader::<B, _>(config, device.clone(), train),
        valid: dataloader::<B::InnerBackend, _>(config, device.clone(), valid),
        test: dataloader::<B::InnerBackend, _>(config, device.clone(), test),
    }
}

fn create_artifact_dir(artifact_dir: &str) -> crate::Result<()> {
    // Remove existing artifacts before to get an accurate learner summary
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

/// Fits the classifier on the stratified training subset, validating on the
/// held-out subset, and returns the test report when evaluation is requested.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    device: B::Device,
    options: TrainOptions,
) -> crate::Result<Option<TestReport>> {
    // Checkpoints of the run being resumed live in the artifact directory.
    match options.resume_from {
        Some(_) => std::fs::create_dir_all(artifact_dir)?,
        None => create_artifact_dir(artifact_dir)?,
    }
    config.save(format!("{artifact_dir}/config.json"))?;

    B::seed(config.seed);

    let data = MnistData::load(config.val_size, config.seed)?;
    let loaders =
        dataloaders::<B, _, _, _>(&config, &device, data.train, data.valid, data.test);

    let mut builder = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .with_application_logger(None)
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary();

    if let Some(epoch) = options.resume_from {
        log::info!("Resuming from the checkpoint of epoch {epoch}");
        builder = builder.checkpoint(epoch);
    }

    let learner = builder.build(
        ImageClassifier::new(&config.backbone, &device),
        config.configure_optimizer(),
        config.learning_rate,
    );

    let model_trained = learner.fit(loaders.train, loaders.valid);

    model_trained
        .clone()
        .save_file(format!("{artifact_dir}/model"), &CompactRecorder::new())?;
    log::info!("Saved trained model to {artifact_dir}/model");

    if !options.evaluate {
        return Ok(None);
    }

    let report = evaluate(&model_trained.valid(), loaders.test);
    report.save(format!("{artifact_dir}/test.json"))?;
    log::info!("{report}");

    Ok(Some(report))
}
