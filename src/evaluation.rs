use crate::{data::MnistBatch, model::ImageClassifier, Result};
use burn::{data::dataloader::DataLoader, prelude::*, tensor::ElementConversion};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::Path, sync::Arc};

/// Metrics of the trained model on the held-out test set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Mean cross-entropy over all test items.
    pub test_loss: f64,
    /// Fraction of correctly classified items.
    pub test_accuracy: f64,
    pub num_items: usize,
}

impl TestReport {
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(file, json)?;
        Ok(())
    }
}

impl Display for TestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Test] Loss {:.4} | Accuracy {:.2} % | Items {}",
            self.test_loss,
            self.test_accuracy * 100.0,
            self.num_items
        )
    }
}

/// Runs the test step over every batch of the loader.
///
/// Batch losses are weighted by batch size so that a short final batch does not
/// skew the mean.
pub fn evaluate<B: Backend>(
    model: &ImageClassifier<B>,
    dataloader: Arc<dyn DataLoader<MnistBatch<B>>>,
) -> TestReport {
    let mut loss_sum = 0.0;
    let mut num_correct = 0;
    let mut num_items = 0;

    for (iteration, batch) in dataloader.iter().enumerate() {
        let batch_size = batch.targets.dims()[0];
        let output = model.test_step(batch);

        let loss = output.loss.into_scalar().elem::<f64>();
        let correct = output
            .output
            .argmax(1)
            .squeeze::<1>(1)
            .equal(output.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;

        log::debug!("[Test - Iteration {iteration}] Loss {loss:.3}");

        loss_sum += loss * batch_size as f64;
        num_correct += correct;
        num_items += batch_size;
    }

    if num_items == 0 {
        return TestReport {
            test_loss: 0.0,
            test_accuracy: 0.0,
            num_items,
        };
    }

    TestReport {
        test_loss: loss_sum / num_items as f64,
        test_accuracy: num_correct as f64 / num_items as f64,
        num_items,
    }
}
