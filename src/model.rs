use crate::data::MnistBatch;
use burn::{
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig, Relu},
    prelude::*,
    tensor::backend::AutodiffBackend,
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};

/// Number of pixels in a flattened 28x28 MNIST image.
pub const NUM_PIXELS: usize = 28 * 28;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

#[derive(Config, Debug)]
pub struct BackboneConfig {
    #[config(default = 784)]
    pub input_dim: usize,
    #[config(default = 128)]
    pub hidden_dim: usize,
    #[config(default = 10)]
    pub num_classes: usize,
}

/// Two fully-connected layers producing class scores from a flattened image.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    l1: Linear<B>,
    l2: Linear<B>,
    activation: Relu,
}

impl BackboneConfig {
    /// Returns the initialized backbone.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        Backbone {
            l1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            l2: LinearConfig::new(self.hidden_dim, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Backbone<B> {
    /// # Shapes
    ///   - Images [batch_size, channels, height, width]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = images.flatten::<2>(1, 3);

        let x = self.l1.forward(x);
        let x = self.activation.forward(x);
        let x = self.l2.forward(x);

        self.activation.forward(x)
    }
}

/// Image classifier trained by the learner. Wraps a [Backbone] and provides the
/// train, validation and test steps.
#[derive(Module, Debug)]
pub struct ImageClassifier<B: Backend> {
    backbone: Backbone<B>,
}

impl<B: Backend> ImageClassifier<B> {
    pub fn new(config: &BackboneConfig, device: &B::Device) -> Self {
        Self {
            backbone: config.init(device),
        }
    }

    /// Class scores used for inference.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.backbone.forward(images)
    }

    /// Most likely digit of each image.
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 1, Int> {
        self.forward(images).argmax(1).squeeze(1)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }

    /// Loss on a batch of the held-out test set.
    pub fn test_step(&self, batch: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

impl<B: AutodiffBackend> TrainStep<MnistBatch<B>, ClassificationOutput<B>> for ImageClassifier<B> {
    fn step(&self, batch: MnistBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<MnistBatch<B>, ClassificationOutput<B>> for ImageClassifier<B> {
    fn step(&self, batch: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{AdamConfig, GradientsParams, Optimizer},
        tensor::{Distribution, ElementConversion},
    };

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn backbone_maps_images_to_class_scores() {
        let device = Default::default();
        let backbone = BackboneConfig::new().init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::random(
            [5, 1, 28, 28],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let output = backbone.forward(images);

        assert_eq!(output.dims(), [5, NUM_CLASSES]);
        let min = output.min().into_scalar().elem::<f32>();
        assert!(min >= 0.0, "scores go through a relu, got {min}");
    }

    #[test]
    fn hidden_dim_is_configurable() {
        let device = Default::default();
        let config = BackboneConfig::new().with_hidden_dim(16);
        let backbone = config.init::<TestBackend>(&device);

        assert_eq!(backbone.l1.weight.dims(), [NUM_PIXELS, 16]);
        assert_eq!(backbone.l2.weight.dims(), [16, NUM_CLASSES]);
    }

    #[test]
    fn predict_returns_one_class_per_image() {
        let device = Default::default();
        let model = ImageClassifier::<TestBackend>::new(&BackboneConfig::new(), &device);
        let images = Tensor::<TestBackend, 4>::zeros([3, 1, 28, 28], &device);

        let predicted = model.predict(images);

        assert_eq!(predicted.dims(), [3]);
    }

    #[test]
    fn loss_decreases_on_a_fixed_batch() {
        let device = Default::default();
        TestAutodiffBackend::seed(42);

        let mut model = ImageClassifier::<TestAutodiffBackend>::new(
            &BackboneConfig::new().with_hidden_dim(64),
            &device,
        );
        let mut optim = AdamConfig::new().init();
        let images = Tensor::<TestAutodiffBackend, 4>::random(
            [10, 1, 28, 28],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let targets =
            Tensor::<TestAutodiffBackend, 1, Int>::from_ints([0, 1, 2, 3, 4, 5, 6, 7, 8, 9], &device);

        let mut losses = Vec::new();
        for _ in 0..30 {
            let output = model.forward_classification(images.clone(), targets.clone());
            losses.push(output.loss.clone().into_scalar().elem::<f32>());

            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optim.step(1.0e-2, model, grads);
        }

        assert!(losses.iter().all(|loss| *loss >= 0.0));
        let first = losses[0];
        let last = losses[losses.len() - 1];
        assert!(last < first, "loss went from {first} to {last}");
    }
}
