use crate::{
    split::{stratified_split, Split},
    Result,
};
use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::{
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    prelude::*,
    tensor::{ElementConversion, TensorData},
};
use std::{marker::PhantomData, sync::Arc};

#[derive(Clone, Debug)]
pub struct MnistBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Pixels scaled to [0, 1], shaped [batch_size, 1, 28, 28].
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MnistItem, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistItem>) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, &self.device))
            .map(|tensor| tensor.reshape([1, 1, 28, 28]))
            .map(|tensor| tensor / 255)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    [(item.label as i64).elem::<B::IntElem>()],
                    &self.device,
                )
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}

/// A view of a dataset restricted to a list of indices.
///
/// Several subsets can share the same underlying dataset, which is how the
/// training and validation sets are carved out of the MNIST training split.
pub struct SubsetDataset<D, I> {
    dataset: Arc<D>,
    indices: Vec<usize>,
    input: PhantomData<I>,
}

impl<D, I> SubsetDataset<D, I>
where
    D: Dataset<I>,
{
    pub fn new(dataset: Arc<D>, indices: Vec<usize>) -> Self {
        Self {
            dataset,
            indices,
            input: PhantomData,
        }
    }

    /// Indices of the wrapped dataset, in iteration order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D, I> Dataset<I> for SubsetDataset<D, I>
where
    D: Dataset<I>,
    I: Clone + Send + Sync,
{
    fn get(&self, index: usize) -> Option<I> {
        let index = self.indices.get(index)?;
        self.dataset.get(*index)
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// Splits a labeled digit dataset into stratified training and validation subsets.
pub fn split_dataset<D>(
    dataset: D,
    val_size: f64,
    seed: u64,
) -> Result<(SubsetDataset<D, MnistItem>, SubsetDataset<D, MnistItem>)>
where
    D: Dataset<MnistItem>,
{
    let labels: Vec<u8> = dataset.iter().map(|item| item.label).collect();
    let Split { train, valid } = stratified_split(&labels, val_size, seed)?;
    let dataset = Arc::new(dataset);

    Ok((
        SubsetDataset::new(dataset.clone(), train),
        SubsetDataset::new(dataset, valid),
    ))
}

/// The three subsets used for a run.
pub struct MnistData {
    pub train: SubsetDataset<MnistDataset, MnistItem>,
    pub valid: SubsetDataset<MnistDataset, MnistItem>,
    pub test: MnistDataset,
}

impl MnistData {
    /// Downloads MNIST (cached by the dataset source) and splits the official
    /// training set. The official test set is kept aside untouched.
    pub fn load(val_size: f64, seed: u64) -> Result<Self> {
        let (train, valid) = split_dataset(MnistDataset::train(), val_size, seed)?;
        let test = MnistDataset::test();

        log::info!(
            "Loaded MNIST: {} train, {} valid, {} test items",
            train.len(),
            valid.len(),
            test.len()
        );

        Ok(Self { train, valid, test })
    }
}
