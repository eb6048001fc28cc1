// ============================================================
// Layer 4 — Image Batchers
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ImageItem> into
// tensors on the target device.
//
//   TrainBatcher → ImageBatch  images  [N, 3, S, S]
//   CropBatcher  → CropBatch   crops   [N, K, 3, S, S]   (K = 5 or 1)
//
// Pixels are decoded and transformed on the CPU into one flat
// buffer per batch, then moved to the device in one transfer.
// ImageFolder::open has already decoded every file once, so a
// decode failure here means the file changed underneath the run;
// Batcher::batch cannot return an error and panics instead.

use std::sync::{Arc, Mutex};

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::{
    dataset::{load_image, ImageItem},
    transforms::{EvalTransform, TrainTransform},
};

// ─── Batches ──────────────────────────────────────────────────────────────────

/// Augmented training images and their labels
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// [batch_size, 3, S, S]
    pub images: Tensor<B, 4>,
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Evaluation crops and their labels
#[derive(Debug, Clone)]
pub struct CropBatch<B: Backend> {
    /// [batch_size, num_crops, 3, S, S]
    pub crops: Tensor<B, 5>,
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

fn targets_tensor<B: Backend>(items: &[ImageItem], device: &B::Device) -> Tensor<B, 1, Int> {
    let labels: Vec<i64> = items.iter().map(|i| i.label as i64).collect();
    Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device)
}

// ─── TrainBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone)]
pub struct TrainBatcher<B: Backend> {
    device:    B::Device,
    transform: TrainTransform,
    rng:       Arc<Mutex<StdRng>>,
}

impl<B: Backend> TrainBatcher<B> {
    pub fn new(device: B::Device, transform: TrainTransform, seed: u64) -> Self {
        Self {
            device,
            transform,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for TrainBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, _device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let size       = self.transform.input_size as usize;
        let per_image  = self.transform.output_len();
        let mut pixels = Vec::with_capacity(batch_size * per_image);

        // One lock per batch; augmentation draws stay reproducible
        // for a given seed when the loader runs single-threaded.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        for item in &items {
            match load_image(&item.path) {
                Ok(img) => self.transform.apply(&img, &mut *rng, &mut pixels),
                Err(e)  => panic!("Training image became unreadable: {e:#}"),
            }
        }
        drop(rng);

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 3, size, size]),
            &self.device,
        );
        let targets = targets_tensor::<B>(&items, &self.device);

        ImageBatch { images, targets }
    }
}

// ─── CropBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct CropBatcher<B: Backend> {
    device:    B::Device,
    transform: EvalTransform,
}

impl<B: Backend> CropBatcher<B> {
    pub fn new(device: B::Device, transform: EvalTransform) -> Self {
        Self { device, transform }
    }
}

impl<B: Backend> Batcher<B, ImageItem, CropBatch<B>> for CropBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, _device: &B::Device) -> CropBatch<B> {
        let batch_size = items.len();
        let size       = self.transform.input_size as usize;
        let crops      = self.transform.num_crops();
        let per_image  = self.transform.output_len();
        let mut pixels = Vec::with_capacity(batch_size * per_image);

        for item in &items {
            let res = load_image(&item.path)
                .and_then(|img| self.transform.apply(&img, &mut pixels));
            if let Err(e) = res {
                panic!("Evaluation image became unreadable: {e:#}");
            }
        }

        let crops_tensor = Tensor::<B, 5>::from_data(
            TensorData::new(pixels, [batch_size, crops, 3, size, size]),
            &self.device,
        );
        let targets = targets_tensor::<B>(&items, &self.device);

        CropBatch { crops: crops_tensor, targets }
    }
}
