// ============================================================
// Layer 4 — Data Loader Construction
// ============================================================
// Builds the three loaders the training pipeline consumes:
//
//   train → augmented single images, training backend (autodiff)
//   val   → evaluation crops, inner backend (no autodiff)
//   test  → evaluation crops, inner backend, only if the folder exists
//
// With five-crop evaluation every example expands to five
// images, so the evaluation batch size is the training batch
// size divided by five (rounded down).

use std::{path::Path, sync::Arc};

use anyhow::{bail, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{CropBatch, CropBatcher, ImageBatch, TrainBatcher},
    dataset::ImageFolder,
    transforms::{EvalTransform, FiveCropMode, TrainTransform},
};

/// Everything needed to build the loaders, independent of the CLI.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub img_short_side_resize: u32,
    pub img_input_size:        u32,
    pub shuffle:               bool,
    pub num_workers:           usize,
    pub batch_size:            usize,
    pub seed:                  u64,
    pub fivecrop:              FiveCropMode,
}

/// Batch size for validation/test loaders.
///
/// `floor(batch_size / 5)` under five-crop evaluation, otherwise
/// the training batch size unchanged.
pub fn eval_batch_size(batch_size: usize, fivecrop: FiveCropMode) -> usize {
    if fivecrop.is_five_crop() {
        batch_size / 5
    } else {
        batch_size
    }
}

pub type TrainLoader<B> = Arc<dyn DataLoader<B, ImageBatch<B>>>;
pub type EvalLoader<B>  = Arc<dyn DataLoader<B, CropBatch<B>>>;

/// A loader plus the number of examples behind it, which the
/// trainer needs for size-weighted loss averages.
pub struct SizedLoader<L> {
    pub loader: L,
    pub len:    usize,
}

pub struct DataLoaders<B: AutodiffBackend> {
    pub train:       SizedLoader<TrainLoader<B>>,
    pub val:         SizedLoader<EvalLoader<B::InnerBackend>>,
    pub test:        Option<SizedLoader<EvalLoader<B::InnerBackend>>>,
    pub class_names: Vec<String>,
}

/// Labels are positions in each split's own sorted class list,
/// so every split must list exactly the training classes.
fn ensure_same_classes(train: &ImageFolder, other: &ImageFolder) -> Result<()> {
    if other.class_names() != train.class_names() {
        bail!(
            "classes in '{}' {:?} differ from training classes {:?}",
            other.root().display(),
            other.class_names(),
            train.class_names()
        );
    }
    Ok(())
}

/// Open the train/valid/test folders under `data_dir` and wrap them
/// in loaders. The test folder is optional.
pub fn build_loaders<B: AutodiffBackend>(
    settings:    &LoaderSettings,
    data_dir:    &Path,
    trainfolder: &str,
    validfolder: &str,
    testfolder:  &str,
    device:      &B::Device,
) -> Result<DataLoaders<B>> {
    tracing::info!("Get train data loader.");

    let eval_bs = eval_batch_size(settings.batch_size, settings.fivecrop);
    if eval_bs == 0 {
        bail!(
            "batch size {} is too small for five-crop evaluation (need at least 5)",
            settings.batch_size
        );
    }

    let train_data = ImageFolder::open(data_dir.join(trainfolder))?;
    let valid_data = ImageFolder::open(data_dir.join(validfolder))?;
    ensure_same_classes(&train_data, &valid_data)?;

    let test_dir  = data_dir.join(testfolder);
    let test_data = if test_dir.is_dir() {
        let test_data = ImageFolder::open(&test_dir)?;
        ensure_same_classes(&train_data, &test_data)?;
        Some(test_data)
    } else {
        tracing::warn!("No test folder at '{}', skipping test split", test_dir.display());
        None
    };

    let class_names = train_data.class_names().to_vec();

    // ── Train loader ──────────────────────────────────────────────────────────
    let train_transform = TrainTransform::new(settings.img_short_side_resize, settings.img_input_size);
    let train_batcher   = TrainBatcher::<B>::new(device.clone(), train_transform, settings.seed);
    let mut builder = DataLoaderBuilder::new(train_batcher).batch_size(settings.batch_size);
    if settings.shuffle {
        builder = builder.shuffle(settings.seed);
    }
    if settings.num_workers > 0 {
        builder = builder.num_workers(settings.num_workers);
    }
    let train_len = train_data.len();
    let train = SizedLoader { loader: builder.build(train_data), len: train_len };

    // ── Evaluation loaders (single-threaded) ──────────────────────────────────
    let eval_transform = EvalTransform::new(settings.img_input_size, settings.fivecrop);
    let eval_loader = |data: ImageFolder| -> SizedLoader<EvalLoader<B::InnerBackend>> {
        let batcher = CropBatcher::<B::InnerBackend>::new(device.clone(), eval_transform.clone());
        let mut builder = DataLoaderBuilder::new(batcher).batch_size(eval_bs);
        if settings.shuffle {
            builder = builder.shuffle(settings.seed);
        }
        let len = data.len();
        SizedLoader { loader: builder.build(data), len }
    };

    let val  = eval_loader(valid_data);
    let test = test_data.map(eval_loader);

    tracing::info!(
        "Loaders ready: train={} (bs {}), val={} (bs {}), test={}",
        train.len,
        settings.batch_size,
        val.len,
        eval_bs,
        test.as_ref().map(|t| t.len.to_string()).unwrap_or_else(|| "none".into()),
    );

    Ok(DataLoaders { train, val, test, class_names })
}
