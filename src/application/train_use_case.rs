// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Save the run configuration     (Layer 6 - infra)
//   Step 2: Build train/val/test loaders   (Layer 4 - data)
//   Step 3: Seed, build / import backbone  (Layer 5 + 6)
//   Step 4: Freeze it, swap in a new head  (Layer 5 - ml)
//   Step 5: Save model_info.pth            (Layer 6 - infra)
//   Step 6: Run the epoch loop             (Layer 5 - ml)
//   Step 7: Evaluate on the test split     (Layer 5 - ml)
//   Step 8: Save model.pth                 (Layer 6 - infra)

use anyhow::{bail, Result};
use std::path::PathBuf;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::{build_loaders, LoaderSettings},
    transforms::FiveCropMode,
};
use crate::domain::model_info::ModelInfo;
use crate::infra::{
    checkpoint::{save_train_config, CheckpointManager},
    metrics::MetricsLogger,
    pretrained::load_pretrained,
};
use crate::ml::{
    backend::{ndarray_device, wgpu_device, BackendKind, NdArrayTrainBackend, WgpuTrainBackend},
    model::ResNetConfig,
    trainer::{self, EvalStats, TrainingSummary},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a training run needs. Serialisable so the exact
// settings of a run end up next to its metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub output_data_dir:       PathBuf,
    pub model_dir:             PathBuf,
    pub data_dir:              PathBuf,
    pub img_short_side_resize: u32,
    pub img_input_size:        u32,
    pub shuffle:               bool,
    pub num_workers:           usize,
    pub trainfolder:           String,
    pub validfolder:           String,
    pub testfolder:            String,
    pub batch_size:            usize,
    pub n_epochs:              usize,
    pub seed:                  u64,
    pub lr:                    f64,
    pub n_classes:             usize,
    pub depth:                 usize,
    pub base_width:            usize,
    pub pretrained:            Option<PathBuf>,
    pub fivecrop:              FiveCropMode,
    pub backend:               BackendKind,
    pub cpu:                   bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            output_data_dir:       PathBuf::from("output"),
            model_dir:             PathBuf::from("model"),
            data_dir:              PathBuf::from("data"),
            img_short_side_resize: 256,
            img_input_size:        224,
            shuffle:               true,
            num_workers:           16,
            trainfolder:           "train_img".to_string(),
            validfolder:           "valid_img".to_string(),
            testfolder:            "test_img".to_string(),
            batch_size:            64,
            n_epochs:              10,
            seed:                  42,
            lr:                    3e-4,
            n_classes:             2,
            depth:                 50,
            base_width:            64,
            pretrained:            None,
            fivecrop:              FiveCropMode::Mean,
            backend:               BackendKind::Wgpu,
            cpu:                   false,
        }
    }
}

impl TrainConfig {
    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            img_short_side_resize: self.img_short_side_resize,
            img_input_size:        self.img_input_size,
            shuffle:               self.shuffle,
            num_workers:           self.num_workers,
            batch_size:            self.batch_size,
            seed:                  self.seed,
            fivecrop:              self.fivecrop,
        }
    }

    pub fn resnet_config(&self) -> ResNetConfig {
        ResNetConfig::new()
            .with_depth(self.depth)
            .with_base_width(self.base_width)
    }
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub summary: TrainingSummary,
    /// None when the data dir has no test folder
    pub test:    Option<EvalStats>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run on the backend selected in the config.
    pub fn execute(&self) -> Result<TrainReport> {
        match self.config.backend {
            BackendKind::Wgpu => {
                let device = wgpu_device(self.config.cpu);
                self.run::<WgpuTrainBackend>(&device)
            }
            BackendKind::NdArray => {
                let device = ndarray_device();
                self.run::<NdArrayTrainBackend>(&device)
            }
        }
    }

    /// Run the pipeline on an explicit autodiff backend.
    pub fn run<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Save config ───────────────────────────────────────────────
        save_train_config(&cfg.output_data_dir, cfg)?;

        // ── Step 2: Data loaders ──────────────────────────────────────────────
        let loaders = build_loaders::<B>(
            &cfg.loader_settings(),
            &cfg.data_dir,
            &cfg.trainfolder,
            &cfg.validfolder,
            &cfg.testfolder,
            device,
        )?;

        let found = loaders.class_names.len();
        if found > cfg.n_classes {
            bail!(
                "training folder has {found} classes but --n-classes is {}",
                cfg.n_classes
            );
        }
        if found < cfg.n_classes {
            tracing::warn!(
                "training folder has {found} classes, head will have {} outputs",
                cfg.n_classes
            );
        }

        // ── Step 3: Backbone ──────────────────────────────────────────────────
        // Seeds every backend-side random draw: backbone and head init.
        B::seed(device, cfg.seed);
        let resnet_cfg = cfg.resnet_config();
        let backbone = match &cfg.pretrained {
            Some(path) => load_pretrained::<B>(path, &resnet_cfg, device)?,
            None => {
                tracing::warn!("No --pretrained weights given, backbone is randomly initialised");
                resnet_cfg.init::<B>(device)?
            }
        };

        // ── Step 4: Freeze + new head ─────────────────────────────────────────
        let model = backbone.into_transfer(cfg.n_classes, device);
        tracing::info!(
            "ResNet-{} ready: {} features → {} classes, backbone frozen",
            cfg.depth,
            model.num_features,
            cfg.n_classes
        );

        // ── Step 5: Model info ────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.model_dir)?;
        ckpt.save_model_info(&ModelInfo {
            n_classes:      cfg.n_classes,
            depth:          cfg.depth,
            base_width:     cfg.base_width,
            img_input_size: cfg.img_input_size,
            class_names:    loaders.class_names.clone(),
        })?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.output_data_dir)?;
        let (model, summary) = trainer::train(model, &loaders, cfg, &ckpt, &metrics, device)?;

        // ── Step 7: Test ──────────────────────────────────────────────────────
        let test = match &loaders.test {
            Some(loader) => Some(trainer::evaluate_test(&model, loader, cfg.fivecrop)),
            None => {
                tracing::warn!("No test split, skipping test evaluation");
                None
            }
        };

        // ── Step 8: Final weights ─────────────────────────────────────────────
        ckpt.save_model(&model)?;
        tracing::info!("Saved model to '{}'", cfg.model_dir.display());

        Ok(TrainReport { summary, test })
    }
}
