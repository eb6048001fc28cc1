// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Classifies one image file with the model saved in `model_dir`.
// This is what the deployed endpoint does for each request.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::backend::{NdArray, Wgpu};

use crate::domain::prediction::Prediction;
use crate::ml::{
    backend::{ndarray_device, wgpu_device, BackendKind},
    inferencer::Inferencer,
};

pub struct PredictUseCase {
    model_dir: PathBuf,
    backend:   BackendKind,
    cpu:       bool,
}

impl PredictUseCase {
    pub fn new(model_dir: impl Into<PathBuf>, backend: BackendKind, cpu: bool) -> Self {
        Self { model_dir: model_dir.into(), backend, cpu }
    }

    pub fn predict_file(&self, image: &Path) -> Result<Prediction> {
        let bytes = fs::read(image)
            .with_context(|| format!("Cannot read image '{}'", image.display()))?;
        self.predict_bytes(&bytes)
    }

    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        match self.backend {
            BackendKind::Wgpu => {
                let device = wgpu_device(self.cpu);
                Inferencer::<Wgpu>::from_model_dir(&self.model_dir, &device)?.classify_bytes(bytes)
            }
            BackendKind::NdArray => {
                let device = ndarray_device();
                Inferencer::<NdArray>::from_model_dir(&self.model_dir, &device)?.classify_bytes(bytes)
            }
        }
    }
}
