// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns every artifact written to `model_dir`:
//
//   model_dir/
//     model.pth       ← final weights (the reloaded best model)
//     best_model.pth  ← overwritten whenever val loss ties or improves
//     model_info.pth  ← JSON ModelInfo, needed to rebuild the network
//
// Weights are serialised with Burn's BinBytesRecorder at full
// precision and written byte-for-byte, so the file names stay
// exactly as above (file recorders would append their own
// extension).
//
// The training configuration goes to `output_data_dir`, next to
// the metrics CSV, via `save_train_config`.

use anyhow::{anyhow, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::Serialize;

use crate::domain::model_info::ModelInfo;
use crate::ml::model::ResNet;

pub const MODEL_FILE:      &str = "model.pth";
pub const BEST_MODEL_FILE: &str = "best_model.pth";
pub const MODEL_INFO_FILE: &str = "model_info.pth";
pub const CONFIG_FILE:     &str = "train_config.json";

type WeightsRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Manages saving and loading of model artifacts in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating `dir` if it doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing model directory for inference.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!(
                "Model dir '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ─── Weights ──────────────────────────────────────────────────────────────

    /// Serialise the model parameters to `{dir}/{file}`.
    pub fn save_weights<B: Backend>(&self, model: &ResNet<B>, file: &str) -> Result<()> {
        let path  = self.dir.join(file);
        let bytes = WeightsRecorder::new()
            .record(model.clone().into_record(), ())
            .map_err(|e| anyhow!("{:?}", e))
            .with_context(|| format!("Failed to serialise weights for '{}'", path.display()))?;

        fs::write(&path, bytes)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved weights to '{}'", path.display());
        Ok(())
    }

    /// Restore parameters from `{dir}/{file}` into `model`.
    ///
    /// `model` must have the architecture the weights were saved
    /// from or the record will not deserialise.
    pub fn load_weights<B: Backend>(
        &self,
        model:  ResNet<B>,
        file:   &str,
        device: &B::Device,
    ) -> Result<ResNet<B>> {
        let path  = self.dir.join(file);
        let bytes = fs::read(&path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        let record = WeightsRecorder::new()
            .load(bytes, device)
            .map_err(|e| anyhow!("{:?}", e))
            .with_context(|| format!("Checkpoint '{}' does not match the model", path.display()))?;

        Ok(model.load_record(record))
    }

    pub fn save_best<B: Backend>(&self, model: &ResNet<B>) -> Result<()> {
        self.save_weights(model, BEST_MODEL_FILE)
    }

    pub fn load_best<B: Backend>(&self, model: ResNet<B>, device: &B::Device) -> Result<ResNet<B>> {
        tracing::info!("Reloading best checkpoint '{}'", self.dir.join(BEST_MODEL_FILE).display());
        self.load_weights(model, BEST_MODEL_FILE, device)
    }

    pub fn save_model<B: Backend>(&self, model: &ResNet<B>) -> Result<()> {
        self.save_weights(model, MODEL_FILE)
    }

    pub fn load_model<B: Backend>(&self, model: ResNet<B>, device: &B::Device) -> Result<ResNet<B>> {
        self.load_weights(model, MODEL_FILE, device)
    }

    // ─── Metadata ─────────────────────────────────────────────────────────────

    pub fn save_model_info(&self, info: &ModelInfo) -> Result<()> {
        write_json(&self.dir.join(MODEL_INFO_FILE), info)
    }

    pub fn load_model_info(&self) -> Result<ModelInfo> {
        let path = self.dir.join(MODEL_INFO_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read '{}'. Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model info in '{}'", path.display()))
    }
}

/// Write the training configuration as pretty JSON to
/// `{output_dir}/train_config.json`.
pub fn save_train_config<T: Serialize>(output_dir: &Path, cfg: &T) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output dir '{}'", output_dir.display()))?;
    write_json(&output_dir.join(CONFIG_FILE), cfg)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::model::ResNetConfig;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_model_info_round_trip() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path().join("model")).unwrap();

        let mut info = ModelInfo::new(7);
        info.depth       = 18;
        info.class_names = vec!["a".into(), "b".into()];
        ckpt.save_model_info(&info).unwrap();

        let loaded = ckpt.load_model_info().unwrap();
        assert_eq!(loaded.n_classes, 7);
        assert_eq!(loaded, info);
    }

    #[test]
    fn test_minimal_model_info_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(MODEL_INFO_FILE), r#"{"n_classes": 3}"#).unwrap();

        let info = CheckpointManager::open(tmp.path()).unwrap().load_model_info().unwrap();
        assert_eq!(info.n_classes, 3);
        assert_eq!(info.depth, 50);
    }

    #[test]
    fn test_weights_round_trip() {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();
        let cfg    = ResNetConfig::new().with_depth(18).with_base_width(2).with_num_classes(3);

        let saved: ResNet<TestBackend> = cfg.init(&device).unwrap();
        ckpt.save_best(&saved).unwrap();
        assert!(tmp.path().join(BEST_MODEL_FILE).is_file());

        let fresh: ResNet<TestBackend> = cfg.init(&device).unwrap();
        let loaded = ckpt.load_best(fresh, &device).unwrap();

        let a = saved.fc.weight.val().into_data().to_vec::<f32>().unwrap();
        let b = loaded.fc.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_open_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_save_train_config() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        save_train_config(&out, &serde_json::json!({"lr": 0.1})).unwrap();
        let json = fs::read_to_string(out.join(CONFIG_FILE)).unwrap();
        assert!(json.contains("\"lr\""));
    }
}
