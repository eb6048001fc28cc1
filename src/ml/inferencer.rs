// ============================================================
// Layer 5 — Inference Engine
// ============================================================
// Endpoint-side model loading and prediction:
//
//   from_model_dir → read model_info.pth
//                  → rebuild the ResNet with its depth, width and
//                    n_classes
//                  → restore model.pth
//
//   classify_bytes → decode → resize + five crop → normalise
//                  → forward, mean over crops → softmax
//                  → (class_index, class_name, confidence)
//
// The Prediction serialises to `{"class_name": ...}` plus the
// index and confidence, which is the shape the gateway reads.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::transforms::{EvalTransform, FiveCropMode};
use crate::domain::{model_info::ModelInfo, prediction::Prediction};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{ResNet, ResNetConfig};

/// Holds a loaded model ready to classify images.
pub struct Inferencer<B: Backend> {
    model:     ResNet<B>,
    info:      ModelInfo,
    transform: EvalTransform,
    device:    B::Device,
}

impl<B: Backend> Inferencer<B> {
    /// Load `model_info.pth` and `model.pth` from `model_dir`.
    pub fn from_model_dir(model_dir: &Path, device: &B::Device) -> Result<Self> {
        let ckpt = CheckpointManager::open(model_dir)?;
        let info = ckpt.load_model_info()?;

        tracing::info!(
            "Loading ResNet-{} (base width {}) with {} classes from '{}'",
            info.depth,
            info.base_width,
            info.n_classes,
            model_dir.display()
        );

        let model = ResNetConfig::new()
            .with_depth(info.depth)
            .with_base_width(info.base_width)
            .with_num_classes(info.n_classes)
            .init::<B>(device)?;
        let model = ckpt.load_model(model, device)?;

        Ok(Self {
            model,
            transform: EvalTransform::new(info.img_input_size, FiveCropMode::Mean),
            info,
            device: device.clone(),
        })
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    /// Classify an encoded image (any format the `image` crate reads).
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let img = image::load_from_memory(bytes).context("Cannot decode input image")?;

        let mut pixels = Vec::with_capacity(self.transform.output_len());
        self.transform.apply(&img, &mut pixels)?;

        let s      = self.transform.input_size as usize;
        let crops  = self.transform.num_crops();
        let input  = Tensor::<B, 5>::from_data(
            TensorData::new(pixels, [1, crops, 3, s, s]),
            &self.device,
        );

        let logits = self.model.forward_crops(input, self.transform.mode);
        let probs: Vec<f32> = softmax(logits, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("{:?}", e))?;

        let (class_index, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let prediction = Prediction {
            class_name: self.info.class_name(class_index),
            class_index,
            confidence,
        };
        tracing::debug!("Prediction: {:?}", prediction);
        Ok(prediction)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    type TestBackend = NdArray<f32>;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn saved_model_dir(n_classes: usize) -> tempfile::TempDir {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();

        let mut info = ModelInfo::new(n_classes);
        info.depth          = 18;
        info.base_width     = 2;
        info.img_input_size = 16;
        info.class_names    = (0..n_classes).map(|i| format!("class_{i}")).collect();
        ckpt.save_model_info(&info).unwrap();

        let model: ResNet<TestBackend> = ResNetConfig::new()
            .with_depth(18)
            .with_base_width(2)
            .with_num_classes(n_classes)
            .init(&device)
            .unwrap();
        ckpt.save_model(&model).unwrap();
        tmp
    }

    #[test]
    fn test_classify_bytes() {
        let dir    = saved_model_dir(3);
        let device = Default::default();
        let inf    = Inferencer::<TestBackend>::from_model_dir(dir.path(), &device).unwrap();
        assert_eq!(inf.model_info().n_classes, 3);

        let pred = inf.classify_bytes(&png_bytes(30, 20)).unwrap();
        assert!(pred.class_index < 3);
        assert_eq!(pred.class_name, format!("class_{}", pred.class_index));
        assert!(pred.confidence >= 1.0 / 3.0 - 1e-4 && pred.confidence <= 1.0);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let dir    = saved_model_dir(2);
        let device = Default::default();
        let inf    = Inferencer::<TestBackend>::from_model_dir(dir.path(), &device).unwrap();
        assert!(inf.classify_bytes(b"not an image").is_err());
    }

    #[test]
    fn test_missing_model_dir() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        assert!(Inferencer::<TestBackend>::from_model_dir(&tmp.path().join("x"), &device).is_err());
    }
}
