// ============================================================
// Layer 6 — Pretrained Weight Import
// ============================================================
// Two sources of ImageNet weights for the backbone:
//
//   *.mpk       → Burn's named MessagePack record (e.g. a model
//                 previously converted and saved from Burn)
//   *.pth / *.pt → a torchvision state dict, read through
//                 burn-import's PyTorchFileRecorder
//
// The ResNet module uses torchvision's field names, so only the
// downsample branch needs remapping: PyTorch stores it as an
// nn.Sequential (`downsample.0`, `downsample.1`), here it is a
// named struct (`downsample.conv`, `downsample.bn`).

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::ml::model::{ResNet, ResNetConfig};

/// Build `config`'s ResNet and load pretrained weights into it.
///
/// `config.num_classes` must match the head stored in the file
/// (1000 for the ImageNet checkpoints).
pub fn load_pretrained<B: Backend>(
    path:   &Path,
    config: &ResNetConfig,
    device: &B::Device,
) -> Result<ResNet<B>> {
    let model: ResNet<B> = config.init(device)?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let record = match ext.as_str() {
        "mpk" => NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.to_path_buf(), device)
            .map_err(|e| anyhow!("{:?}", e)),
        "pth" | "pt" => {
            let args = LoadArgs::new(path.to_path_buf())
                .with_key_remap(r"downsample\.0\.(.+)", "downsample.conv.$1")
                .with_key_remap(r"downsample\.1\.(.+)", "downsample.bn.$1");
            PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(args, device)
                .map_err(|e| anyhow!("{:?}", e))
        }
        other => bail!(
            "unsupported pretrained weight format '.{other}' (expected .mpk, .pth or .pt)"
        ),
    }
    .with_context(|| format!("Cannot load pretrained weights from '{}'", path.display()))?;

    tracing::info!(
        "Loaded pretrained ResNet-{} weights from '{}'",
        config.depth,
        path.display()
    );
    Ok(model.load_record(record))
}
