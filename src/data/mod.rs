// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from an image-folder split on disk to tensor
// batches on the device:
//
//   <data_dir>/<split>/<class>/*.jpg
//       │
//       ▼
//   ImageFolder       → scans class folders, assigns labels
//       │
//       ▼
//   Transforms        → resize / jitter / flip / crop / normalise
//       │
//       ▼
//   Train/CropBatcher → stacks samples into tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Image-folder dataset implementing Burn's Dataset trait
pub mod dataset;

/// Augmentation and evaluation transforms
pub mod transforms;

/// Burn Batcher implementations for training and evaluation
pub mod batcher;

/// Builds the train/val/test loaders
pub mod loader;
