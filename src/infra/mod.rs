// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that talk to the outside world:
//
//   checkpoint.rs — Model artifacts in `model_dir`
//                   (`model.pth`, `best_model.pth`,
//                   `model_info.pth`) and the JSON dump of the
//                   training configuration.
//
//   pretrained.rs — Imports backbone weights from a Burn record
//                   or a torchvision PyTorch state dict.
//
//   metrics.rs    — Per-epoch CSV log and best-loss tracking.
//
//   sagemaker.rs  — `EndpointInvoker` over the SageMaker
//                   runtime API.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            AWS SDK for Rust developer guide

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained backbone weight import
pub mod pretrained;

/// Training metrics CSV logger
pub mod metrics;

/// SageMaker runtime client
pub mod sagemaker;
