// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches the network itself lives here:
//
//   model.rs      — torchvision-layout ResNet with frozen batch
//                   norm, five-crop pooling and the transfer
//                   head replacement
//
//   scheduler.rs  — reduce-on-plateau learning-rate schedule
//                   driven by the validation loss
//
//   trainer.rs    — the epoch loop: train, validate, schedule,
//                   keep the best checkpoint, reload it at the end
//
//   inferencer.rs — loads `model.pth` + `model_info.pth` and
//                   classifies raw image bytes
//
// Reference: He et al. (2016) Deep Residual Learning
//            Burn Book §5 (Training)

/// ResNet backbone and transfer-learning head
pub mod model;

/// Plateau learning-rate scheduler
pub mod scheduler;

/// Train / validation / test epoch loops
pub mod trainer;

/// Inference engine — loads the saved model and classifies images
pub mod inferencer;

/// Backend selection (wgpu / ndarray) and device construction
pub mod backend;
