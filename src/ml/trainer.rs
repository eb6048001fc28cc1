// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Hand-written epoch loop over Burn's DataLoader and Adam.
//
// Per epoch:
//   1. train_epoch  → forward, cross-entropy, backward, Adam step
//                     (only the replacement head carries gradients)
//   2. valid_epoch  → model.valid() on the inner backend, crops
//                     fused into the batch and pooled per example
//   3. scheduler    → reduce-on-plateau on the validation loss
//   4. checkpoint   → best_model.pth when val loss ties or improves
//
// Losses are size-weighted: Σ(batch_loss · batch_len) / dataset_len,
// so a short final batch counts for exactly its share.
//
// After the last epoch the best checkpoint is reloaded; the
// returned model is never the last epoch's in-memory state.

use std::time::Instant;

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    loader::{DataLoaders, EvalLoader, SizedLoader, TrainLoader},
    transforms::FiveCropMode,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{BestTracker, EpochMetrics, MetricsLogger},
};
use crate::ml::{model::ResNet, scheduler::PlateauSchedulerConfig};

/// Loss curves and the epoch the returned model comes from.
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub best_epoch:    usize,
    pub best_val_loss: f64,
    pub train_losses:  Vec<f64>,
    pub val_losses:    Vec<f64>,
}

/// Result of one pass over an evaluation split.
#[derive(Debug, Clone, Copy)]
pub struct EvalStats {
    pub loss:     f64,
    pub accuracy: f64,
}

fn weighted_mean(sum: f64, len: usize) -> f64 {
    if len > 0 { sum / len as f64 } else { f64::NAN }
}

// ─── Training phase ───────────────────────────────────────────────────────────
pub fn train_epoch<B, O>(
    mut model: ResNet<B>,
    optim:     &mut O,
    loader:    &SizedLoader<TrainLoader<B>>,
    lr:        f64,
) -> (ResNet<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<ResNet<B>, B>,
{
    let mut loss_sum = 0.0f64;

    for batch in loader.loader.iter() {
        let n      = batch.targets.dims()[0];
        let logits = model.forward(batch.images);
        let loss   = model.loss(logits, batch.targets);

        loss_sum += loss.clone().into_scalar().elem::<f64>() * n as f64;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);
    }

    (model, weighted_mean(loss_sum, loader.len))
}

// ─── Evaluation phase ─────────────────────────────────────────────────────────
/// Loss and accuracy over an evaluation split with crop pooling.
pub fn valid_epoch<B: Backend>(
    model:  &ResNet<B>,
    loader: &SizedLoader<EvalLoader<B>>,
    mode:   FiveCropMode,
) -> EvalStats {
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;

    for batch in loader.loader.iter() {
        let n      = batch.targets.dims()[0];
        let logits = model.forward_crops(batch.crops, mode);

        // argmax(1) returns [n, 1]; flatten to [n] before comparing
        let preds = logits.clone().argmax(1).reshape([n]);
        let hits: i64 = preds
            .equal(batch.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct += hits as usize;

        let loss = model.loss(logits, batch.targets);
        loss_sum += loss.into_scalar().elem::<f64>() * n as f64;
    }

    EvalStats {
        loss:     weighted_mean(loss_sum, loader.len),
        accuracy: weighted_mean(correct as f64, loader.len),
    }
}

// ─── Epoch loop ───────────────────────────────────────────────────────────────
/// Run `cfg.n_epochs` epochs and return the reloaded best model.
pub fn train<B: AutodiffBackend>(
    model:   ResNet<B>,
    loaders: &DataLoaders<B>,
    cfg:     &TrainConfig,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
    device:  &B::Device,
) -> Result<(ResNet<B>, TrainingSummary)> {
    let (last, summary) = fit(model, loaders, cfg, ckpt, metrics)?;

    let model = ckpt.load_best(last, device)?;
    tracing::info!(
        "Best epoch {} with val_loss={:.4}",
        summary.best_epoch,
        summary.best_val_loss
    );

    Ok((model, summary))
}

/// The epoch loop alone: returns the last epoch's in-memory model,
/// with the best one left in `best_model.pth`.
pub fn fit<B: AutodiffBackend>(
    mut model: ResNet<B>,
    loaders:   &DataLoaders<B>,
    cfg:       &TrainConfig,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<(ResNet<B>, TrainingSummary)> {
    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim     = AdamConfig::new().with_epsilon(1e-8).init::<B, ResNet<B>>();
    let mut scheduler = PlateauSchedulerConfig::new(cfg.lr).init();
    let mut best      = BestTracker::new();
    let mut summary   = TrainingSummary::default();

    for epoch in 1..=cfg.n_epochs {
        let started = Instant::now();
        let lr      = scheduler.lr();

        let (trained, train_loss) = train_epoch(model, &mut optim, &loaders.train, lr);
        model = trained;

        let val = valid_epoch(&model.valid(), &loaders.val, cfg.fivecrop);

        scheduler.step(val.loss);
        let is_best = best.observe(epoch, val.loss);
        if is_best {
            ckpt.save_best(&model)?;
        }

        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(
            "Epoch {:>3}/{} | {:.1}s | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}% | lr={:.2e}{}",
            epoch,
            cfg.n_epochs,
            elapsed,
            train_loss,
            val.loss,
            val.accuracy * 100.0,
            lr,
            if is_best { " | best" } else { "" },
        );

        metrics.log(&EpochMetrics::new(epoch, train_loss, val.loss, lr, elapsed, is_best))?;
        summary.train_losses.push(train_loss);
        summary.val_losses.push(val.loss);
    }

    let Some(best_epoch) = best.best_epoch() else {
        bail!("no best checkpoint was recorded (n_epochs = {})", cfg.n_epochs);
    };
    summary.best_epoch    = best_epoch;
    summary.best_val_loss = best.best_loss();

    Ok((model, summary))
}

/// Evaluate a trained model on the held-out test split.
pub fn evaluate_test<B: AutodiffBackend>(
    model:  &ResNet<B>,
    loader: &SizedLoader<EvalLoader<B::InnerBackend>>,
    mode:   FiveCropMode,
) -> EvalStats {
    let stats = valid_epoch(&model.valid(), loader, mode);
    tracing::info!(
        "Test | loss={:.4} | accuracy={:.1}% ({} images)",
        stats.loss,
        stats.accuracy * 100.0,
        loader.len
    );
    stats
}
