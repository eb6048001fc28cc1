// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per epoch to `{output_data_dir}/metrics.csv`
// and tracks which epoch holds the best validation loss.
//
// Example CSV output:
//   epoch,train_loss,val_loss,lr,elapsed_secs,is_best
//   1,0.693100,0.681200,0.000300,12.40,true
//   2,0.652000,0.690100,0.000300,12.10,false
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

pub const METRICS_FILE: &str = "metrics.csv";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Size-weighted mean cross-entropy over the training set
    pub train_loss: f64,

    /// Size-weighted mean cross-entropy over the validation set
    pub val_loss: f64,

    /// Learning rate the epoch was trained with
    pub lr: f64,

    /// Wall-clock duration of the epoch
    pub elapsed_secs: f64,

    /// Whether this epoch produced the saved best checkpoint
    pub is_best: bool,
}

impl EpochMetrics {
    pub fn new(
        epoch:        usize,
        train_loss:   f64,
        val_loss:     f64,
        lr:           f64,
        elapsed_secs: f64,
        is_best:      bool,
    ) -> Self {
        Self { epoch, train_loss, val_loss, lr, elapsed_secs, is_best }
    }
}

// ─── BestTracker ──────────────────────────────────────────────────────────────
/// Running minimum of the validation loss.
///
/// Ties count as improvements, so the later of two equal epochs wins.
#[derive(Debug, Clone)]
pub struct BestTracker {
    best_loss:  f64,
    best_epoch: Option<usize>,
}

impl Default for BestTracker {
    fn default() -> Self {
        Self { best_loss: f64::INFINITY, best_epoch: None }
    }
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an epoch's loss; true if it becomes the new best.
    pub fn observe(&mut self, epoch: usize, loss: f64) -> bool {
        if loss <= self.best_loss {
            self.best_loss  = loss;
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the header if the file is new.
    /// An existing file is appended to.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output dir '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,val_loss,lr,elapsed_secs,is_best")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6e},{:.2},{}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.lr,
            m.elapsed_secs,
            m.is_best,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
