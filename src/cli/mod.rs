// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2.
//
//   1. `train`   — fine-tunes the model and writes its artifacts
//   2. `predict` — classifies an image with a trained model dir
//   3. `invoke`  — the inference gateway against a live endpoint

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InvokeArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "resnet-transfer",
    version = "0.1.0",
    about = "Fine-tune a pretrained ResNet on an image folder and query the deployed model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Invoke(args)  => run_invoke(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.data_dir.display());

    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. Best epoch {} (val_loss {:.4}).",
        report.summary.best_epoch, report.summary.best_val_loss
    );
    if let Some(test) = report.test {
        println!("Test loss {:.4}, accuracy {:.1}%", test.loss, test.accuracy * 100.0);
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case   = PredictUseCase::new(args.model_dir, args.backend, args.cpu);
    let prediction = use_case.predict_file(&args.image)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

fn run_invoke(args: InvokeArgs) -> Result<()> {
    use crate::application::invoke_use_case::InvokeUseCase;
    use crate::infra::sagemaker::SageMakerInvoker;

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Cannot read image '{}'", args.image.display()))?;

    let runtime  = tokio::runtime::Runtime::new().context("Cannot start tokio runtime")?;
    let response = runtime.block_on(async {
        let gateway = InvokeUseCase::new(SageMakerInvoker::from_env().await, args.endpoint_name);
        gateway.handle(&bytes).await
    })?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::data::transforms::FiveCropMode;

    const DIRS: [&str; 7] = [
        "resnet-transfer", "train",
        "--output-data-dir", "out",
        "--model-dir", "model",
        "--data-dir=data",
    ];

    fn parse_train(extra: &[&str]) -> TrainConfig {
        let args = DIRS.iter().chain(extra).copied();
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Train(a) => a.into(),
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults() {
        let cfg = parse_train(&[]);
        assert_eq!(cfg.img_short_side_resize, 256);
        assert_eq!(cfg.img_input_size, 224);
        assert!(cfg.shuffle);
        assert_eq!(cfg.num_workers, 16);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.n_epochs, 10);
        assert_eq!(cfg.n_classes, 2);
        assert_eq!(cfg.fivecrop, FiveCropMode::Mean);
        assert_eq!(cfg.testfolder, "test_img");
    }

    #[test]
    fn test_snake_case_hyperparameters() {
        let cfg = parse_train(&[
            "--img_short_side_resize", "300",
            "--img_input_size", "256",
            "--num_workers", "2",
            "--n_epochs", "3",
            "--n_classes", "5",
            "--shuffle", "false",
        ]);
        assert_eq!(cfg.img_short_side_resize, 300);
        assert_eq!(cfg.img_input_size, 256);
        assert_eq!(cfg.num_workers, 2);
        assert_eq!(cfg.n_epochs, 3);
        assert_eq!(cfg.n_classes, 5);
        assert!(!cfg.shuffle);
    }

    #[test]
    fn test_kebab_case_still_accepted() {
        let cfg = parse_train(&["--n-epochs", "4", "--fivecrop", "max"]);
        assert_eq!(cfg.n_epochs, 4);
        assert_eq!(cfg.fivecrop, FiveCropMode::Max);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let args = DIRS.iter().chain(&["--epochs", "3"]).copied();
        assert!(Cli::try_parse_from(args).is_err());
    }
}
