// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `predict` and `invoke`.
//
// The directory flags of `train` fall back to the environment
// variables a SageMaker training container sets, and the
// snake_case hyperparameter spellings SageMaker passes
// (`--n_epochs`, `--img_input_size`, ...) are accepted as
// aliases, so the binary runs unchanged as a training-job
// entry point.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::transforms::FiveCropMode;
use crate::ml::backend::BackendKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a pretrained ResNet on an image-folder dataset
    Train(TrainArgs),

    /// Classify an image with a trained model directory
    Predict(PredictArgs),

    /// Send an image to a deployed endpoint and print the gateway response
    Invoke(InvokeArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Where metrics.csv and train_config.json are written
    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    pub output_data_dir: PathBuf,

    /// Where model.pth, best_model.pth and model_info.pth are written
    #[arg(long, env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Root holding the train/valid/test folders
    #[arg(long, env = "SM_CHANNEL_TRAIN")]
    pub data_dir: PathBuf,

    /// Training images are resized so their short side has this length
    #[arg(long, alias = "img_short_side_resize", default_value_t = 256)]
    pub img_short_side_resize: u32,

    /// Side of the square crops fed to the network
    #[arg(long, alias = "img_input_size", default_value_t = 224)]
    pub img_input_size: u32,

    /// Shuffle the loaders (seeded by --seed)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub shuffle: bool,

    /// Data-loader worker threads for the training split
    #[arg(long, alias = "num_workers", default_value_t = 16)]
    pub num_workers: usize,

    #[arg(long, default_value = "train_img")]
    pub trainfolder: String,

    #[arg(long, default_value = "valid_img")]
    pub validfolder: String,

    /// Optional; test evaluation is skipped if it doesn't exist
    #[arg(long, default_value = "test_img")]
    pub testfolder: String,

    /// Training batch size; five-crop evaluation uses batch_size / 5
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, alias = "n_epochs", default_value_t = 10)]
    pub n_epochs: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Initial Adam learning rate (halved on validation plateaus)
    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,

    /// Outputs of the replacement classification layer
    #[arg(long, alias = "n_classes", default_value_t = 2)]
    pub n_classes: usize,

    /// ResNet depth: 18, 34, 50, 101 or 152
    #[arg(long, default_value_t = 50)]
    pub depth: usize,

    #[arg(long, default_value_t = 64)]
    pub base_width: usize,

    /// ImageNet weights (.pth/.pt torchvision state dict or .mpk Burn record)
    #[arg(long)]
    pub pretrained: Option<PathBuf>,

    /// Evaluation crops: mean, max (five-crop pooling) or none (centre crop)
    #[arg(long, default_value = "mean")]
    pub fivecrop: FiveCropMode,

    /// wgpu or ndarray
    #[arg(long, default_value = "wgpu")]
    pub backend: BackendKind,

    /// Use the wgpu CPU adapter instead of the default GPU
    #[arg(long)]
    pub cpu: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            output_data_dir:       a.output_data_dir,
            model_dir:             a.model_dir,
            data_dir:              a.data_dir,
            img_short_side_resize: a.img_short_side_resize,
            img_input_size:        a.img_input_size,
            shuffle:               a.shuffle,
            num_workers:           a.num_workers,
            trainfolder:           a.trainfolder,
            validfolder:           a.validfolder,
            testfolder:            a.testfolder,
            batch_size:            a.batch_size,
            n_epochs:              a.n_epochs,
            seed:                  a.seed,
            lr:                    a.lr,
            n_classes:             a.n_classes,
            depth:                 a.depth,
            base_width:            a.base_width,
            pretrained:            a.pretrained,
            fivecrop:              a.fivecrop,
            backend:               a.backend,
            cpu:                   a.cpu,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory holding model.pth and model_info.pth
    #[arg(long, env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Image file to classify
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long, default_value = "wgpu")]
    pub backend: BackendKind,

    #[arg(long)]
    pub cpu: bool,
}

/// All arguments for the `invoke` command
#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Name of the deployed SageMaker endpoint
    #[arg(long, env = "ENDPOINT_NAME")]
    pub endpoint_name: String,

    /// Image file to send
    #[arg(long)]
    pub image: PathBuf,
}
