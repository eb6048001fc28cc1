// Same seed, same run. Kept in its own test binary because the
// NdArray backend RNG is process-global and parallel tests would
// interleave their draws.

mod common;

use std::fs;

use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

use resnet_transfer::{
    application::train_use_case::TrainUseCase,
    infra::checkpoint::MODEL_FILE,
};

use common::{dataset, tiny_config};

#[test]
fn same_seed_gives_identical_weights() {
    let tmp  = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    dataset(&data, false);

    let run = |name: &str| {
        let mut cfg = tiny_config(&tmp.path().join(name));
        cfg.data_dir = data.clone();
        cfg.seed     = 42;
        let report = TrainUseCase::new(cfg.clone())
            .run::<Autodiff<NdArray>>(&NdArrayDevice::Cpu)
            .unwrap();
        (report.summary.train_losses, fs::read(cfg.model_dir.join(MODEL_FILE)).unwrap())
    };

    let (losses_a, weights_a) = run("a");
    let (losses_b, weights_b) = run("b");
    assert_eq!(losses_a, losses_b);
    assert!(weights_a == weights_b, "model.pth differs between same-seed runs");
}
