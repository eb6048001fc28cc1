// Synthetic image-folder fixtures shared by the integration tests.

#![allow(dead_code)]

use std::{fs, path::Path};

use burn::{backend::NdArray, tensor::Tensor};
use image::{Rgb, RgbImage};

use resnet_transfer::{
    application::train_use_case::TrainConfig,
    data::{loader::LoaderSettings, transforms::FiveCropMode},
    ml::{
        backend::BackendKind,
        model::{ResNet, ResNetConfig},
    },
};

const RED:  [u8; 3] = [220, 30, 30];
const BLUE: [u8; 3] = [30, 30, 220];

/// Writes `per_class` noisy images per colour class into `dir`.
/// With `swapped`, the `red` folder holds blue images and vice versa.
pub fn write_split(dir: &Path, per_class: u32, swapped: bool) {
    let (red, blue) = if swapped { (BLUE, RED) } else { (RED, BLUE) };
    for (name, colour) in [("red", red), ("blue", blue)] {
        let class_dir = dir.join(name);
        fs::create_dir_all(&class_dir).unwrap();
        for i in 0..per_class {
            let img = RgbImage::from_fn(24, 20, |x, y| {
                let n = ((x * 13 + y * 7 + i * 31) % 40) as u8;
                Rgb([colour[0].saturating_sub(n), colour[1] + n / 2, colour[2].saturating_sub(n)])
            });
            img.save(class_dir.join(format!("{i}.png"))).unwrap();
        }
    }
}

pub fn dataset(root: &Path, with_test: bool) {
    write_split(&root.join("train_img"), 3, false);
    write_split(&root.join("valid_img"), 2, false);
    if with_test {
        write_split(&root.join("test_img"), 2, false);
    }
}

pub fn tiny_config(root: &Path) -> TrainConfig {
    TrainConfig {
        output_data_dir:       root.join("output"),
        model_dir:             root.join("model"),
        data_dir:              root.join("data"),
        img_short_side_resize: 20,
        img_input_size:        16,
        num_workers:           0,
        batch_size:            5,
        n_epochs:              2,
        lr:                    1e-2,
        depth:                 18,
        base_width:            4,
        backend:               BackendKind::NdArray,
        ..TrainConfig::default()
    }
}

pub fn settings(batch_size: usize) -> LoaderSettings {
    LoaderSettings {
        img_short_side_resize: 20,
        img_input_size:        16,
        shuffle:               true,
        num_workers:           0,
        batch_size,
        seed:                  7,
        fivecrop:              FiveCropMode::Mean,
    }
}

/// Untrained model with the architecture `tiny_config` trains.
pub fn tiny_model(n_classes: usize) -> ResNet<NdArray> {
    ResNetConfig::new()
        .with_depth(18)
        .with_base_width(4)
        .with_num_classes(n_classes)
        .init(&Default::default())
        .unwrap()
}

pub fn values<const D: usize>(t: Tensor<NdArray, D>) -> Vec<f32> {
    t.into_data().to_vec::<f32>().unwrap()
}
