// ============================================================
// Layer 5 — ResNet Backbone and Transfer Head
// ============================================================
// torchvision-layout ResNet (v1.5: stride on the 3x3 conv of
// bottleneck blocks). Field names mirror the torchvision state
// dict so pretrained PyTorch weights map onto it directly:
//
//   conv1 → bn1 → relu → maxpool
//   layer1..layer4 (Vec of residual blocks)
//   avgpool → fc
//
// Batch norm is frozen: it always normalises with the stored
// running statistics and holds no trainable state of its own,
// so a frozen backbone produces identical features in training
// and evaluation.

use std::f64::consts::SQRT_2;

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Initializer, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::transforms::FiveCropMode;

const BOTTLENECK_EXPANSION: usize = 4;

// ─── FrozenBatchNorm ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    pub weight:       Param<Tensor<B, 1>>,
    pub bias:         Param<Tensor<B, 1>>,
    pub running_mean: Param<Tensor<B, 1>>,
    pub running_var:  Param<Tensor<B, 1>>,
    pub epsilon:      f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        let frozen = |t: Tensor<B, 1>| Param::from_tensor(t).set_require_grad(false);
        Self {
            weight:       frozen(Tensor::ones([channels], device)),
            bias:         frozen(Tensor::zeros([channels], device)),
            running_mean: frozen(Tensor::zeros([channels], device)),
            running_var:  frozen(Tensor::ones([channels], device)),
            epsilon:      1e-5,
        }
    }

    /// x: [N, C, H, W]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let scale = self.weight.val() / (self.running_var.val() + self.epsilon).sqrt();
        let shift = self.bias.val() - self.running_mean.val() * scale.clone();
        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}

fn conv<B: Backend>(
    in_ch:  usize,
    out_ch: usize,
    kernel: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_ch, out_ch], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(kernel / 2, kernel / 2))
        .with_bias(false)
        .init(device)
}

// ─── Residual blocks ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   FrozenBatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Basic block when `conv3` is absent, bottleneck block otherwise.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub bn1:        FrozenBatchNorm<B>,
    pub conv2:      Conv2d<B>,
    pub bn2:        FrozenBatchNorm<B>,
    pub conv3:      Option<Conv2d<B>>,
    pub bn3:        Option<FrozenBatchNorm<B>>,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    fn basic(in_ch: usize, planes: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv1:      conv(in_ch, planes, 3, stride, device),
            bn1:        FrozenBatchNorm::new(planes, device),
            conv2:      conv(planes, planes, 3, 1, device),
            bn2:        FrozenBatchNorm::new(planes, device),
            conv3:      None,
            bn3:        None,
            downsample: downsample(in_ch, planes, stride, device),
        }
    }

    fn bottleneck(in_ch: usize, planes: usize, stride: usize, device: &B::Device) -> Self {
        let out_ch = planes * BOTTLENECK_EXPANSION;
        Self {
            conv1:      conv(in_ch, planes, 1, 1, device),
            bn1:        FrozenBatchNorm::new(planes, device),
            conv2:      conv(planes, planes, 3, stride, device),
            bn2:        FrozenBatchNorm::new(planes, device),
            conv3:      Some(conv(planes, out_ch, 1, 1, device)),
            bn3:        Some(FrozenBatchNorm::new(out_ch, device)),
            downsample: downsample(in_ch, out_ch, stride, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(d) => d.forward(x.clone()),
            None    => x.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));
        let out = match (&self.conv3, &self.bn3) {
            (Some(conv3), Some(bn3)) => bn3.forward(conv3.forward(relu(out))),
            _ => out,
        };

        relu(out + identity)
    }
}

fn downsample<B: Backend>(
    in_ch:  usize,
    out_ch: usize,
    stride: usize,
    device: &B::Device,
) -> Option<Downsample<B>> {
    (stride != 1 || in_ch != out_ch).then(|| Downsample {
        conv: conv(in_ch, out_ch, 1, stride, device),
        bn:   FrozenBatchNorm::new(out_ch, device),
    })
}

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// 18, 34, 50, 101 or 152
    #[config(default = 50)]
    pub depth: usize,
    /// Channels of the first stage; stages double it each time
    #[config(default = 64)]
    pub base_width: usize,
    /// Output dimension of `fc` (1000 for ImageNet weights)
    #[config(default = 1000)]
    pub num_classes: usize,
}

impl ResNetConfig {
    /// Blocks per stage and whether the stages use bottleneck blocks.
    pub fn layout(&self) -> Result<([usize; 4], bool)> {
        Ok(match self.depth {
            18  => ([2, 2, 2, 2], false),
            34  => ([3, 4, 6, 3], false),
            50  => ([3, 4, 6, 3], true),
            101 => ([3, 4, 23, 3], true),
            152 => ([3, 8, 36, 3], true),
            d   => bail!("unsupported ResNet depth {d} (expected 18, 34, 50, 101 or 152)"),
        })
    }

    /// Width of the pooled feature vector feeding `fc`.
    pub fn num_features(&self) -> Result<usize> {
        let (_, bottleneck) = self.layout()?;
        let expansion = if bottleneck { BOTTLENECK_EXPANSION } else { 1 };
        Ok(self.base_width * 8 * expansion)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResNet<B>> {
        let (blocks, bottleneck) = self.layout()?;
        let expansion = if bottleneck { BOTTLENECK_EXPANSION } else { 1 };

        let stem_width = self.base_width;
        let mut in_ch  = stem_width;
        let mut stages = Vec::with_capacity(4);

        for (i, &count) in blocks.iter().enumerate() {
            let planes = self.base_width << i;
            let stride = if i == 0 { 1 } else { 2 };
            let mut stage = Vec::with_capacity(count);
            for b in 0..count {
                let s = if b == 0 { stride } else { 1 };
                stage.push(if bottleneck {
                    ResidualBlock::bottleneck(in_ch, planes, s, device)
                } else {
                    ResidualBlock::basic(in_ch, planes, s, device)
                });
                in_ch = planes * expansion;
            }
            stages.push(stage);
        }

        let mut stages = stages.into_iter();
        let mut next = || stages.next().unwrap_or_default();

        Ok(ResNet {
            conv1:   conv(3, stem_width, 7, 2, device),
            bn1:     FrozenBatchNorm::new(stem_width, device),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            layer1:  next(),
            layer2:  next(),
            layer3:  next(),
            layer4:  next(),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc:      LinearConfig::new(in_ch, self.num_classes).init(device),
            num_features: in_ch,
        })
    }
}

// ─── ResNet ───────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub conv1:        Conv2d<B>,
    pub bn1:          FrozenBatchNorm<B>,
    pub maxpool:      MaxPool2d,
    pub layer1:       Vec<ResidualBlock<B>>,
    pub layer2:       Vec<ResidualBlock<B>>,
    pub layer3:       Vec<ResidualBlock<B>>,
    pub layer4:       Vec<ResidualBlock<B>>,
    pub avgpool:      AdaptiveAvgPool2d,
    pub fc:           Linear<B>,
    pub num_features: usize,
}

impl<B: Backend> ResNet<B> {
    /// images: [N, 3, H, W] → logits: [N, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(images)));
        let mut x = self.maxpool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }

        let x = self.avgpool.forward(x); // [N, C, 1, 1]
        let [n, c, _, _] = x.dims();
        self.fc.forward(x.reshape([n, c]))
    }

    /// crops: [N, K, 3, H, W] → logits: [N, num_classes]
    ///
    /// The crops are fused into the batch dimension for one forward
    /// pass, then reduced per example over K.
    pub fn forward_crops(&self, crops: Tensor<B, 5>, mode: FiveCropMode) -> Tensor<B, 2> {
        let [n, k, c, h, w] = crops.dims();
        let logits = self.forward(crops.reshape([n * k, c, h, w]));
        let classes = logits.dims()[1];
        let logits = logits.reshape([n, k, classes]);

        let pooled = match mode {
            FiveCropMode::Max => logits.max_dim(1),
            FiveCropMode::Mean | FiveCropMode::Off => logits.mean_dim(1),
        };
        pooled.reshape([n, classes])
    }

    /// Mean cross-entropy over the batch
    pub fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets)
    }

    /// Transfer-learning adaptation:
    ///   1. every existing parameter stops receiving gradients
    ///   2. `fc` is replaced by a fresh `num_features → n_classes` layer
    ///   3. the new weight uses Kaiming-normal init (ReLU gain, fan-in);
    ///      the bias keeps the default uniform(±1/√fan_in)
    pub fn into_transfer(self, n_classes: usize, device: &B::Device) -> Self {
        let mut model = self.no_grad();
        let fan_in    = model.num_features;

        let mut fc = LinearConfig::new(fan_in, n_classes).init(device);
        fc.weight = Initializer::KaimingNormal { gain: SQRT_2, fan_out_only: false }
            .init_with([fan_in, n_classes], Some(fan_in), Some(n_classes), device);

        model.fc = fc;
        model
    }

    pub fn num_classes(&self) -> usize {
        self.fc.weight.val().dims()[1]
    }
}
