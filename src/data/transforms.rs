// ============================================================
// Layer 4 — Image Transforms
// ============================================================
// Turns a decoded image into the normalised CHW float buffer
// the network consumes.
//
// Training chain (random, applied per sample):
//   resize short side → colour jitter → horizontal flip
//   → random resized crop → to tensor → normalise
//
// Evaluation chain (deterministic):
//   resize short side → five crop (tl, tr, bl, br, centre)
//   → per crop: to tensor → normalise
//
// All geometry follows the torchvision conventions so weights
// pretrained there see the same statistics here.

use std::str::FromStr;

use anyhow::{bail, Result};
use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// ImageNet channel means (RGB)
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB)
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Number of crops produced by the five-crop transform
pub const FIVE_CROPS: usize = 5;

// ─── FiveCropMode ─────────────────────────────────────────────────────────────
/// How evaluation crops are produced and pooled.
///
/// `Mean` and `Max` use the five-crop transform and reduce the
/// per-crop logits over the crop dimension; `Off` feeds a single
/// centre crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiveCropMode {
    Mean,
    Max,
    Off,
}

impl FiveCropMode {
    pub fn num_crops(self) -> usize {
        match self {
            FiveCropMode::Mean | FiveCropMode::Max => FIVE_CROPS,
            FiveCropMode::Off => 1,
        }
    }

    pub fn is_five_crop(self) -> bool {
        self.num_crops() == FIVE_CROPS
    }
}

impl FromStr for FiveCropMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean"         => Ok(FiveCropMode::Mean),
            "max"          => Ok(FiveCropMode::Max),
            "none" | "off" => Ok(FiveCropMode::Off),
            other          => bail!("unknown five-crop mode '{other}' (expected mean, max or none)"),
        }
    }
}

// ─── Geometry ─────────────────────────────────────────────────────────────────

/// Resize so the shorter side equals `size`, keeping the aspect ratio.
pub fn resize_short_side(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = if w <= h {
        (size, ((size as u64 * h as u64) / w.max(1) as u64) as u32)
    } else {
        (((size as u64 * w as u64) / h.max(1) as u64) as u32, size)
    };
    if (new_w, new_h) == (w, h) {
        return img.clone();
    }
    imageops::resize(img, new_w.max(1), new_h.max(1), FilterType::Triangle)
}

fn crop(img: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
    imageops::crop_imm(img, x, y, w, h).to_image()
}

/// Square centre crop of side `size`.
pub fn center_crop(img: &RgbImage, size: u32) -> Result<RgbImage> {
    let (w, h) = img.dimensions();
    if size > w || size > h {
        bail!("crop size {size} is larger than image {w}x{h}");
    }
    let top  = ((h - size) as f64 / 2.0).round() as u32;
    let left = ((w - size) as f64 / 2.0).round() as u32;
    Ok(crop(img, left, top, size, size))
}

/// Four corner crops plus the centre crop, in that order:
/// top-left, top-right, bottom-left, bottom-right, centre.
pub fn five_crop(img: &RgbImage, size: u32) -> Result<[RgbImage; FIVE_CROPS]> {
    let (w, h) = img.dimensions();
    if size > w || size > h {
        bail!("crop size {size} is larger than image {w}x{h}");
    }
    Ok([
        crop(img, 0,        0,        size, size),
        crop(img, w - size, 0,        size, size),
        crop(img, 0,        h - size, size, size),
        crop(img, w - size, h - size, size, size),
        center_crop(img, size)?,
    ])
}

/// Crop a random region covering `scale` of the area with an aspect
/// ratio drawn log-uniformly from `ratio`, then resize it to `size`².
pub fn random_resized_crop<R: Rng>(
    img:   &RgbImage,
    size:  u32,
    scale: (f64, f64),
    ratio: (f64, f64),
    rng:   &mut R,
) -> RgbImage {
    let (x, y, cw, ch) = random_resized_crop_params(img.dimensions(), scale, ratio, rng);
    let region = crop(img, x, y, cw, ch);
    imageops::resize(&region, size, size, FilterType::Triangle)
}

/// Returns `(left, top, width, height)` of the region to crop.
fn random_resized_crop_params<R: Rng>(
    (w, h): (u32, u32),
    scale:  (f64, f64),
    ratio:  (f64, f64),
    rng:    &mut R,
) -> (u32, u32, u32, u32) {
    let area = (w as f64) * (h as f64);
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());

    for _ in 0..10 {
        let target_area = area * uniform(rng, scale.0, scale.1);
        let aspect      = uniform(rng, log_lo, log_hi).exp();

        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;

        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let top  = rng.gen_range(0..=h - ch);
            let left = rng.gen_range(0..=w - cw);
            return (left, top, cw, ch);
        }
    }

    // Fallback: centre crop clamped to the allowed aspect range
    let in_ratio = w as f64 / h as f64;
    let (cw, ch) = if in_ratio < ratio.0 {
        (w, ((w as f64 / ratio.0).round() as u32).clamp(1, h))
    } else if in_ratio > ratio.1 {
        (((h as f64 * ratio.1).round() as u32).clamp(1, w), h)
    } else {
        (w, h)
    };
    ((w - cw) / 2, (h - ch) / 2, cw, ch)
}

fn uniform<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

// ─── Colour jitter ────────────────────────────────────────────────────────────
/// Random brightness / contrast / saturation / hue perturbation.
/// The four adjustments are applied in a random order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorJitter {
    pub brightness: f32,
    pub contrast:   f32,
    pub saturation: f32,
    pub hue:        f32,
}

impl Default for ColorJitter {
    fn default() -> Self {
        Self { brightness: 0.2, contrast: 0.2, saturation: 0.2, hue: 0.1 }
    }
}

impl ColorJitter {
    pub fn apply<R: Rng>(&self, img: &mut RgbImage, rng: &mut R) {
        let mut order = [0u8, 1, 2, 3];
        order.shuffle(rng);

        for op in order {
            match op {
                0 if self.brightness > 0.0 => {
                    let f = factor(rng, self.brightness);
                    adjust_brightness(img, f);
                }
                1 if self.contrast > 0.0 => {
                    let f = factor(rng, self.contrast);
                    adjust_contrast(img, f);
                }
                2 if self.saturation > 0.0 => {
                    let f = factor(rng, self.saturation);
                    adjust_saturation(img, f);
                }
                3 if self.hue > 0.0 => {
                    let shift = rng.gen_range(-self.hue..=self.hue);
                    adjust_hue(img, shift);
                }
                _ => {}
            }
        }
    }
}

fn factor<R: Rng>(rng: &mut R, amount: f32) -> f32 {
    rng.gen_range((1.0 - amount).max(0.0)..=1.0 + amount)
}

fn luma(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn blend(a: f32, b: f32, f: f32) -> u8 {
    (f * a + (1.0 - f) * b).round().clamp(0.0, 255.0) as u8
}

pub fn adjust_brightness(img: &mut RgbImage, f: f32) {
    for p in img.pixels_mut() {
        for c in 0..3 {
            p[c] = blend(p[c] as f32, 0.0, f);
        }
    }
}

pub fn adjust_contrast(img: &mut RgbImage, f: f32) {
    let n = (img.width() as f32 * img.height() as f32).max(1.0);
    let mean = img.pixels().map(luma).sum::<f32>() / n;
    for p in img.pixels_mut() {
        for c in 0..3 {
            p[c] = blend(p[c] as f32, mean, f);
        }
    }
}

pub fn adjust_saturation(img: &mut RgbImage, f: f32) {
    for p in img.pixels_mut() {
        let gray = luma(p);
        for c in 0..3 {
            p[c] = blend(p[c] as f32, gray, f);
        }
    }
}

/// Rotate the hue of every pixel by `shift` turns (in [-0.5, 0.5]).
pub fn adjust_hue(img: &mut RgbImage, shift: f32) {
    for p in img.pixels_mut() {
        let (h, s, v) = rgb_to_hsv(p[0], p[1], p[2]);
        let h = (h + shift).rem_euclid(1.0);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        *p = Rgb([r, g, b]);
    }
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match (i as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let to_u8 = |x: f32| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}

// ─── Tensor conversion ────────────────────────────────────────────────────────

/// HWC u8 → CHW f32 in [0, 1], then `(x - mean) / std` per channel.
/// Appends to `out` so batchers can fill one flat buffer.
pub fn extend_normalized_chw(img: &RgbImage, out: &mut Vec<f32>) {
    let (w, h) = img.dimensions();
    out.reserve(3 * (w * h) as usize);
    for c in 0..3 {
        for p in img.pixels() {
            let x = p[c] as f32 / 255.0;
            out.push((x - NORM_MEAN[c]) / NORM_STD[c]);
        }
    }
}

// ─── Pipelines ────────────────────────────────────────────────────────────────

/// Random augmentation chain used for the training split.
#[derive(Debug, Clone)]
pub struct TrainTransform {
    pub short_side_resize: u32,
    pub input_size:        u32,
    pub jitter:            ColorJitter,
    pub flip_prob:         f64,
    pub crop_scale:        (f64, f64),
    pub crop_ratio:        (f64, f64),
}

impl TrainTransform {
    pub fn new(short_side_resize: u32, input_size: u32) -> Self {
        Self {
            short_side_resize,
            input_size,
            jitter:     ColorJitter::default(),
            flip_prob:  0.5,
            crop_scale: (0.08, 1.0),
            crop_ratio: (1.0, 1.0),
        }
    }

    /// Length of the buffer `apply` produces
    pub fn output_len(&self) -> usize {
        3 * (self.input_size * self.input_size) as usize
    }

    pub fn apply<R: Rng>(&self, img: &DynamicImage, rng: &mut R, out: &mut Vec<f32>) {
        let mut img = resize_short_side(&img.to_rgb8(), self.short_side_resize);
        self.jitter.apply(&mut img, rng);
        if rng.gen_bool(self.flip_prob) {
            img = imageops::flip_horizontal(&img);
        }
        let img = random_resized_crop(&img, self.input_size, self.crop_scale, self.crop_ratio, rng);
        extend_normalized_chw(&img, out);
    }
}

/// Deterministic chain used for validation, test and inference.
#[derive(Debug, Clone)]
pub struct EvalTransform {
    pub input_size: u32,
    pub mode:       FiveCropMode,
}

impl EvalTransform {
    pub fn new(input_size: u32, mode: FiveCropMode) -> Self {
        Self { input_size, mode }
    }

    pub fn num_crops(&self) -> usize {
        self.mode.num_crops()
    }

    /// Length of the buffer `apply` produces (all crops)
    pub fn output_len(&self) -> usize {
        self.num_crops() * 3 * (self.input_size * self.input_size) as usize
    }

    pub fn apply(&self, img: &DynamicImage, out: &mut Vec<f32>) -> Result<()> {
        let img = resize_short_side(&img.to_rgb8(), self.input_size);
        if self.mode.is_five_crop() {
            for c in five_crop(&img, self.input_size)?.iter() {
                extend_normalized_chw(c, out);
            }
        } else {
            extend_normalized_chw(&center_crop(&img, self.input_size)?, out);
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    /// Image whose red channel encodes x and green channel encodes y
    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 128]))
    }

    #[test]
    fn test_resize_short_side_keeps_aspect() {
        let img = resize_short_side(&gradient(40, 20), 10);
        assert_eq!(img.dimensions(), (20, 10));

        let img = resize_short_side(&gradient(30, 60), 15);
        assert_eq!(img.dimensions(), (15, 30));
    }

    #[test]
    fn test_five_crop_regions() {
        let img   = gradient(10, 8);
        let crops = five_crop(&img, 4).unwrap();
        // Each crop's top-left pixel reveals where it was taken from
        let origin = |c: &RgbImage| (c.get_pixel(0, 0)[0], c.get_pixel(0, 0)[1]);
        assert_eq!(origin(&crops[0]), (0, 0));
        assert_eq!(origin(&crops[1]), (6, 0));
        assert_eq!(origin(&crops[2]), (0, 4));
        assert_eq!(origin(&crops[3]), (6, 4));
        assert_eq!(origin(&crops[4]), (3, 2));
        assert!(crops.iter().all(|c| c.dimensions() == (4, 4)));
    }

    #[test]
    fn test_five_crop_rejects_small_image() {
        assert!(five_crop(&gradient(3, 8), 4).is_err());
    }

    #[test]
    fn test_random_resized_crop_output_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let out = random_resized_crop(&gradient(37, 23), 16, (0.08, 1.0), (1.0, 1.0), &mut rng);
            assert_eq!(out.dimensions(), (16, 16));
        }
    }

    #[test]
    fn test_random_resized_crop_params_square_and_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let (x, y, w, h) = random_resized_crop_params((50, 30), (0.08, 1.0), (1.0, 1.0), &mut rng);
            assert!(x + w <= 50 && y + h <= 30);
            assert!(w > 0 && h > 0);
            assert!((w as i64 - h as i64).abs() <= 1);
        }
    }

    #[test]
    fn test_normalization_values() {
        let img = RgbImage::from_pixel(2, 1, Rgb([255, 0, 0]));
        let mut out = Vec::new();
        extend_normalized_chw(&img, &mut out);
        assert_eq!(out.len(), 6);
        // CHW layout: both red values first
        let red = (1.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert!((out[0] - red).abs() < 1e-6 && (out[1] - red).abs() < 1e-6);
        let green = (0.0 - NORM_MEAN[1]) / NORM_STD[1];
        assert!((out[2] - green).abs() < 1e-6);
    }

    #[test]
    fn test_hue_round_trip_identity() {
        let mut img = gradient(16, 16);
        let original = img.clone();
        adjust_hue(&mut img, 0.0);
        for (a, b) in img.pixels().zip(original.pixels()) {
            for c in 0..3 {
                assert!((a[c] as i32 - b[c] as i32).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_saturation_zero_gives_gray() {
        let mut img = RgbImage::from_pixel(1, 1, Rgb([200, 10, 50]));
        adjust_saturation(&mut img, 0.0);
        let p = img.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_pipeline_output_lengths() {
        let img = DynamicImage::ImageRgb8(gradient(40, 30));
        let mut rng = StdRng::seed_from_u64(1);

        let train = TrainTransform::new(20, 16);
        let mut out = Vec::new();
        train.apply(&img, &mut rng, &mut out);
        assert_eq!(out.len(), train.output_len());

        let eval = EvalTransform::new(16, FiveCropMode::Mean);
        let mut out = Vec::new();
        eval.apply(&img, &mut out).unwrap();
        assert_eq!(out.len(), 5 * 3 * 16 * 16);

        let single = EvalTransform::new(16, FiveCropMode::Off);
        let mut out = Vec::new();
        single.apply(&img, &mut out).unwrap();
        assert_eq!(out.len(), 3 * 16 * 16);
    }

    #[test]
    fn test_five_crop_mode_parsing() {
        assert_eq!("mean".parse::<FiveCropMode>().unwrap(), FiveCropMode::Mean);
        assert_eq!("MAX".parse::<FiveCropMode>().unwrap(),  FiveCropMode::Max);
        assert_eq!("none".parse::<FiveCropMode>().unwrap(), FiveCropMode::Off);
        assert!("median".parse::<FiveCropMode>().is_err());
    }
}
