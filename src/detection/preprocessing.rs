//! The preprocessing bank: a fixed, ordered list of grayscale and binarized
//! renditions of a region, cheapest first.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{Mask, grayscale_close};
use serde::Serialize;

/// Sigma matching a 3x3 Gaussian kernel.
const BLUR_SIGMA: f32 = 0.8;
const ADAPTIVE_BLOCK_SIZE: u32 = 11;
const ADAPTIVE_OFFSET: f32 = 2.0;
const ENHANCE_GAIN: f32 = 1.5;
const ENHANCE_BIAS: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Original,
    Otsu,
    Adaptive,
    Morph,
    Equalized,
    Enhanced,
}

/// Search order of the bank.
pub const VARIANTS: [Variant; 6] = [
    Variant::Original,
    Variant::Otsu,
    Variant::Adaptive,
    Variant::Morph,
    Variant::Equalized,
    Variant::Enhanced,
];

impl Variant {
    pub fn label(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Otsu => "otsu",
            Variant::Adaptive => "adaptive",
            Variant::Morph => "morph",
            Variant::Equalized => "equalized",
            Variant::Enhanced => "enhanced",
        }
    }

    /// Produce this variant from a grayscale raster.
    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        match self {
            Variant::Original => gray.clone(),
            Variant::Otsu => otsu_binarize(&apply_blur(gray, BLUR_SIGMA)),
            Variant::Adaptive => {
                adaptive_gaussian_threshold(gray, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET)
            }
            Variant::Morph => close_2x2(&Variant::Otsu.apply(gray)),
            Variant::Equalized => otsu_binarize(&equalize_histogram(gray)),
            Variant::Enhanced => {
                otsu_binarize(&scale_intensity(gray, ENHANCE_GAIN, ENHANCE_BIAS))
            }
        }
    }
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// All six variants of `raster`, in search order.
pub fn preprocess_variants(raster: &DynamicImage) -> Vec<(Variant, GrayImage)> {
    let gray = to_grayscale(raster);
    VARIANTS
        .iter()
        .map(|variant| (*variant, variant.apply(&gray)))
        .collect()
}

/// Global threshold at Otsu's level: above the level is white.
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    binarize(gray, level)
}

fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Local threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel is white when it is brighter than its neighbourhood mean minus
/// `offset`. The Gaussian sigma is derived from `block_size`, so a block of
/// 11 uses sigma 2.0.
pub fn adaptive_gaussian_threshold(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let (width, height) = gray.dimensions();
    let intensity: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([gray.get_pixel(x, y)[0] as f32]));
    let local_mean = gaussian_blur_f32(&intensity, sigma);

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = gray.get_pixel(x, y)[0] as f32;
        let threshold = local_mean.get_pixel(x, y)[0] - offset;
        pixel[0] = if value > threshold { 255 } else { 0 };
    }
    out
}

/// Morphological closing with a 2x2 structuring element.
pub fn close_2x2(binary: &GrayImage) -> GrayImage {
    let element = GrayImage::from_pixel(2, 2, Luma([255u8]));
    let mask = Mask::from_image(&element, 1, 1);
    grayscale_close(binary, &mask)
}

/// Saturating linear stretch `gain * p + bias`.
pub fn scale_intensity(gray: &GrayImage, gain: f32, bias: f32) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = (pixel[0] as f32 * gain + bias).round().clamp(0.0, 255.0) as u8;
    }
    out
}
