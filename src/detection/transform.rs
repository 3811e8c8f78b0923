use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

use crate::error::{BarcodeError, Result};
use crate::models::DetectionBox;

/// Crop a detection box out of a frame, clamping it to the frame first.
pub fn crop(frame: &DynamicImage, bbox: &DetectionBox) -> Result<DynamicImage> {
    let (width, height) = (frame.width(), frame.height());
    let clamped = bbox.clamp_to(width, height);
    if clamped.is_empty() {
        return Err(BarcodeError::EmptyRegion {
            bbox: *bbox,
            frame_width: width,
            frame_height: height,
        });
    }
    Ok(frame.crop_imm(
        clamped.xmin,
        clamped.ymin,
        clamped.width(),
        clamped.height(),
    ))
}

/// Rotate about the center to undo a tilt of `angle_degrees`.
///
/// The angle is measured the same way as [`crate::LineSegment::angle`]; the
/// content is turned by the negative of it, so a segment at that angle ends up
/// horizontal. The canvas keeps its size and exposed corners are black.
pub fn rotate(raster: &DynamicImage, angle_degrees: f32) -> Cow<'_, DynamicImage> {
    if angle_degrees == 0.0 {
        return Cow::Borrowed(raster);
    }
    let theta = (-angle_degrees).to_radians();
    let rotated = match raster {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(rotate_about_center(
            gray,
            theta,
            Interpolation::Bilinear,
            Luma([0u8]),
        )),
        other => DynamicImage::ImageRgb8(rotate_about_center(
            &other.to_rgb8(),
            theta,
            Interpolation::Bilinear,
            Rgb([0u8, 0, 0]),
        )),
    };
    Cow::Owned(rotated)
}

/// Enlarge by `factor` with bicubic (Catmull-Rom) interpolation.
pub fn upscale(raster: &DynamicImage, factor: f32) -> DynamicImage {
    let (width, height) = scaled_dimensions(raster.width(), raster.height(), factor);
    raster.resize_exact(width, height, FilterType::CatmullRom)
}

/// Upscale so the raster is at least `min_width` wide, keeping the aspect ratio.
pub fn ensure_min_width(raster: DynamicImage, min_width: u32) -> DynamicImage {
    let (width, height) = (raster.width(), raster.height());
    if width == 0 || width >= min_width {
        return raster;
    }
    let new_height = ((height as f32 * min_width as f32 / width as f32).round() as u32).max(1);
    tracing::debug!(width, height, min_width, new_height, "upscaling small region");
    raster.resize_exact(min_width, new_height, FilterType::CatmullRom)
}

/// Resize a search variant by `factor`; 1.0 is a plain copy.
pub fn scale_gray(gray: &GrayImage, factor: f32) -> GrayImage {
    if factor == 1.0 {
        return gray.clone();
    }
    let (width, height) = scaled_dimensions(gray.width(), gray.height(), factor);
    imageops::resize(gray, width, height, FilterType::CatmullRom)
}

fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let scaled_w = ((width as f32 * factor) as u32).max(1);
    let scaled_h = ((height as f32 * factor) as u32).max(1);
    (scaled_w, scaled_h)
}
