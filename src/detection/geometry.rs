//! Line segment extraction.
//!
//! An LSD-style detector: Sobel gradients, region growing over pixels whose
//! gradient orientation agrees with the region's running orientation, and a
//! principal-axis fit of each region to a segment. Orientation is compared
//! modulo 180 degrees, so dark-to-light and light-to-dark edges of the same
//! line grow together.
//!
//! The detector does not impose a minimum segment length; callers filter by
//! length where it matters (see [`crate::detection::region::filter_by_angle`]).

use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::detection::preprocessing::to_grayscale;
use crate::models::LineSegment;

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Anything that can find line segments in a raster.
pub trait SegmentDetector: Send + Sync {
    fn detect(&self, raster: &DynamicImage) -> Vec<LineSegment>;
}

/// Region-growing line segment detector.
#[derive(Debug, Clone)]
pub struct LsdDetector {
    /// Minimum gradient magnitude, in grey levels per pixel.
    pub gradient_threshold: f32,
    /// Maximum orientation disagreement (degrees) between a pixel and its region.
    pub angle_tolerance: f32,
    /// Regions with fewer pixels are treated as noise.
    pub min_region_size: usize,
    /// Minimum share of the fitted rectangle covered by region pixels. The
    /// rectangle is padded by a pixel in both directions, so thin anti-aliased
    /// edges land well below 1.0.
    pub min_density: f32,
}

impl Default for LsdDetector {
    fn default() -> Self {
        Self {
            gradient_threshold: 5.2,
            angle_tolerance: 22.5,
            min_region_size: 5,
            min_density: 0.5,
        }
    }
}

impl<D: SegmentDetector + ?Sized> SegmentDetector for Arc<D> {
    fn detect(&self, raster: &DynamicImage) -> Vec<LineSegment> {
        (**self).detect(raster)
    }
}

impl SegmentDetector for LsdDetector {
    fn detect(&self, raster: &DynamicImage) -> Vec<LineSegment> {
        let gray = to_grayscale(raster);
        let segments = self.detect_gray(&gray);
        tracing::debug!(count = segments.len(), "line segments extracted");
        segments
    }
}

impl LsdDetector {
    pub fn detect_gray(&self, gray: &GrayImage) -> Vec<LineSegment> {
        let field = GradientField::new(gray);
        RegionGrower::new(&field, self).run()
    }
}

/// Segments found by the default detector.
pub fn extract_line_segments(raster: &DynamicImage) -> Vec<LineSegment> {
    LsdDetector::default().detect(raster)
}

struct GradientField {
    width: usize,
    height: usize,
    magnitude: Vec<f32>,
    /// Gradient orientation in radians, folded into [0, pi).
    orientation: Vec<f32>,
}

impl GradientField {
    fn new(gray: &GrayImage) -> Self {
        let gx = horizontal_sobel(gray);
        let gy = vertical_sobel(gray);
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        let mut magnitude = Vec::with_capacity(width * height);
        let mut orientation = Vec::with_capacity(width * height);
        // Sobel responds with 8x the per-pixel intensity slope
        for (dx, dy) in gx.pixels().zip(gy.pixels()) {
            let dx = dx[0] as f32 / 8.0;
            let dy = dy[0] as f32 / 8.0;
            magnitude.push((dx * dx + dy * dy).sqrt());
            orientation.push(dy.atan2(dx).rem_euclid(std::f32::consts::PI));
        }
        Self {
            width,
            height,
            magnitude,
            orientation,
        }
    }
}

/// Running sums for one region: doubled-angle vector for the mean
/// orientation, and weighted moments for the line fit.
///
/// Moments are taken relative to the region's first pixel and kept in f64;
/// raw image coordinates squared swamp the variance of a short edge.
#[derive(Default)]
struct Region {
    pixels: Vec<usize>,
    origin: (f64, f64),
    cos2: f32,
    sin2: f32,
    weight: f64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

impl Region {
    fn clear(&mut self) {
        self.pixels.clear();
        self.origin = (0.0, 0.0);
        self.cos2 = 0.0;
        self.sin2 = 0.0;
        self.weight = 0.0;
        self.sum_x = 0.0;
        self.sum_y = 0.0;
        self.sum_xx = 0.0;
        self.sum_yy = 0.0;
        self.sum_xy = 0.0;
    }

    fn push(&mut self, idx: usize, x: f64, y: f64, angle: f32, magnitude: f32) {
        if self.pixels.is_empty() {
            self.origin = (x, y);
        }
        self.pixels.push(idx);
        self.cos2 += (2.0 * angle).cos();
        self.sin2 += (2.0 * angle).sin();

        let (x, y) = (x - self.origin.0, y - self.origin.1);
        let m = magnitude as f64;
        self.weight += m;
        self.sum_x += m * x;
        self.sum_y += m * y;
        self.sum_xx += m * x * x;
        self.sum_yy += m * y * y;
        self.sum_xy += m * x * y;
    }

    fn mean_angle(&self) -> f32 {
        (0.5 * self.sin2.atan2(self.cos2)).rem_euclid(std::f32::consts::PI)
    }
}

struct RegionGrower<'a> {
    field: &'a GradientField,
    options: &'a LsdDetector,
    tolerance: f32,
    used: Vec<bool>,
    stack: Vec<usize>,
    region: Region,
}

impl<'a> RegionGrower<'a> {
    fn new(field: &'a GradientField, options: &'a LsdDetector) -> Self {
        Self {
            field,
            options,
            tolerance: options.angle_tolerance.to_radians(),
            used: vec![false; field.width * field.height],
            stack: Vec::with_capacity(64),
            region: Region::default(),
        }
    }

    fn run(mut self) -> Vec<LineSegment> {
        // strongest edges seed first, as in LSD's pseudo-ordering
        let mut seeds: Vec<usize> = (0..self.field.magnitude.len())
            .filter(|&idx| self.field.magnitude[idx] >= self.options.gradient_threshold)
            .collect();
        seeds.sort_by(|&a, &b| {
            self.field.magnitude[b].total_cmp(&self.field.magnitude[a])
        });

        let mut segments = Vec::new();
        for seed in seeds {
            if self.used[seed] {
                continue;
            }
            self.grow(seed);
            if let Some(segment) = self.fit_segment() {
                segments.push(segment);
            }
        }
        segments
    }

    fn grow(&mut self, seed: usize) {
        let width = self.field.width;
        self.region.clear();
        self.stack.clear();
        self.used[seed] = true;
        self.stack.push(seed);

        while let Some(idx) = self.stack.pop() {
            let (x, y) = ((idx % width) as i64, (idx / width) as i64);
            self.region.push(
                idx,
                x as f64,
                y as f64,
                self.field.orientation[idx],
                self.field.magnitude[idx],
            );
            let region_angle = self.region.mean_angle();

            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= self.field.height as i64 {
                    continue;
                }
                let neighbour = ny as usize * width + nx as usize;
                if self.used[neighbour]
                    || self.field.magnitude[neighbour] < self.options.gradient_threshold
                {
                    continue;
                }
                if orientation_gap(self.field.orientation[neighbour], region_angle)
                    <= self.tolerance
                {
                    self.used[neighbour] = true;
                    self.stack.push(neighbour);
                }
            }
        }
    }

    /// Principal-axis fit of the current region, or `None` if it does not
    /// look like a line.
    fn fit_segment(&self) -> Option<LineSegment> {
        let region = &self.region;
        if region.pixels.len() < self.options.min_region_size || region.weight <= 0.0 {
            return None;
        }

        // centroid relative to the origin pixel
        let mx = region.sum_x / region.weight;
        let my = region.sum_y / region.weight;
        let cxx = region.sum_xx / region.weight - mx * mx;
        let cyy = region.sum_yy / region.weight - my * my;
        let cxy = region.sum_xy / region.weight - mx * my;

        // major axis of the second-moment ellipse
        let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
        let (ty, tx) = theta.sin_cos();
        let (nx, ny) = (-ty, tx);

        let (ox, oy) = region.origin;
        let (cx, cy) = (ox + mx, oy + my);
        let width = self.field.width;
        let mut along = (f64::INFINITY, f64::NEG_INFINITY);
        let mut across = (f64::INFINITY, f64::NEG_INFINITY);
        for &idx in &region.pixels {
            let dx = (idx % width) as f64 - cx;
            let dy = (idx / width) as f64 - cy;
            let s = dx * tx + dy * ty;
            let t = dx * nx + dy * ny;
            along = (along.0.min(s), along.1.max(s));
            across = (across.0.min(t), across.1.max(t));
        }

        let length = along.1 - along.0;
        if !length.is_finite() || length <= 0.0 {
            return None;
        }
        let thickness = across.1 - across.0 + 1.0;
        let density = region.pixels.len() as f64 / ((length + 1.0) * thickness);
        if density < self.options.min_density as f64 {
            return None;
        }

        Some(LineSegment::new(
            (cx + along.0 * tx) as f32,
            (cy + along.0 * ty) as f32,
            (cx + along.1 * tx) as f32,
            (cy + along.1 * ty) as f32,
        ))
    }
}

/// Gap between two orientations folded into [0, pi).
fn orientation_gap(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs() % std::f32::consts::PI;
    diff.min(std::f32::consts::PI - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn vertical_step(width: u32, height: u32, split_x: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            if x < split_x { Luma([20]) } else { Luma([220]) }
        })
    }

    fn longest(segments: &[LineSegment]) -> LineSegment {
        *segments
            .iter()
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .expect("at least one segment")
    }

    #[test]
    fn finds_vertical_edge() {
        let raster = DynamicImage::ImageLuma8(vertical_step(40, 40, 20));
        let segments = extract_line_segments(&raster);
        let edge = longest(&segments);
        assert!((edge.angle() - 90.0).abs() < 1.0, "angle {}", edge.angle());
        assert!(edge.length() > 30.0, "length {}", edge.length());
        assert!((edge.x1 - 19.5).abs() < 1.0);
    }

    #[test]
    fn flat_raster_has_no_segments() {
        let raster = DynamicImage::ImageLuma8(GrayImage::from_pixel(24, 24, Luma([128])));
        assert!(extract_line_segments(&raster).is_empty());
    }

    #[test]
    fn tilted_edge_angle_is_recovered() {
        // half-plane boundary at 30 degrees, 4x4 supersampled
        let angle = 30f32.to_radians();
        let (sin, cos) = angle.sin_cos();
        let raster = GrayImage::from_fn(80, 80, |x, y| {
            let mut covered = 0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let px = x as f32 + (sx as f32 + 0.5) / 4.0 - 40.0;
                    let py = y as f32 + (sy as f32 + 0.5) / 4.0 - 40.0;
                    if -px * sin + py * cos > 0.0 {
                        covered += 1;
                    }
                }
            }
            Luma([(230 - covered * 200 / 16) as u8])
        });
        let segments = LsdDetector::default().detect_gray(&raster);
        let edge = longest(&segments);
        assert!((edge.angle() - 30.0).abs() < 1.0, "angle {}", edge.angle());
    }

    /// 24x8 dark bar at 30 degrees centred on (`center`, `center`).
    fn tilted_bar(size: u32, center: f32) -> GrayImage {
        let (sin, cos) = 30f32.to_radians().sin_cos();
        GrayImage::from_fn(size, size, |x, y| {
            if (x as f32 - center).abs() > 16.0 || (y as f32 - center).abs() > 16.0 {
                return Luma([230]);
            }
            let mut covered = 0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let px = x as f32 + (sx as f32 + 0.5) / 4.0 - center;
                    let py = y as f32 + (sy as f32 + 0.5) / 4.0 - center;
                    let along = px * cos + py * sin;
                    let across = -px * sin + py * cos;
                    if along.abs() <= 12.0 && across.abs() <= 4.0 {
                        covered += 1;
                    }
                }
            }
            Luma([(230 - covered * 200 / 16) as u8])
        })
    }

    #[test]
    fn edge_angle_does_not_depend_on_position() {
        let detector = LsdDetector::default();
        let near = longest(&detector.detect_gray(&tilted_bar(200, 100.0)));
        let far = longest(&detector.detect_gray(&tilted_bar(3000, 2900.0)));

        assert!((near.angle() - 30.0).abs() < 1.0, "near angle {}", near.angle());
        assert!((far.angle() - 30.0).abs() < 1.0, "far angle {}", far.angle());
        assert!((near.angle() - far.angle()).abs() < 0.05);
        assert!((far.x1.min(far.x2) - 2890.0).abs() < 5.0, "far segment {far:?}");
    }

    #[test]
    fn orientation_gap_wraps() {
        let pi = std::f32::consts::PI;
        assert!(orientation_gap(0.05, pi - 0.05) < 0.11);
        assert!((orientation_gap(0.0, pi / 2.0) - pi / 2.0).abs() < 1e-6);
    }
}
