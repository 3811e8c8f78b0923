use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use crate::models::LineSegment;

/// Unsigned distance between two orientations on the [0, 180) circle.
pub fn angular_distance(angle: f32, target: f32) -> f32 {
    let diff = angle - target;
    diff.abs()
        .min((diff + 180.0).abs())
        .min((diff - 180.0).abs())
}

/// Segments at least `min_length` long whose orientation is within
/// `tolerance` degrees of `target`.
pub fn filter_by_angle(
    segments: &[LineSegment],
    target: f32,
    tolerance: f32,
    min_length: f32,
) -> Vec<LineSegment> {
    segments
        .iter()
        .filter(|s| s.length() >= min_length)
        .filter(|s| angular_distance(s.angle(), target) <= tolerance)
        .copied()
        .collect()
}

/// Binary mask (0/255) of the convex hull around all segment endpoints.
///
/// Fewer than three endpoints, or endpoints that collapse to a line, give an
/// all-zero mask.
pub fn convex_hull_mask(width: u32, height: u32, segments: &[LineSegment]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    let points: Vec<Point<i32>> = segments
        .iter()
        .flat_map(|s| s.endpoints())
        .map(|(x, y)| Point::new(x as i32, y as i32))
        .collect();
    if points.len() < 3 {
        return mask;
    }

    let mut hull = convex_hull(points);
    if hull.len() > 1 && hull.first() == hull.last() {
        hull.pop();
    }
    if hull.len() < 3 || twice_area(&hull) == 0 {
        return mask;
    }

    draw_polygon_mut(&mut mask, &hull, Luma([255u8]));
    mask
}

fn twice_area(polygon: &[Point<i32>]) -> i64 {
    let n = polygon.len();
    let mut sum = 0i64;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        sum += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    sum.abs()
}

/// Zero every pixel (all channels) where `mask` is zero.
pub fn apply_mask(raster: &DynamicImage, mask: &GrayImage) -> DynamicImage {
    let inside = |x: u32, y: u32| {
        x < mask.width() && y < mask.height() && mask.get_pixel(x, y)[0] != 0
    };
    match raster {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = gray.clone();
            for (x, y, pixel) in out.enumerate_pixels_mut() {
                if !inside(x, y) {
                    pixel[0] = 0;
                }
            }
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let mut out = other.to_rgb8();
            for (x, y, pixel) in out.enumerate_pixels_mut() {
                if !inside(x, y) {
                    pixel.0 = [0, 0, 0];
                }
            }
            DynamicImage::ImageRgb8(out)
        }
    }
}
