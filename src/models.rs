use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::detection::rotation::normalize_angle;
use crate::pipeline::Stage;

/// A straight edge found in a raster, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LineSegment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Segment starting at `(x, y)` running `length` pixels at `angle` degrees.
    pub fn from_polar(x: f32, y: f32, angle: f32, length: f32) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self::new(x, y, x + length * cos, y + length * sin)
    }

    pub fn length(&self) -> f32 {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Orientation in degrees, folded into [0, 180).
    pub fn angle(&self) -> f32 {
        let raw = (self.y2 - self.y1).atan2(self.x2 - self.x1).to_degrees();
        normalize_angle(raw)
    }

    pub fn endpoints(&self) -> [(f32, f32); 2] {
        [(self.x1, self.y1), (self.x2, self.y2)]
    }
}

/// Axis-aligned box produced by the object detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
    #[serde(rename = "class")]
    pub class_id: u32,
    pub confidence: f32,
}

impl DetectionBox {
    pub fn new(xmin: u32, ymin: u32, xmax: u32, ymax: u32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            class_id: 0,
            confidence: 1.0,
        }
    }

    /// Box covering a whole `width` x `height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn width(&self) -> u32 {
        self.xmax.saturating_sub(self.xmin)
    }

    pub fn height(&self) -> u32 {
        self.ymax.saturating_sub(self.ymin)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp all coordinates into a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            xmin: self.xmin.min(width),
            ymin: self.ymin.min(height),
            xmax: self.xmax.min(width),
            ymax: self.ymax.min(height),
            ..*self
        }
    }
}

impl fmt::Display for DetectionBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})-({}, {})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Location of a decoded symbol inside the raster handed to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegionRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RegionRect {
    /// Bounding rectangle of a set of corner points.
    pub fn enclosing(points: &[(i32, i32)]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let min_x = points.iter().map(|p| p.0).min().unwrap_or(0);
        let max_x = points.iter().map(|p| p.0).max().unwrap_or(0);
        let min_y = points.iter().map(|p| p.1).min().unwrap_or(0);
        let max_y = points.iter().map(|p| p.1).max().unwrap_or(0);
        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        }
    }
}

/// One symbol returned by a [`crate::SymbolDecoder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSymbol {
    pub data: String,
    pub symbology: String,
    pub region: RegionRect,
}

/// A decoded symbol annotated with how the pipeline got to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarcodePayload {
    pub data: String,
    #[serde(rename = "type")]
    pub symbology: String,
    pub region: RegionRect,
    pub rotation_angle: i32,
    pub decode_method: String,
}

/// Outcome of running the escalation stages on one detection box.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub payloads: Vec<BarcodePayload>,
    pub bbox: DetectionBox,
    pub confidence: f32,
    pub stage: Stage,
    /// Angle the winning raster was rotated by; 0 for direct and exhausted results.
    pub rotation_angle: i32,
    /// Angle the rotation estimator produced, whether or not it was applied.
    pub estimated_angle: Option<i32>,
    pub decode_method: String,
    pub decode_scale: Option<f32>,
    /// Raster the final decode attempt ran on, kept for diagnostics.
    #[serde(skip)]
    pub raster: GrayImage,
}

/// One entry of a [`FrameReport`]: a payload together with its detection.
#[derive(Debug, Clone, Serialize)]
pub struct BarcodeReport {
    pub data: String,
    #[serde(rename = "type")]
    pub symbology: String,
    pub rotation_angle: i32,
    pub decode_method: String,
    pub confidence: f32,
    pub bbox: DetectionBox,
}

/// Everything found in one frame, shaped for JSON clients.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub success: bool,
    pub detections: Vec<DetectionBox>,
    pub barcodes: Vec<BarcodeReport>,
    pub rotation_angle: i32,
    pub decode_method: String,
    pub confidence: f32,
}

impl FrameReport {
    pub fn from_results(results: &[PipelineResult]) -> Self {
        let detections = results.iter().map(|r| r.bbox).collect();
        let barcodes: Vec<BarcodeReport> = results
            .iter()
            .flat_map(|result| {
                result.payloads.iter().map(move |payload| BarcodeReport {
                    data: payload.data.clone(),
                    symbology: payload.symbology.clone(),
                    rotation_angle: payload.rotation_angle,
                    decode_method: payload.decode_method.clone(),
                    confidence: result.confidence,
                    bbox: result.bbox,
                })
            })
            .collect();

        let (rotation_angle, decode_method, confidence) = match barcodes.first() {
            Some(first) => (
                first.rotation_angle,
                first.decode_method.clone(),
                first.confidence,
            ),
            None => (0, String::new(), 0.0),
        };

        Self {
            success: true,
            detections,
            barcodes,
            rotation_angle,
            decode_method,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_angle_ignores_direction() {
        let forward = LineSegment::new(0.0, 0.0, 10.0, 10.0);
        let backward = LineSegment::new(10.0, 10.0, 0.0, 0.0);
        assert!((forward.angle() - 45.0).abs() < 1e-4);
        assert!((backward.angle() - 45.0).abs() < 1e-4);
        assert!((forward.length() - 200f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn polar_segment_round_trips_angle_and_length() {
        let seg = LineSegment::from_polar(5.0, 5.0, 130.0, 12.0);
        assert!((seg.angle() - 130.0).abs() < 1e-3);
        assert!((seg.length() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn clamp_to_frame_can_empty_a_box() {
        let inside = DetectionBox::new(10, 10, 500, 40).clamp_to(100, 50);
        assert_eq!((inside.xmax, inside.ymax), (100, 40));
        assert!(!inside.is_empty());

        let outside = DetectionBox::new(120, 10, 140, 40).clamp_to(100, 50);
        assert!(outside.is_empty());
    }

    #[test]
    fn region_rect_encloses_corners() {
        let rect = RegionRect::enclosing(&[(4, 9), (20, 3), (18, 30), (2, 25)]);
        assert_eq!(
            rect,
            RegionRect {
                x: 2,
                y: 3,
                width: 18,
                height: 27
            }
        );
    }
}
