//! Where detection boxes come from.

use image::DynamicImage;

use crate::models::DetectionBox;

/// Proposes barcode regions in a frame.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, frame: &DynamicImage) -> Vec<DetectionBox>;
}

/// Treats the whole frame as a single region.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrame;

impl RegionDetector for FullFrame {
    fn detect(&self, frame: &DynamicImage) -> Vec<DetectionBox> {
        vec![DetectionBox::full_frame(frame.width(), frame.height())]
    }
}

/// Fixed boxes, e.g. from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticBoxes(pub Vec<DetectionBox>);

impl RegionDetector for StaticBoxes {
    fn detect(&self, _frame: &DynamicImage) -> Vec<DetectionBox> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn full_frame_covers_everything() {
        let frame = DynamicImage::ImageLuma8(GrayImage::new(64, 48));
        let boxes = FullFrame.detect(&frame);
        assert_eq!(boxes, vec![DetectionBox::new(0, 0, 64, 48)]);
        assert_eq!(boxes[0].confidence, 1.0);
    }
}
