//! Dominant-orientation estimate from line segments.
//!
//! Every segment votes for its integer-rounded orientation with its length, so
//! long structural edges (bars, object outlines) outweigh short noisy ones.

use crate::models::LineSegment;

const BUCKETS: usize = 180;

/// Folds an angle in degrees into [0, 180).
pub fn normalize_angle(degrees: f32) -> f32 {
    let folded = degrees.rem_euclid(180.0);
    // rem_euclid can round up to exactly 180.0 for tiny negative inputs
    if folded >= 180.0 { 0.0 } else { folded }
}

/// Length accumulated per whole-degree orientation.
///
/// Buckets remember the order in which they were first touched; that order
/// decides ties in [`AngleHistogram::dominant`].
#[derive(Debug, Clone)]
pub struct AngleHistogram {
    weights: [f32; BUCKETS],
    first_seen: Vec<usize>,
}

impl AngleHistogram {
    pub fn new() -> Self {
        Self {
            weights: [0.0; BUCKETS],
            first_seen: Vec::new(),
        }
    }

    pub fn from_segments(segments: &[LineSegment]) -> Self {
        let mut histogram = Self::new();
        for segment in segments {
            histogram.add(segment.angle(), segment.length());
        }
        histogram
    }

    /// Adds `weight` to the bucket of `angle` (degrees, any range).
    pub fn add(&mut self, angle: f32, weight: f32) {
        let bucket = Self::bucket(angle);
        if !self.first_seen.contains(&bucket) {
            self.first_seen.push(bucket);
        }
        self.weights[bucket] += weight;
    }

    pub fn weight(&self, angle: f32) -> f32 {
        self.weights[Self::bucket(angle)]
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    /// Bucket with the most accumulated length; the earliest bucket wins a tie.
    pub fn dominant(&self) -> Option<i32> {
        let mut best: Option<(usize, f32)> = None;
        for &bucket in &self.first_seen {
            let weight = self.weights[bucket];
            match best {
                Some((_, best_weight)) if weight <= best_weight => {}
                _ => best = Some((bucket, weight)),
            }
        }
        best.map(|(bucket, _)| bucket as i32)
    }

    fn bucket(angle: f32) -> usize {
        // halves go to the even degree; 179.5 and above lands on 180, the same line as 0
        (normalize_angle(angle).round_ties_even() as usize) % BUCKETS
    }
}

impl Default for AngleHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Estimated rotation in whole degrees, 0 when there is nothing to go on.
pub fn estimate_rotation(segments: &[LineSegment]) -> i32 {
    AngleHistogram::from_segments(segments)
        .dominant()
        .unwrap_or(0)
}
