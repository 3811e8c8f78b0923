use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::detection::search::SCALES;
use crate::error::{BarcodeError, Result};

/// Tunables of the escalation pipeline.
///
/// Every field has a default, so a JSON file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Regions narrower than this are upscaled before any decoding.
    pub min_region_width: u32,
    /// Scale factors for the decode search, tried in order.
    pub scales: Vec<f32>,
    /// Degrees a segment may deviate from the target orientation in the masked stage.
    pub filter_angle_tolerance: f32,
    /// Segments shorter than this (pixels) are ignored in the masked stage.
    pub filter_min_length: f32,
    /// Below this many near-horizontal segments the masked stage looks for vertical ones.
    pub min_filtered_segments: usize,
    /// Skip the rotated stage when the estimate is 0 degrees.
    pub skip_zero_rotation: bool,
    /// Wall-clock budget per detection box, checked between stages.
    pub time_budget_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_region_width: 100,
            scales: SCALES.to_vec(),
            filter_angle_tolerance: 15.0,
            filter_min_length: 10.0,
            min_filtered_segments: 3,
            skip_zero_rotation: true,
            time_budget_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_region_width(mut self, width: u32) -> Self {
        self.min_region_width = width;
        self
    }

    pub fn with_scales(mut self, scales: impl Into<Vec<f32>>) -> Self {
        self.scales = scales.into();
        self
    }

    pub fn with_filter(mut self, angle_tolerance: f32, min_length: f32) -> Self {
        self.filter_angle_tolerance = angle_tolerance;
        self.filter_min_length = min_length;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget_ms = budget.map(|b| b.as_millis() as u64);
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scales.is_empty() {
            return Err(BarcodeError::InvalidConfig("scales must not be empty".into()));
        }
        if let Some(bad) = self.scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(BarcodeError::InvalidConfig(format!(
                "scale factors must be positive, got {bad}"
            )));
        }
        if !(0.0..=90.0).contains(&self.filter_angle_tolerance) {
            return Err(BarcodeError::InvalidConfig(format!(
                "filter_angle_tolerance must be within 0..=90, got {}",
                self.filter_angle_tolerance
            )));
        }
        if !self.filter_min_length.is_finite() || self.filter_min_length < 0.0 {
            return Err(BarcodeError::InvalidConfig(format!(
                "filter_min_length must be non-negative, got {}",
                self.filter_min_length
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
