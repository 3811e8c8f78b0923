//! The escalation pipeline for one detection box.
//!
//! A region is tried as-is first. If nothing decodes, its dominant edge
//! orientation is estimated and the region is rotated upright. If that fails
//! too, the region is masked down to the convex hull of its aligned edges.
//! Each stage runs the full decode search and the first hit ends the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::decoder::SymbolDecoder;
use crate::detection::geometry::{LsdDetector, SegmentDetector};
use crate::detection::preprocessing::to_grayscale;
use crate::detection::region::{apply_mask, convex_hull_mask, filter_by_angle};
use crate::detection::rotation::estimate_rotation;
use crate::detection::search::{SearchHit, search};
use crate::detection::transform::{crop, ensure_min_width, rotate};
use crate::error::{BarcodeError, Result};
use crate::models::{BarcodePayload, DetectionBox, PipelineResult};

/// Escalation stages, in the only order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Direct,
    Rotated,
    Masked,
    Exhausted,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Direct => "direct",
            Stage::Rotated => "rotated",
            Stage::Masked => "masked",
            Stage::Exhausted => "exhausted",
        }
    }

    /// Stage entered when this one finds nothing.
    pub fn next(&self) -> Stage {
        match self {
            Stage::Direct => Stage::Rotated,
            Stage::Rotated => Stage::Masked,
            Stage::Masked | Stage::Exhausted => Stage::Exhausted,
        }
    }

    /// Decode-method label for a hit with `variant_label` in this stage.
    fn label(&self, variant_label: &str) -> String {
        match self {
            Stage::Direct => variant_label.to_string(),
            Stage::Rotated | Stage::Masked => format!("{}_{}", self.name(), variant_label),
            Stage::Exhausted => NO_DECODE.to_string(),
        }
    }
}

pub const NO_DECODE: &str = "no_decode";

/// Debug configuration for pipeline execution
#[derive(Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    regions: AtomicUsize,
}

impl DebugConfig {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir)?;
            if entries.next().is_some() {
                return Err(BarcodeError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        Ok(Self {
            output_dir,
            regions: AtomicUsize::new(0),
        })
    }

    /// Claim `count` consecutive region numbers and return the first.
    fn reserve(&self, count: usize) -> usize {
        self.regions.fetch_add(count, Ordering::Relaxed) + 1
    }

    /// Create the `region_NNN` directory for a reserved number.
    fn region_dir(&self, number: usize) -> Result<PathBuf> {
        let dir = self.output_dir.join(format!("region_{number:03}"));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn save_debug_image(dir: &Path, name: &str, image: &DynamicImage) -> Result<()> {
    let path = dir.join(format!("{name}.png"));
    image
        .save(&path)
        .map_err(|source| BarcodeError::DebugImage {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), "saved debug image");
    Ok(())
}

/// Everything one run carries between stages.
struct RegionRun {
    bbox: DetectionBox,
    started: Instant,
    /// Cropped region after the minimum-width rule.
    region: DynamicImage,
    /// Set by the rotated stage when a non-zero correction was applied.
    rotated: Option<DynamicImage>,
    estimated_angle: Option<i32>,
    debug_dir: Option<PathBuf>,
}

impl RegionRun {
    /// Raster later stages build on: the rotated region if there is one.
    fn working(&self) -> &DynamicImage {
        self.rotated.as_ref().unwrap_or(&self.region)
    }

    fn applied_angle(&self) -> i32 {
        if self.rotated.is_some() {
            self.estimated_angle.unwrap_or(0)
        } else {
            0
        }
    }

    fn dump(&self, name: &str, image: &DynamicImage) -> Result<()> {
        match &self.debug_dir {
            Some(dir) => save_debug_image(dir, name, image),
            None => Ok(()),
        }
    }
}

enum Transition {
    Decoded(PipelineResult),
    Advance(Stage),
}

/// Rotation-robust decode pipeline.
pub struct Pipeline {
    decoder: Box<dyn SymbolDecoder>,
    segment_detector: Box<dyn SegmentDetector>,
    config: PipelineConfig,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Pipeline with default settings and the built-in segment detector.
    pub fn new(decoder: impl SymbolDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            segment_detector: Box::new(LsdDetector::default()),
            config: PipelineConfig::default(),
            debug: None,
        }
    }

    pub fn with_segment_detector(mut self, detector: impl SegmentDetector + 'static) -> Self {
        self.segment_detector = Box::new(detector);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: impl Into<PathBuf>) -> Result<Self> {
        self.debug = Some(DebugConfig::new(output_dir)?);
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage needed to decode the region of `frame` under `bbox`.
    ///
    /// In debug mode each call takes the next `region_NNN` number.
    pub fn process(&self, frame: &DynamicImage, bbox: &DetectionBox) -> Result<PipelineResult> {
        let slot = self.debug.as_ref().map(|debug| debug.reserve(1));
        self.process_in_slot(frame, bbox, slot)
    }

    /// Run [`Pipeline::process`] for every box, in parallel.
    ///
    /// Boxes that do not overlap the frame are skipped with a warning; any
    /// other error aborts the frame. Results keep the order of `boxes`. In
    /// debug mode box `i` writes to the `i`-th directory of a block reserved
    /// for the frame, so numbering follows box order; a skipped box leaves a gap.
    pub fn process_frame(
        &self,
        frame: &DynamicImage,
        boxes: &[DetectionBox],
    ) -> Result<Vec<PipelineResult>> {
        let first = self.debug.as_ref().map(|debug| debug.reserve(boxes.len()));
        let outcomes: Vec<Result<PipelineResult>> = boxes
            .par_iter()
            .enumerate()
            .map(|(i, bbox)| self.process_in_slot(frame, bbox, first.map(|n| n + i)))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(BarcodeError::EmptyRegion { bbox, .. }) => {
                    tracing::warn!(%bbox, "skipping detection outside the frame");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    fn process_in_slot(
        &self,
        frame: &DynamicImage,
        bbox: &DetectionBox,
        slot: Option<usize>,
    ) -> Result<PipelineResult> {
        let started = Instant::now();
        let region = ensure_min_width(crop(frame, bbox)?, self.config.min_region_width);
        let debug_dir = match (&self.debug, slot) {
            (Some(debug), Some(number)) => Some(debug.region_dir(number)?),
            _ => None,
        };

        let mut run = RegionRun {
            bbox: *bbox,
            started,
            region,
            rotated: None,
            estimated_angle: None,
            debug_dir,
        };
        run.dump("00_region", &run.region)?;

        let mut stage = Stage::Direct;
        loop {
            if matches!(stage, Stage::Rotated | Stage::Masked) && self.over_budget(&run) {
                tracing::warn!(
                    bbox = %run.bbox,
                    skipped = stage.name(),
                    "time budget exhausted"
                );
                stage = Stage::Exhausted;
            }
            tracing::debug!(bbox = %run.bbox, stage = stage.name(), "entering stage");

            let transition = match stage {
                Stage::Direct => self.direct(&run)?,
                Stage::Rotated => self.rotated(&mut run)?,
                Stage::Masked => self.masked(&run)?,
                Stage::Exhausted => return self.exhausted(&run),
            };
            match transition {
                Transition::Decoded(result) => {
                    tracing::info!(
                        bbox = %run.bbox,
                        stage = stage.name(),
                        method = %result.decode_method,
                        angle = result.rotation_angle,
                        "decoded"
                    );
                    return Ok(result);
                }
                Transition::Advance(next) => stage = next,
            }
        }
    }

    fn over_budget(&self, run: &RegionRun) -> bool {
        self.config
            .time_budget()
            .is_some_and(|budget| run.started.elapsed() >= budget)
    }

    fn search(&self, raster: &DynamicImage) -> Result<Option<SearchHit>> {
        search(raster, self.decoder.as_ref(), &self.config.scales)
    }

    fn direct(&self, run: &RegionRun) -> Result<Transition> {
        Ok(match self.search(&run.region)? {
            Some(hit) => Transition::Decoded(self.decoded(run, Stage::Direct, hit)?),
            None => Transition::Advance(Stage::Direct.next()),
        })
    }

    fn rotated(&self, run: &mut RegionRun) -> Result<Transition> {
        let segments = self.segment_detector.detect(&run.region);
        let angle = estimate_rotation(&segments);
        run.estimated_angle = Some(angle);
        tracing::debug!(segments = segments.len(), angle, "rotation estimated");

        if angle == 0 && self.config.skip_zero_rotation {
            return Ok(Transition::Advance(Stage::Rotated.next()));
        }

        let rotated = rotate(&run.region, angle as f32).into_owned();
        run.dump("01_rotated", &rotated)?;
        let hit = self.search(&rotated)?;
        run.rotated = Some(rotated);

        Ok(match hit {
            Some(hit) => Transition::Decoded(self.decoded(run, Stage::Rotated, hit)?),
            None => Transition::Advance(Stage::Rotated.next()),
        })
    }

    fn masked(&self, run: &RegionRun) -> Result<Transition> {
        let working = run.working();
        let segments = self.segment_detector.detect(working);
        let tolerance = self.config.filter_angle_tolerance;
        let min_length = self.config.filter_min_length;

        let mut aligned = filter_by_angle(&segments, 0.0, tolerance, min_length);
        if aligned.len() < self.config.min_filtered_segments {
            aligned = filter_by_angle(&segments, 90.0, tolerance, min_length);
        }
        tracing::debug!(
            segments = segments.len(),
            aligned = aligned.len(),
            "segments filtered for masking"
        );
        if aligned.is_empty() {
            return Ok(Transition::Advance(Stage::Masked.next()));
        }

        let mask = convex_hull_mask(working.width(), working.height(), &aligned);
        let masked = apply_mask(working, &mask);
        run.dump("02_mask", &DynamicImage::ImageLuma8(mask))?;
        run.dump("03_masked", &masked)?;

        Ok(match self.search(&masked)? {
            Some(hit) => Transition::Decoded(self.decoded(run, Stage::Masked, hit)?),
            None => Transition::Advance(Stage::Masked.next()),
        })
    }

    fn exhausted(&self, run: &RegionRun) -> Result<PipelineResult> {
        let raster = to_grayscale(run.working());
        tracing::info!(
            bbox = %run.bbox,
            estimated_angle = ?run.estimated_angle,
            "no symbol decoded"
        );
        self.finish(
            run,
            PipelineResult {
                success: false,
                payloads: Vec::new(),
                bbox: run.bbox,
                confidence: run.bbox.confidence,
                stage: Stage::Exhausted,
                rotation_angle: 0,
                estimated_angle: run.estimated_angle,
                decode_method: NO_DECODE.to_string(),
                decode_scale: None,
                raster,
            },
        )
    }

    fn decoded(&self, run: &RegionRun, stage: Stage, hit: SearchHit) -> Result<PipelineResult> {
        let rotation_angle = match stage {
            Stage::Direct => 0,
            _ => run.applied_angle(),
        };
        let decode_method = stage.label(hit.variant.label());
        let payloads = hit
            .symbols
            .into_iter()
            .map(|symbol| BarcodePayload {
                data: symbol.data,
                symbology: symbol.symbology,
                region: symbol.region,
                rotation_angle,
                decode_method: decode_method.clone(),
            })
            .collect();

        self.finish(
            run,
            PipelineResult {
                success: true,
                payloads,
                bbox: run.bbox,
                confidence: run.bbox.confidence,
                stage,
                rotation_angle,
                estimated_angle: run.estimated_angle,
                decode_method,
                decode_scale: Some(hit.scale),
                raster: hit.raster,
            },
        )
    }

    /// Save the retained raster, if debugging, and hand the result back.
    fn finish(&self, run: &RegionRun, result: PipelineResult) -> Result<PipelineResult> {
        if run.debug_dir.is_some() {
            run.dump("04_final", &DynamicImage::ImageLuma8(result.raster.clone()))?;
        }
        Ok(result)
    }
}
