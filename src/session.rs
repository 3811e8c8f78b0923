//! Start/stop handle for continuous scanning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use image::DynamicImage;

use crate::detector::RegionDetector;
use crate::error::Result;
use crate::models::FrameReport;
use crate::pipeline::Pipeline;

/// Shared on/off switch for a scanning loop.
///
/// Clones share the same state, so one clone can drive [`ScanSession::run`]
/// while another stops it from a different thread.
#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    active: Arc<AtomicBool>,
    frames: Arc<AtomicUsize>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the session was already running.
    pub fn start(&self) -> bool {
        let started = !self.active.swap(true, Ordering::SeqCst);
        if started {
            tracing::info!("scan session started");
        }
        started
    }

    /// Returns `false` if the session was not running.
    pub fn stop(&self) -> bool {
        let stopped = self.active.swap(false, Ordering::SeqCst);
        if stopped {
            tracing::info!(frames = self.frames_processed(), "scan session stopped");
        }
        stopped
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Frames processed across every `run` of this session.
    pub fn frames_processed(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Feed frames through detector and pipeline until the source runs dry or
    /// the session is stopped.
    ///
    /// The flag is checked before each frame; a frame already in progress is
    /// finished. `on_report` sees one report per processed frame. Returns the
    /// number of frames processed by this call.
    pub fn run<I, F>(
        &self,
        pipeline: &Pipeline,
        detector: &dyn RegionDetector,
        frames: I,
        mut on_report: F,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = DynamicImage>,
        F: FnMut(FrameReport),
    {
        let mut processed = 0;
        for frame in frames {
            if !self.is_active() {
                break;
            }
            let boxes = detector.detect(&frame);
            let results = pipeline.process_frame(&frame, &boxes)?;
            processed += 1;
            self.frames.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                frame = self.frames_processed(),
                detections = boxes.len(),
                decoded = results.iter().filter(|r| r.success).count(),
                "frame processed"
            );
            on_report(FrameReport::from_results(&results));
        }
        Ok(processed)
    }
}
