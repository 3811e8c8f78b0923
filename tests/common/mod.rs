mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from barscan for tests
pub use barscan::{
    BarcodeError, DetectionBox, FrameReport, Pipeline, PipelineConfig, PipelineResult, Stage,
};
