pub mod config;
pub mod decoder;
pub mod detection;
pub mod detector;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod session;

pub use config::PipelineConfig;
pub use decoder::{MultiFormatDecoder, QrDecoder, SymbolDecoder};
pub use detection::{LsdDetector, SegmentDetector, Variant};
pub use detector::{FullFrame, RegionDetector, StaticBoxes};
pub use error::{BarcodeError, Result};
pub use models::{
    BarcodePayload, BarcodeReport, DecodedSymbol, DetectionBox, FrameReport, LineSegment,
    PipelineResult, RegionRect,
};
pub use pipeline::{DebugConfig, NO_DECODE, Pipeline, Stage};
pub use session::ScanSession;
