//! Error type shared by the decode pipeline.
//!
//! Most of the pipeline degrades to "no result" instead of failing. The
//! variants here cover the few conditions a caller has to see: an invalid
//! detection box, a broken decoder, and problems with configuration or debug
//! output.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DetectionBox;

#[derive(Error, Debug)]
pub enum BarcodeError {
    /// The detection box does not overlap the frame, or has zero area.
    #[error("detection box {bbox} yields an empty crop of a {frame_width}x{frame_height} frame")]
    EmptyRegion {
        bbox: DetectionBox,
        frame_width: u32,
        frame_height: u32,
    },

    /// The symbol decoder itself failed (not "found nothing").
    #[error("symbol decoder failed")]
    Decoder(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),

    #[error("debug directory is not empty: {0:?}")]
    DebugDirNotEmpty(PathBuf),

    #[error("failed to write debug image {path:?}")]
    DebugImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("io")]
    Io(#[from] std::io::Error),
}

impl BarcodeError {
    /// Wraps an arbitrary decoder failure.
    pub fn decoder<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BarcodeError::Decoder(error.into())
    }
}

pub type Result<T> = std::result::Result<T, BarcodeError>;
