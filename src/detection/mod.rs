//! Image analysis stages the pipeline is built from.

pub mod geometry;
pub mod preprocessing;
pub mod region;
pub mod rotation;
pub mod search;
pub mod transform;

pub use geometry::{LsdDetector, SegmentDetector, extract_line_segments};
pub use preprocessing::{VARIANTS, Variant, preprocess_variants};
pub use region::{apply_mask, convex_hull_mask, filter_by_angle};
pub use rotation::{AngleHistogram, estimate_rotation, normalize_angle};
pub use search::{SCALES, SearchHit, search};
pub use transform::{crop, ensure_min_width, rotate, scale_gray, upscale};
