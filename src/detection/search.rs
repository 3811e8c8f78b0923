//! Decode search: every preprocessing variant at every scale, stopping at the
//! first attempt the decoder reads anything from.

use image::{DynamicImage, GrayImage};

use crate::decoder::SymbolDecoder;
use crate::detection::preprocessing::{VARIANTS, Variant, to_grayscale};
use crate::detection::transform::scale_gray;
use crate::error::Result;
use crate::models::DecodedSymbol;

/// Scale factors tried for each variant, in order.
pub const SCALES: [f32; 4] = [1.0, 1.5, 2.0, 0.8];

/// The winning attempt of a search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub symbols: Vec<DecodedSymbol>,
    pub variant: Variant,
    pub scale: f32,
    /// Raster exactly as the decoder saw it.
    pub raster: GrayImage,
    /// Decoder calls made, including the successful one.
    pub attempts: usize,
}

/// Try `raster` against `decoder`, variant outer and scale inner.
///
/// Returns `Ok(None)` when every combination came back empty. A decoder error
/// ends the search immediately.
pub fn search(
    raster: &DynamicImage,
    decoder: &dyn SymbolDecoder,
    scales: &[f32],
) -> Result<Option<SearchHit>> {
    let gray = to_grayscale(raster);
    let mut attempts = 0;

    for variant in VARIANTS {
        let prepared = variant.apply(&gray);
        for &scale in scales {
            let candidate = scale_gray(&prepared, scale);
            attempts += 1;
            let symbols = decoder.decode(&candidate)?;
            tracing::debug!(
                variant = variant.label(),
                scale,
                width = candidate.width(),
                height = candidate.height(),
                found = symbols.len(),
                "decode attempt"
            );
            if !symbols.is_empty() {
                return Ok(Some(SearchHit {
                    symbols,
                    variant,
                    scale,
                    raster: candidate,
                    attempts,
                }));
            }
        }
    }
    Ok(None)
}
