//! Symbol decoders the search driver can hand rasters to.

use std::sync::Arc;

use image::GrayImage;
use image::imageops::rotate90;
use rqrr::PreparedImage;
use rxing::RXingResult;

use crate::error::Result;
use crate::models::{DecodedSymbol, RegionRect};

/// Reads symbols out of a grayscale raster.
///
/// An empty vector means nothing was found; errors are reserved for the decoder
/// itself failing and abort the whole pipeline run.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, raster: &GrayImage) -> Result<Vec<DecodedSymbol>>;
}

impl<D: SymbolDecoder + ?Sized> SymbolDecoder for Arc<D> {
    fn decode(&self, raster: &GrayImage) -> Result<Vec<DecodedSymbol>> {
        (**self).decode(raster)
    }
}

/// QR code decoder built on `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub const SYMBOLOGY: &'static str = "QR-Code";

    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for QrDecoder {
    fn decode(&self, raster: &GrayImage) -> Result<Vec<DecodedSymbol>> {
        let (width, height) = raster.dimensions();
        let mut prepared = PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| raster.get_pixel(x as u32, y as u32)[0],
        );

        let mut symbols = Vec::new();
        for grid in prepared.detect_grids() {
            // a grid that fails to decode is a false finder match, not a decoder fault
            match grid.decode() {
                Ok((_, content)) => {
                    let corners: Vec<(i32, i32)> =
                        grid.bounds.iter().map(|p| (p.x, p.y)).collect();
                    symbols.push(DecodedSymbol {
                        data: content,
                        symbology: Self::SYMBOLOGY.to_string(),
                        region: RegionRect::enclosing(&corners),
                    });
                }
                Err(err) => tracing::trace!(%err, "discarding undecodable grid"),
            }
        }
        Ok(symbols)
    }
}

/// Linear and matrix symbologies (EAN/UPC, Code 128, Code 39, ITF, Codabar,
/// QR, Data Matrix, Aztec, PDF417) through `rxing`.
///
/// A raster that reads nothing upright is tried once more turned a quarter
/// turn, so bars that run horizontally are still crossed by the scan lines.
/// Symbol corners are reported in the coordinates of the raster passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiFormatDecoder;

impl MultiFormatDecoder {
    pub fn new() -> Self {
        Self
    }

    fn read(raster: &GrayImage) -> Vec<RXingResult> {
        let (width, height) = raster.dimensions();
        // rxing reports "nothing here" as an error too
        match rxing::helpers::detect_multiple_in_luma(raster.as_raw().clone(), width, height) {
            Ok(results) => results,
            Err(err) => {
                tracing::trace!(?err, width, height, "no symbol read");
                Vec::new()
            }
        }
    }
}

fn to_symbol(result: &RXingResult, to_raster: impl Fn(f32, f32) -> (i32, i32)) -> DecodedSymbol {
    let corners: Vec<(i32, i32)> = result
        .getPoints()
        .iter()
        .map(|point| to_raster(point.x, point.y))
        .collect();
    DecodedSymbol {
        data: result.getText().to_string(),
        symbology: format!("{:?}", result.getBarcodeFormat()),
        region: RegionRect::enclosing(&corners),
    }
}

impl SymbolDecoder for MultiFormatDecoder {
    fn decode(&self, raster: &GrayImage) -> Result<Vec<DecodedSymbol>> {
        let upright = Self::read(raster);
        if !upright.is_empty() {
            return Ok(upright
                .iter()
                .map(|result| to_symbol(result, |x, y| (x.round() as i32, y.round() as i32)))
                .collect());
        }

        // rotate90 is clockwise: (x, y) lands on (height - 1 - y, x)
        let last_row = raster.height() as f32 - 1.0;
        let turned = Self::read(&rotate90(raster));
        Ok(turned
            .iter()
            .map(|result| {
                to_symbol(result, |x, y| (y.round() as i32, (last_row - x).round() as i32))
            })
            .collect())
    }
}
