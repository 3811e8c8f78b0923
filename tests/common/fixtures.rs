use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use barscan::{
    DecodedSymbol, LineSegment, LsdDetector, RegionRect, SegmentDetector, SymbolDecoder,
};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

pub const DARK: u8 = 20;
pub const LIGHT: u8 = 255;

/// Stripe widths in units, alternating dark and light, starting dark.
const BANDS: [u32; 8] = [2, 1, 1, 3, 2, 1, 3, 1];
const BAND_UNIT: f32 = 6.0;

fn is_dark_band(v: f32) -> bool {
    let total: u32 = BANDS.iter().sum();
    let mut pos = v.rem_euclid(total as f32 * BAND_UNIT);
    for (i, width) in BANDS.iter().enumerate() {
        let width = *width as f32 * BAND_UNIT;
        if pos < width {
            return i % 2 == 0;
        }
        pos -= width;
    }
    false
}

/// A frame filled with barcode-like bars whose edges run at `angle` degrees
/// (clockwise on screen, y pointing down). Edges are anti-aliased with 4x4
/// supersampling.
pub fn barcode_frame(width: u32, height: u32, angle: f32) -> DynamicImage {
    let (sin, cos) = angle.to_radians().sin_cos();
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let img = RgbImage::from_fn(width, height, |x, y| {
        let mut dark = 0u32;
        for sy in 0..4 {
            for sx in 0..4 {
                let px = x as f32 + (sx as f32 + 0.5) / 4.0 - cx;
                let py = y as f32 + (sy as f32 + 0.5) / 4.0 - cy;
                if is_dark_band(-px * sin + py * cos) {
                    dark += 1;
                }
            }
        }
        let value = LIGHT as u32 - dark * (LIGHT - DARK) as u32 / 16;
        Rgb([value as u8; 3])
    });
    DynamicImage::ImageRgb8(img)
}

/// 120x60 white frame with a block of 5px horizontal stripes in the middle
/// (x 30..90, y 15..45), the top stripe dark.
pub fn stripe_block_frame() -> DynamicImage {
    let img = GrayImage::from_fn(120, 60, |x, y| {
        let inside = (30..90).contains(&x) && (15..45).contains(&y);
        if inside && ((y - 15) / 5) % 2 == 0 {
            Luma([DARK])
        } else {
            Luma([LIGHT])
        }
    });
    DynamicImage::ImageLuma8(img)
}

fn symbol(data: &str) -> DecodedSymbol {
    DecodedSymbol {
        data: data.to_string(),
        symbology: "TEST".to_string(),
        region: RegionRect::default(),
    }
}

/// Reads "STRIPES" when the central window consists of uniform horizontal rows
/// that switch between dark and light at least twice.
pub struct StripeDecoder;

impl SymbolDecoder for StripeDecoder {
    fn decode(&self, raster: &GrayImage) -> barscan::Result<Vec<DecodedSymbol>> {
        let (width, height) = raster.dimensions();
        let (x0, x1) = (width / 4, 3 * width / 4);
        let (y0, y1) = (height / 6, 5 * height / 6);
        if x1 <= x0 || y1 <= y0 {
            return Ok(Vec::new());
        }

        let mut uniformity = 0.0;
        let mut transitions = 0;
        let mut previous: Option<bool> = None;
        for y in y0..y1 {
            let dark = (x0..x1)
                .filter(|&x| raster.get_pixel(x, y)[0] < 128)
                .count() as f32
                / (x1 - x0) as f32;
            uniformity += dark.max(1.0 - dark);
            let majority = dark >= 0.5;
            if previous.is_some_and(|p| p != majority) {
                transitions += 1;
            }
            previous = Some(majority);
        }
        uniformity /= (y1 - y0) as f32;

        if uniformity >= 0.85 && transitions >= 2 {
            Ok(vec![symbol("STRIPES")])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Reads "MASKED" only from rasters whose outer 3px frame is black and that
/// still have bright content.
pub struct BorderBlackDecoder;

impl SymbolDecoder for BorderBlackDecoder {
    fn decode(&self, raster: &GrayImage) -> barscan::Result<Vec<DecodedSymbol>> {
        let (width, height) = raster.dimensions();
        let on_border = |x: u32, y: u32| x < 3 || y < 3 || x + 3 >= width || y + 3 >= height;
        let border_black = raster
            .enumerate_pixels()
            .filter(|(x, y, _)| on_border(*x, *y))
            .all(|(_, _, p)| p[0] <= 10);
        let has_content = raster.pixels().any(|p| p[0] > 128);
        if border_black && has_content {
            Ok(vec![symbol("MASKED")])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Counts calls and always (or never) reports a symbol.
pub struct CountingDecoder {
    calls: AtomicUsize,
    succeed: bool,
}

impl CountingDecoder {
    pub fn always() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            succeed: true,
        }
    }

    pub fn never() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            succeed: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolDecoder for CountingDecoder {
    fn decode(&self, _raster: &GrayImage) -> barscan::Result<Vec<DecodedSymbol>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(vec![symbol("COUNTED")])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Records the dimensions of every raster it is given; never decodes.
#[derive(Default)]
pub struct RecordingDecoder {
    seen: Mutex<Vec<(u32, u32)>>,
}

impl RecordingDecoder {
    pub fn seen(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl SymbolDecoder for RecordingDecoder {
    fn decode(&self, raster: &GrayImage) -> barscan::Result<Vec<DecodedSymbol>> {
        self.seen.lock().unwrap().push(raster.dimensions());
        Ok(Vec::new())
    }
}

/// The built-in segment detector with a call counter.
#[derive(Default)]
pub struct CountingDetector {
    inner: LsdDetector,
    calls: AtomicUsize,
}

impl CountingDetector {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentDetector for CountingDetector {
    fn detect(&self, raster: &DynamicImage) -> Vec<LineSegment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.detect(raster)
    }
}
