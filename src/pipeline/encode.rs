//! Figure encoding: `DynamicImage` → PNG bytes → `data:` URI.
//!
//! Figures are normalised to PNG at extraction time whatever their source
//! encoding in the PDF (DCT, Flate, JBIG2…), so every later stage and every
//! client sees a single lossless format.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} figure → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap PNG bytes as a `data:image/png;base64,…` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Luma spread (max − min) over every pixel, 0 for a uniform image.
pub fn tonal_range(img: &DynamicImage) -> u8 {
    let luma = img.to_luma8();
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for p in luma.pixels() {
        let v = p.0[0];
        lo = lo.min(v);
        hi = hi.max(v);
        if hi - lo == u8::MAX {
            break;
        }
    }
    hi.saturating_sub(lo)
}
