// Cover provisioning: load a carrier, synthesize pointillist noise, grow a canvas
// that is too small, and write the result as PNG.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::metadata::Orientation;
use image::{ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader};
use rand::Rng;

use crate::capacity::{min_dimensions_for, usable_bytes};
use crate::config::EncodingConfig;
use crate::error::{Result, StegoError};
use crate::pixels::PixelBuffer;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

/// One dot per this many pixels.
const DOT_DENSITY: u64 = 12;
const MAX_DOT_RADIUS: i64 = 4;

/// Decodes an image container into a pixel buffer, applying EXIF orientation so the
/// sample order matches what a viewer shows.
pub fn load(image_bytes: &[u8]) -> Result<PixelBuffer> {
    let reader = ImageReader::new(Cursor::new(image_bytes))
        .with_guessed_format()
        .map_err(|e| StegoError::ImageDecodeFailed(e.to_string()))?;
    if reader.format().is_none() {
        return Err(StegoError::UnsupportedImageFormat(
            "unrecognized image container".to_string(),
        ));
    }
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = image::DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(PixelBuffer::from_dynamic(img))
}

/// Random RGB cover from the thread RNG. Nothing about the payload reaches the generator.
pub fn synthesize(width: u32, height: u32) -> PixelBuffer {
    synthesize_with(width, height, &mut rand::thread_rng())
}

/// Pointillist noise: a jittered random background overlaid with random colored dots.
pub fn synthesize_with<R: Rng + ?Sized>(width: u32, height: u32, rng: &mut R) -> PixelBuffer {
    let mut buf = PixelBuffer::from_rgb(image::RgbImage::new(width, height));
    paint_noise(&mut buf, 0, 0, rng);
    buf
}

/// Fills every pixel at or beyond column `from_x` or row `from_y` with noise; alpha becomes opaque.
fn paint_noise<R: Rng + ?Sized>(buf: &mut PixelBuffer, from_x: u32, from_y: u32, rng: &mut R) {
    let (w, h) = buf.dimensions();
    let outside = |x: u32, y: u32| x >= from_x || y >= from_y;
    let base: [u8; 3] = rng.gen();
    for y in 0..h {
        for x in 0..w {
            if !outside(x, y) {
                continue;
            }
            let px = buf.pixel_mut(x, y);
            for (c, v) in px.iter_mut().take(3).enumerate() {
                *v = base[c] / 2 + rng.gen_range(0..128u8);
            }
            if let Some(alpha) = px.get_mut(3) {
                *alpha = u8::MAX;
            }
        }
    }

    let dots = (w as u64 * h as u64) / DOT_DENSITY;
    for _ in 0..dots {
        let cx = rng.gen_range(0..w) as i64;
        let cy = rng.gen_range(0..h) as i64;
        let r = rng.gen_range(1..=MAX_DOT_RADIUS);
        let color: [u8; 3] = rng.gen();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
                    continue;
                }
                let (x, y) = (x as u32, y as u32);
                if outside(x, y) {
                    buf.pixel_mut(x, y)[..3].copy_from_slice(&color);
                }
            }
        }
    }
}

/// Returns a buffer with at least `required_bytes` of capacity at the configured depth.
///
/// A cover that already fits is returned untouched. Otherwise, with `auto_expand`, the canvas
/// is grown to the smallest size the capacity model allows under the ceiling: a supplied cover
/// keeps its pixels at the top-left and the new area is filled with noise; a missing cover is
/// synthesized at the new size.
pub fn ensure_capacity(cover: Option<PixelBuffer>, required_bytes: u64, config: &EncodingConfig) -> Result<PixelBuffer> {
    ensure_capacity_with(cover, required_bytes, config, &mut rand::thread_rng())
}

pub fn ensure_capacity_with<R: Rng + ?Sized>(
    cover: Option<PixelBuffer>,
    required_bytes: u64,
    config: &EncodingConfig,
    rng: &mut R,
) -> Result<PixelBuffer> {
    config.validate()?;
    let bits = config.bits_per_channel;
    let max = config.max_canvas_dimension;

    let cover = match cover {
        Some(buf) => buf,
        None => {
            let side = crate::config::TILE.min(max);
            if usable_bytes(side, side, bits) >= required_bytes || !config.auto_expand {
                tracing::info!(width = side, height = side, "synthesizing default cover");
                synthesize_with(side, side, rng)
            } else {
                let (w, h) = grown_dimensions(None, required_bytes, config)?;
                tracing::info!(width = w, height = h, "synthesizing cover sized for payload");
                return Ok(synthesize_with(w, h, rng));
            }
        }
    };

    let (w, h) = cover.dimensions();
    check_ceiling(w, h, max)?;
    let available = usable_bytes(w, h, bits);
    if available >= required_bytes {
        return Ok(cover);
    }
    if !config.auto_expand {
        return Err(StegoError::CapacityExceeded {
            required: required_bytes,
            available,
        });
    }
    let (nw, nh) = grown_dimensions(Some((w, h)), required_bytes, config)?;
    tracing::info!(from_w = w, from_h = h, to_w = nw, to_h = nh, "expanding cover image");
    pad_with_noise(&cover, nw, nh, rng)
}

/// Refuses carriers wider or taller than `max_dimension`. Encode and decode share this rule.
pub fn check_ceiling(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width > max_dimension || height > max_dimension {
        return Err(StegoError::MaxCanvasExceeded {
            width,
            height,
            max_dimension,
        });
    }
    Ok(())
}

/// Minimal canvas for `required_bytes`, never smaller than `base` and never above the ceiling.
fn grown_dimensions(base: Option<(u32, u32)>, required_bytes: u64, config: &EncodingConfig) -> Result<(u32, u32)> {
    let max = config.max_canvas_dimension;
    let over_ceiling = |width: u32, height: u32| StegoError::MaxCanvasExceeded {
        width,
        height,
        max_dimension: max,
    };
    let (w, h) = match min_dimensions_for(required_bytes, config.bits_per_channel, base, max) {
        Ok(dims) => dims,
        Err(StegoError::CapacityUnattainable { .. }) => {
            let (w, h) = min_dimensions_for(required_bytes, config.bits_per_channel, base, u32::MAX)
                .unwrap_or((u32::MAX, u32::MAX));
            return Err(over_ceiling(w, h));
        }
        Err(e) => return Err(e),
    };
    let Some((bw, bh)) = base else {
        return Ok((w, h));
    };
    let (w, h) = (w.max(bw), h.max(bh));
    if w > max || h > max {
        return Err(over_ceiling(w, h));
    }
    Ok((w, h))
}

fn pad_with_noise<R: Rng + ?Sized>(cover: &PixelBuffer, width: u32, height: u32, rng: &mut R) -> Result<PixelBuffer> {
    let channels = cover.channels() as usize;
    let (cw, ch) = cover.dimensions();
    let row_len = width as usize * channels;
    let cover_row = cw as usize * channels;
    let mut data = vec![0u8; row_len * height as usize];
    if cover_row > 0 {
        for (y, row) in cover.as_raw().chunks_exact(cover_row).enumerate() {
            data[y * row_len..y * row_len + cover_row].copy_from_slice(row);
        }
    }
    let mut out = PixelBuffer::new(width, height, cover.channels(), data)?;
    paint_noise(&mut out, cw, ch, rng);
    Ok(out)
}

/// Lossless PNG of the buffer; alpha is written only if the buffer has it.
pub fn to_png_bytes(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let color = if buffer.has_alpha() {
        ExtendedColorType::Rgba8
    } else {
        ExtendedColorType::Rgb8
    };
    let mut out = Cursor::new(Vec::new());
    let encoder = PngEncoder::new(&mut out);
    encoder
        .write_image(buffer.as_raw(), buffer.width(), buffer.height(), color)
        .map_err(|e| StegoError::ImageEncodeFailed(e.to_string()))?;
    let out = out.into_inner();
    if out.len() < 8 || out[..8] != PNG_SIGNATURE {
        return Err(StegoError::ImageEncodeFailed(
            "encoder produced non-PNG output".to_string(),
        ));
    }
    Ok(out)
}
