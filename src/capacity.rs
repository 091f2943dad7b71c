// Capacity model: image dimensions and bit depth <-> hideable bytes.
// Only the three color channels count; alpha never carries data.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StegoError};

const COLOR_CHANNELS: u128 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub bits_per_channel: u8,
    pub width_px: u32,
    pub height_px: u32,
    pub usable_bytes: u64,
}

/// `floor(width * height * 3 * bits_per_channel / 8)`.
pub fn usable_bytes(width: u32, height: u32, bits_per_channel: u8) -> u64 {
    let bits = width as u128 * height as u128 * COLOR_CHANNELS * bits_per_channel as u128;
    (bits / 8) as u64
}

pub fn report(width: u32, height: u32, bits_per_channel: u8) -> CapacityReport {
    CapacityReport {
        bits_per_channel,
        width_px: width,
        height_px: height,
        usable_bytes: usable_bytes(width, height, bits_per_channel),
    }
}

/// Smallest pixel count whose capacity reaches `required_bytes`.
fn pixels_needed(required_bytes: u64, bits_per_channel: u8) -> u128 {
    let per_pixel = COLOR_CHANNELS * bits_per_channel as u128;
    (required_bytes as u128 * 8).div_ceil(per_pixel)
}

fn ceil_sqrt(n: u128) -> u128 {
    let mut s = (n as f64).sqrt() as u128;
    while s * s < n {
        s += 1;
    }
    while s > 0 && (s - 1) * (s - 1) >= n {
        s -= 1;
    }
    s
}

/// Smallest dimensions holding `required_bytes` at `bits_per_channel`, neither side above
/// `max_dimension`.
///
/// Without a hint the canvas is as close to square as possible. With an `aspect_hint` of
/// `(w, h)` the result follows `width = ceil(height * w / h)` and the smallest such height is
/// chosen; when that family outgrows the ceiling, the long side is pinned to the ceiling.
pub fn min_dimensions_for(
    required_bytes: u64,
    bits_per_channel: u8,
    aspect_hint: Option<(u32, u32)>,
    max_dimension: u32,
) -> Result<(u32, u32)> {
    crate::config::validate_bits(bits_per_channel)?;
    let max = max_dimension as u128;
    let pixels = pixels_needed(required_bytes, bits_per_channel).max(1);
    if max == 0 || pixels > max * max {
        return Err(StegoError::CapacityUnattainable {
            required: required_bytes,
            bits_per_channel,
            max_dimension,
        });
    }

    let (w, h) = match aspect_hint {
        Some((aw, ah)) if aw > 0 && ah > 0 => {
            along_aspect(pixels, aw as u128, ah as u128, max).unwrap_or_else(|| {
                if aw >= ah {
                    (max, pixels.div_ceil(max))
                } else {
                    (pixels.div_ceil(max), max)
                }
            })
        }
        _ => {
            let w = ceil_sqrt(pixels).min(max);
            (w, pixels.div_ceil(w))
        }
    };
    Ok((w as u32, h as u32))
}

fn aspect_width(h: u128, aw: u128, ah: u128) -> u128 {
    (h * aw).div_ceil(ah).max(1)
}

fn along_aspect(pixels: u128, aw: u128, ah: u128, max: u128) -> Option<(u128, u128)> {
    let fits = |h: u128| aspect_width(h, aw, ah) * h >= pixels;
    if !fits(max) {
        return None;
    }
    let (mut lo, mut hi) = (1u128, max);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    let w = aspect_width(lo, aw, ah);
    (w <= max).then_some((w, lo))
}
