// Bit-plane packing: a byte stream is read as one MSB-first bit stream and written
// `bits_per_channel` bits at a time into the low bits of successive color samples.
//
// Sample order: pixel (0,0) R, G, B, then pixel (1,0) ... row-major, alpha skipped.
// `sample_offset` is the only place that order is defined; pack and unpack both use it.

use crate::config::validate_bits;
use crate::error::{Result, StegoError};
use crate::pixels::PixelBuffer;

/// Byte offset in the raw buffer of color sample `index`.
#[inline]
fn sample_offset(index: u64, channels: u8) -> usize {
    let pixel = index / 3;
    let channel = index % 3;
    (pixel * channels as u64 + channel) as usize
}

/// Reads `n` (<= 8) stream bits starting at bit `pos`, MSB-first.
#[inline]
fn read_bits(bytes: &[u8], pos: u64, n: u32) -> u8 {
    let idx = (pos / 8) as usize;
    let off = (pos % 8) as u32;
    let window = (bytes[idx] as u16) << 8 | *bytes.get(idx + 1).unwrap_or(&0) as u16;
    ((window >> (16 - off - n)) & ((1u16 << n) - 1)) as u8
}

/// ORs the low `n` bits of `value` into the stream at bit `pos`, MSB-first.
#[inline]
fn write_bits(bytes: &mut [u8], pos: u64, n: u32, value: u8) {
    let idx = (pos / 8) as usize;
    let off = (pos % 8) as u32;
    let window = (value as u16) << (16 - off - n);
    bytes[idx] |= (window >> 8) as u8;
    if let Some(next) = bytes.get_mut(idx + 1) {
        *next |= window as u8;
    }
}

fn check_fits(buffer: &PixelBuffer, bits_per_channel: u8, start_bit: u64, byte_count: usize) -> Result<()> {
    let available_bits = buffer.color_samples() * bits_per_channel as u64;
    let needed_bits = start_bit + byte_count as u64 * 8;
    if needed_bits > available_bits {
        return Err(StegoError::BufferTooSmall {
            needed_bits,
            available_bits,
        });
    }
    Ok(())
}

/// Writes `stream` into the low `bits_per_channel` bits of the buffer's color samples, starting
/// at stream bit `start_bit`. Higher bits of every sample and all alpha samples are left intact.
/// Returns the number of bits written.
pub fn pack(buffer: &mut PixelBuffer, stream: &[u8], bits_per_channel: u8, start_bit: u64) -> Result<u64> {
    validate_bits(bits_per_channel)?;
    check_fits(buffer, bits_per_channel, start_bit, stream.len())?;

    let b = bits_per_channel as u64;
    let channels = buffer.channels();
    let samples = buffer.as_raw_mut();
    let end = start_bit + stream.len() as u64 * 8;
    let mut bit = start_bit;
    while bit < end {
        let inner = bit % b;
        let take = (b - inner).min(end - bit);
        let value = read_bits(stream, bit - start_bit, take as u32);
        let shift = b - inner - take;
        let mask = ((((1u16 << take) - 1) << shift) & 0xFF) as u8;
        let sample = &mut samples[sample_offset(bit / b, channels)];
        *sample = (*sample & !mask) | (value << shift);
        bit += take;
    }
    Ok(end - start_bit)
}

/// Reads `byte_count` bytes back from the low bits, starting at stream bit `start_bit`.
/// Exact inverse of [`pack`] for the same bit depth and offset.
pub fn unpack(buffer: &PixelBuffer, bits_per_channel: u8, start_bit: u64, byte_count: usize) -> Result<Vec<u8>> {
    validate_bits(bits_per_channel)?;
    check_fits(buffer, bits_per_channel, start_bit, byte_count)?;

    let b = bits_per_channel as u64;
    let channels = buffer.channels();
    let samples = buffer.as_raw();
    let mut out = vec![0u8; byte_count];
    let end = start_bit + byte_count as u64 * 8;
    let mut bit = start_bit;
    while bit < end {
        let inner = bit % b;
        let take = (b - inner).min(end - bit);
        let shift = b - inner - take;
        let sample = samples[sample_offset(bit / b, channels)];
        let value = ((sample as u16 >> shift) & ((1u16 << take) - 1)) as u8;
        write_bits(&mut out, bit - start_bit, take as u32, value);
        bit += take;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, channels: u8, value: u8) -> PixelBuffer {
        let len = width as usize * height as usize * channels as usize;
        PixelBuffer::new(width, height, channels, vec![value; len]).unwrap()
    }

    #[test]
    fn two_bit_chunks_msb_first() {
        let mut buf = filled(2, 1, 3, 0);
        let written = pack(&mut buf, &[0b1011_0010], 2, 0).unwrap();
        assert_eq!(written, 8);
        assert_eq!(&buf.as_raw()[..4], &[0b10, 0b11, 0b00, 0b10]);
        assert_eq!(buf.as_raw()[4..], [0, 0]);
    }

    #[test]
    fn high_bits_preserved_and_tail_partial() {
        // 16 bits at depth 3: five full chunks then one chunk carrying a single bit.
        let mut buf = filled(2, 1, 3, 0xFF);
        pack(&mut buf, &[0xFF, 0x00], 3, 0).unwrap();
        assert_eq!(buf.as_raw(), &[0xFF, 0xFF, 0xFE, 0xF8, 0xF8, 0xFB]);
        assert_eq!(unpack(&buf, 3, 0, 2).unwrap(), vec![0xFF, 0x00]);
    }

    #[test]
    fn alpha_skipped() {
        let mut buf = filled(2, 1, 4, 0x80);
        pack(&mut buf, &[0xFF, 0xFF], 4, 0).unwrap();
        assert_eq!(buf.as_raw(), &[0x8F, 0x8F, 0x8F, 0x80, 0x8F, 0x80, 0x80, 0x80]);
    }

    #[test]
    fn offset_packing_is_seamless() {
        let data: Vec<u8> = (0u8..=200).map(|i| i.wrapping_mul(37) ^ 0x5A).collect();
        for b in 1..=8u8 {
            let mut whole = filled(40, 40, 3, 0x33);
            let mut split = whole.clone();
            pack(&mut whole, &data, b, 0).unwrap();
            let cut = 77;
            pack(&mut split, &data[..cut], b, 0).unwrap();
            pack(&mut split, &data[cut..], b, cut as u64 * 8).unwrap();
            assert_eq!(whole, split, "depth {b}");
            assert_eq!(unpack(&split, b, 0, data.len()).unwrap(), data, "depth {b}");
            assert_eq!(unpack(&split, b, cut as u64 * 8, 10).unwrap(), &data[cut..cut + 10]);
        }
    }

    #[test]
    fn too_small_is_an_error() {
        let mut buf = filled(1, 1, 3, 0);
        // 3 samples * 2 bits = 6 bits < 8.
        match pack(&mut buf, &[1], 2, 0) {
            Err(StegoError::BufferTooSmall { needed_bits, available_bits }) => {
                assert_eq!(needed_bits, 8);
                assert_eq!(available_bits, 6);
            }
            other => panic!("expected BufferTooSmall, got {other:?}"),
        }
        assert_eq!(buf.as_raw(), &[0, 0, 0]);
        assert!(unpack(&buf, 2, 0, 1).is_err());
    }

    #[test]
    fn exact_fit() {
        let mut buf = filled(8, 1, 3, 0);
        pack(&mut buf, &[0xAB, 0xCD, 0xEF], 1, 0).unwrap();
        assert_eq!(unpack(&buf, 1, 0, 3).unwrap(), vec![0xAB, 0xCD, 0xEF]);
    }
}
