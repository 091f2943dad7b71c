// End-to-end encode / decode runs.
//
// Encode: Idle -> Provisioning -> Writing -> Done
// Decode: Idle -> Provisioning -> Reading -> Verifying -> Done
// Any error moves the run to Failed; nothing is retried.

use crate::bitplane::{pack, unpack};
use crate::canvas::{check_ceiling, ensure_capacity, load, to_png_bytes};
use crate::capacity::usable_bytes;
use crate::classify::{classify_payload, PayloadKind};
use crate::config::{validate_bits, EncodingConfig, MAX_BITS};
use crate::error::{Result, StegoError};
use crate::header::{PayloadHeader, MAX_HEADER_LEN};
use crate::pixels::PixelBuffer;

pub const DEFAULT_DECODED_NAME: &str = "decoded_data";

/// Payload bytes packed or unpacked between progress reports.
const CHUNK_BYTES: usize = 256 * 1024;
/// Smallest progress change worth reporting.
const PROGRESS_STEP: f32 = 0.01;
/// Intermediate reports stay below this; 1.0 belongs to the finished artifact.
const PROGRESS_CEILING: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Provisioning,
    Writing,
    Reading,
    Verifying,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub cover_image: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub payload_name: Option<String>,
    pub payload_type: Option<String>,
    pub config: EncodingConfig,
}

impl EncodeRequest {
    pub fn new(payload: Vec<u8>, config: EncodingConfig) -> Self {
        Self {
            cover_image: None,
            payload,
            payload_name: None,
            payload_type: None,
            config,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_channel: u8,
}

#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub image: Vec<u8>,
    pub bits_per_channel: u8,
    pub max_canvas_dimension: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub suggested_name: String,
    pub declared_type: String,
    pub byte_length: u64,
    pub kind: PayloadKind,
}

/// Tracks state and keeps reported progress monotone and coarse.
struct Run<'a> {
    state: RunState,
    last: f32,
    sink: &'a mut dyn FnMut(f32),
}

impl<'a> Run<'a> {
    fn new(sink: &'a mut dyn FnMut(f32)) -> Self {
        Self {
            state: RunState::Idle,
            last: 0.0,
            sink,
        }
    }

    fn enter(&mut self, state: RunState) {
        tracing::debug!(from = ?self.state, to = ?state, "run state");
        self.state = state;
    }

    fn report(&mut self, value: f32) {
        let value = value.clamp(0.0, PROGRESS_CEILING);
        if value - self.last >= PROGRESS_STEP {
            self.last = value;
            (self.sink)(value);
        }
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.enter(RunState::Done),
            Err(e) => {
                tracing::debug!(error = %e, "run failed");
                self.enter(RunState::Failed);
            }
        }
        result
    }
}

/// Hides `request.payload` and returns the carrier as PNG. `on_progress` sees values in
/// `[0, 1)`; returning the image is the final step.
pub fn encode(request: EncodeRequest, on_progress: &mut dyn FnMut(f32)) -> Result<EncodedImage> {
    let mut run = Run::new(on_progress);
    let result = encode_run(request, &mut run);
    run.finish(result)
}

fn encode_run(request: EncodeRequest, run: &mut Run<'_>) -> Result<EncodedImage> {
    run.enter(RunState::Provisioning);
    let config = request.config;
    config.validate()?;
    let header = PayloadHeader::for_payload(
        &request.payload,
        request.payload_name.as_deref().unwrap_or_default(),
        request.payload_type.as_deref().unwrap_or_default(),
    )?;
    let header_bytes = header.serialize();
    let required = (header_bytes.len() + request.payload.len()) as u64;

    let cover = request.cover_image.as_deref().map(load).transpose()?;
    run.report(0.05);
    let mut buffer = ensure_capacity(cover, required, &config)?;
    run.report(0.1);

    run.enter(RunState::Writing);
    let bits = config.bits_per_channel;
    let mut offset = pack(&mut buffer, &header_bytes, bits, 0)?;
    let total = request.payload.len().max(1) as f32;
    let mut done = 0usize;
    for chunk in request.payload.chunks(CHUNK_BYTES) {
        offset += pack(&mut buffer, chunk, bits, offset)?;
        done += chunk.len();
        run.report(0.1 + 0.8 * done as f32 / total);
    }
    tracing::debug!(
        bits_written = offset,
        width = buffer.width(),
        height = buffer.height(),
        "payload packed"
    );

    let png = to_png_bytes(&buffer)?;
    run.report(PROGRESS_CEILING);
    Ok(EncodedImage {
        png,
        width: buffer.width(),
        height: buffer.height(),
        bits_per_channel: bits,
    })
}

/// Recovers the payload hidden in `request.image` at `request.bits_per_channel`.
pub fn decode(request: DecodeRequest, on_progress: &mut dyn FnMut(f32)) -> Result<DecodedPayload> {
    let mut run = Run::new(on_progress);
    let result = decode_run(request, &mut run);
    run.finish(result)
}

fn decode_run(request: DecodeRequest, run: &mut Run<'_>) -> Result<DecodedPayload> {
    run.enter(RunState::Provisioning);
    let bits = request.bits_per_channel;
    validate_bits(bits)?;
    let buffer = load(&request.image)?;
    let (width, height) = buffer.dimensions();
    check_ceiling(width, height, request.max_canvas_dimension)?;
    run.report(0.1);

    run.enter(RunState::Reading);
    let (header, header_len) = read_header(&buffer, bits)?;
    run.report(0.2);

    let capacity = usable_bytes(width, height, bits);
    let truncated = StegoError::HeaderTruncated {
        needed: (header_len as u64).saturating_add(header.payload_length),
        available: capacity,
    };
    match (header_len as u64).checked_add(header.payload_length) {
        Some(needed) if needed <= capacity => {}
        _ => return Err(truncated),
    }
    let payload_len = usize::try_from(header.payload_length).map_err(|_| truncated)?;
    let mut bytes = Vec::with_capacity(payload_len);
    let mut offset = header_len as u64 * 8;
    while bytes.len() < payload_len {
        let n = CHUNK_BYTES.min(payload_len - bytes.len());
        bytes.extend_from_slice(&unpack(&buffer, bits, offset, n)?);
        offset += n as u64 * 8;
        run.report(0.2 + 0.7 * bytes.len() as f32 / payload_len as f32);
    }

    run.enter(RunState::Verifying);
    header.verify(&bytes)?;
    tracing::debug!(
        sha256 = %hex::encode(header.checksum),
        bytes = bytes.len(),
        "payload verified"
    );
    run.report(PROGRESS_CEILING);

    let kind = classify_payload(&header.type_hint, &bytes);
    let suggested_name = if header.name.is_empty() {
        DEFAULT_DECODED_NAME.to_string()
    } else {
        header.name
    };
    Ok(DecodedPayload {
        byte_length: bytes.len() as u64,
        bytes,
        suggested_name,
        declared_type: header.type_hint,
        kind,
    })
}

/// Unpacks the bounded header region (at most the worst-case header, at most the capacity)
/// and parses it.
fn read_header(buffer: &PixelBuffer, bits_per_channel: u8) -> Result<(PayloadHeader, usize)> {
    let capacity = usable_bytes(buffer.width(), buffer.height(), bits_per_channel);
    let region = (MAX_HEADER_LEN as u64).min(capacity) as usize;
    let raw = unpack(buffer, bits_per_channel, 0, region)?;
    PayloadHeader::deserialize(&raw)
}

/// Finds the first bit depth at which `image` carries a parseable header. Carriers above
/// `max_canvas_dimension` are refused as in [`decode`].
pub fn probe_depth(image: &[u8], max_canvas_dimension: u32) -> Result<Option<u8>> {
    let buffer = load(image)?;
    let (width, height) = buffer.dimensions();
    check_ceiling(width, height, max_canvas_dimension)?;
    for bits in 1..=MAX_BITS {
        match read_header(&buffer, bits) {
            Ok(_) => {
                tracing::debug!(bits, "header found");
                return Ok(Some(bits));
            }
            Err(e) if e.is_header_error() => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::synthesize;

    fn cover_png(width: u32, height: u32) -> Vec<u8> {
        to_png_bytes(&synthesize(width, height)).unwrap()
    }

    fn config(bits: u8) -> EncodingConfig {
        EncodingConfig {
            bits_per_channel: bits,
            auto_expand: false,
            max_canvas_dimension: 4096,
        }
    }

    fn decode_request(image: Vec<u8>, bits: u8) -> DecodeRequest {
        DecodeRequest {
            image,
            bits_per_channel: bits,
            max_canvas_dimension: 4096,
        }
    }

    #[test]
    fn hello_scenario() {
        let mut request = EncodeRequest::new(b"Hello".to_vec(), config(2));
        request.cover_image = Some(cover_png(64, 64));
        request.payload_name = Some("msg.txt".to_string());
        let encoded = encode(request, &mut |_| {}).unwrap();
        assert_eq!((encoded.width, encoded.height), (64, 64));

        let decoded = decode(decode_request(encoded.png, 2), &mut |_| {}).unwrap();
        assert_eq!(decoded.bytes, vec![0x48, 0x65, 0x6C, 0x6C, 0x6F]);
        assert_eq!(decoded.suggested_name, "msg.txt");
        assert_eq!(decoded.byte_length, 5);
        assert_eq!(decoded.kind, PayloadKind::Text);
    }

    #[test]
    fn progress_is_monotone_and_below_one() {
        let payload: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
        let mut request = EncodeRequest::new(payload, config(4));
        request.config.auto_expand = true;
        let mut seen = Vec::new();
        let encoded = encode(request, &mut |p| seen.push(p)).unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|&p| (0.0..1.0).contains(&p)));

        let mut seen = Vec::new();
        decode(decode_request(encoded.png, 4), &mut |p| seen.push(p)).unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|&p| p < 1.0));
    }

    #[test]
    fn unnamed_payload_gets_default_name() {
        let mut request = EncodeRequest::new(vec![0, 159, 146, 150], config(1));
        request.cover_image = Some(cover_png(40, 40));
        let encoded = encode(request, &mut |_| {}).unwrap();
        let decoded = decode(decode_request(encoded.png, 1), &mut |_| {}).unwrap();
        assert_eq!(decoded.suggested_name, DEFAULT_DECODED_NAME);
        assert_eq!(decoded.declared_type, "");
        assert_eq!(decoded.kind, PayloadKind::Binary);
    }

    #[test]
    fn tampered_payload_is_corrupted() {
        let mut request = EncodeRequest::new(vec![0xAB; 64], config(1));
        request.cover_image = Some(cover_png(48, 48));
        let encoded = encode(request, &mut |_| {}).unwrap();

        let mut buf = load(&encoded.png).unwrap();
        let header_len = PayloadHeader::for_payload(&[0xAB; 64], "", "").unwrap().encoded_len();
        // Flip the lowest bit of the first payload sample (depth 1: one sample per bit).
        let sample = header_len * 8;
        let idx = (sample / 3) * buf.channels() as usize + sample % 3;
        buf.as_raw_mut()[idx] ^= 1;
        let tampered = to_png_bytes(&buf).unwrap();

        assert!(matches!(
            decode(decode_request(tampered, 1), &mut |_| {}),
            Err(StegoError::PayloadCorrupted)
        ));
    }

    #[test]
    fn probe_finds_depth() {
        let mut request = EncodeRequest::new(b"depth".to_vec(), config(5));
        request.cover_image = Some(cover_png(32, 32));
        let encoded = encode(request, &mut |_| {}).unwrap();
        assert_eq!(probe_depth(&encoded.png, 4096).unwrap(), Some(5));
    }

    #[test]
    fn probe_respects_ceiling() {
        assert!(matches!(
            probe_depth(&cover_png(40, 8), 32),
            Err(StegoError::MaxCanvasExceeded { width: 40, height: 8, max_dimension: 32 })
        ));
    }

    #[test]
    fn oversized_carrier_rejected_on_decode() {
        let mut request = decode_request(cover_png(20, 10), 1);
        request.max_canvas_dimension = 16;
        assert!(matches!(
            decode(request, &mut |_| {}),
            Err(StegoError::MaxCanvasExceeded { width: 20, height: 10, .. })
        ));
    }

    #[test]
    fn declared_length_beyond_capacity_is_truncated() {
        let mut buf = synthesize(16, 16);
        let mut header = PayloadHeader::for_payload(b"", "", "").unwrap();
        header.payload_length = 10_000;
        pack(&mut buf, &header.serialize(), 2, 0).unwrap();
        let png = to_png_bytes(&buf).unwrap();
        assert!(matches!(
            decode(decode_request(png, 2), &mut |_| {}),
            Err(StegoError::HeaderTruncated { .. })
        ));
    }

    #[test]
    fn declared_length_near_u64_max_is_truncated() {
        let mut buf = synthesize(64, 64);
        let mut header = PayloadHeader::for_payload(b"", "", "").unwrap();
        header.payload_length = u64::MAX - 10;
        pack(&mut buf, &header.serialize(), 2, 0).unwrap();
        let png = to_png_bytes(&buf).unwrap();
        assert!(matches!(
            decode(decode_request(png.clone(), 2), &mut |_| {}),
            Err(StegoError::HeaderTruncated { needed: u64::MAX, .. })
        ));

        let event = crate::worker::spawn_decode(decode_request(png, 2)).wait(|_| {});
        assert!(matches!(event, Some(crate::worker::RunEvent::Failed(_))));
    }
}
