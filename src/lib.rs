//! Hide files and text in the low bits of PNG pixels.
//!
//! A run serializes a [`header::PayloadHeader`] followed by the payload into the low
//! `bits_per_channel` bits of every color sample (row-major, R→G→B, alpha untouched) and writes
//! the carrier as PNG. Decoding reads the header at the same depth, then exactly the declared
//! number of payload bytes, and checks their SHA-256 before returning them.

pub mod bitplane;
pub mod canvas;
pub mod capacity;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod pixels;
pub mod worker;

use base64::Engine;
use serde::{Deserialize, Serialize};

pub use capacity::CapacityReport;
pub use classify::PayloadKind;
pub use codec::{decode, encode, DecodeRequest, DecodedPayload, EncodeRequest, EncodedImage};
pub use config::{EncodingConfig, Settings, SettingsError};
pub use error::{ErrorKind, ErrorReport, StegoError};
pub use pixels::PixelBuffer;

#[derive(Debug, Serialize, Deserialize)]
pub struct StegoDecodeResult {
    pub ok: bool,
    pub suggested_name: Option<String>,
    pub declared_type: Option<String>,
    pub byte_length: Option<u64>,
    pub kind: Option<PayloadKind>,
    /// Text payloads verbatim; anything else as `base64:<data>`.
    pub payload: Option<String>,
    pub error: Option<ErrorReport>,
}

impl StegoDecodeResult {
    pub fn from_payload(decoded: &DecodedPayload) -> Self {
        let payload = match (decoded.kind, std::str::from_utf8(&decoded.bytes)) {
            (PayloadKind::Text, Ok(text)) => text.to_string(),
            _ => format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(&decoded.bytes)
            ),
        };
        Self {
            ok: true,
            suggested_name: Some(decoded.suggested_name.clone()),
            declared_type: Some(decoded.declared_type.clone()),
            byte_length: Some(decoded.byte_length),
            kind: Some(decoded.kind),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(report: ErrorReport) -> Self {
        Self {
            ok: false,
            suggested_name: None,
            declared_type: None,
            byte_length: None,
            kind: None,
            payload: None,
            error: Some(report),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StegoEncodeResult {
    pub ok: bool,
    pub path: Option<String>,
    pub capacity: Option<CapacityReport>,
    pub error: Option<ErrorReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(bytes: &[u8], kind: PayloadKind) -> DecodedPayload {
        DecodedPayload {
            bytes: bytes.to_vec(),
            suggested_name: "x".to_string(),
            declared_type: String::new(),
            byte_length: bytes.len() as u64,
            kind,
        }
    }

    #[test]
    fn text_result_is_verbatim() {
        let r = StegoDecodeResult::from_payload(&decoded(b"hi there", PayloadKind::Text));
        assert_eq!(r.payload.as_deref(), Some("hi there"));
    }

    #[test]
    fn binary_result_is_base64() {
        let r = StegoDecodeResult::from_payload(&decoded(&[0, 1, 2], PayloadKind::Binary));
        assert_eq!(r.payload.as_deref(), Some("base64:AAEC"));
    }

    #[test]
    fn error_result_serializes() {
        let r = StegoDecodeResult::failed(ErrorReport::from(&StegoError::HeaderMagicMismatch));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["error"], "HeaderMagicMismatch");
    }
}
