// Error kinds for a single encode or decode run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that end a run. Every variant is terminal; nothing inside the codec retries.
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("payload of {required} bytes cannot fit in a {max_dimension}x{max_dimension} canvas at {bits_per_channel} bits/channel")]
    CapacityUnattainable {
        required: u64,
        bits_per_channel: u8,
        max_dimension: u32,
    },

    #[error("payload needs {required} bytes but the image only holds {available}")]
    CapacityExceeded { required: u64, available: u64 },

    #[error("canvas would need {width}x{height} but the maximum dimension is {max_dimension}")]
    MaxCanvasExceeded {
        width: u32,
        height: u32,
        max_dimension: u32,
    },

    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("image decode failed: {0}")]
    ImageDecodeFailed(String),

    #[error("magic not found (not a stegcanvas image, or wrong bits per channel)")]
    HeaderMagicMismatch,

    #[error("header truncated: need {needed} bytes, have {available}")]
    HeaderTruncated { needed: u64, available: u64 },

    #[error("header version {0} is newer than this codec understands")]
    HeaderVersionUnsupported(u8),

    #[error("payload checksum mismatch")]
    PayloadCorrupted,

    #[error("bit stream of {needed_bits} bits does not fit in {available_bits} bits")]
    BufferTooSmall { needed_bits: u64, available_bits: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("image encode failed: {0}")]
    ImageEncodeFailed(String),
}

/// Flat, serializable tag for [`StegoError`], carried in failed run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    CapacityUnattainable,
    CapacityExceeded,
    MaxCanvasExceeded,
    UnsupportedImageFormat,
    ImageDecodeFailed,
    HeaderMagicMismatch,
    HeaderTruncated,
    HeaderVersionUnsupported,
    PayloadCorrupted,
    BufferTooSmall,
    InvalidConfig,
    ImageEncodeFailed,
}

impl StegoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapacityUnattainable { .. } => ErrorKind::CapacityUnattainable,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::MaxCanvasExceeded { .. } => ErrorKind::MaxCanvasExceeded,
            Self::UnsupportedImageFormat(_) => ErrorKind::UnsupportedImageFormat,
            Self::ImageDecodeFailed(_) => ErrorKind::ImageDecodeFailed,
            Self::HeaderMagicMismatch => ErrorKind::HeaderMagicMismatch,
            Self::HeaderTruncated { .. } => ErrorKind::HeaderTruncated,
            Self::HeaderVersionUnsupported(_) => ErrorKind::HeaderVersionUnsupported,
            Self::PayloadCorrupted => ErrorKind::PayloadCorrupted,
            Self::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::ImageEncodeFailed(_) => ErrorKind::ImageEncodeFailed,
        }
    }

    /// True for the errors a decode raises when the carrier holds no readable header.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::HeaderMagicMismatch | Self::HeaderTruncated { .. } | Self::HeaderVersionUnsupported(_)
        )
    }
}

impl From<image::ImageError> for StegoError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(_) => Self::UnsupportedImageFormat(e.to_string()),
            image::ImageError::Encoding(_) => Self::ImageEncodeFailed(e.to_string()),
            _ => Self::ImageDecodeFailed(e.to_string()),
        }
    }
}

/// Structured error event: `{ error: ErrorKind, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: ErrorKind,
    pub message: String,
}

impl From<&StegoError> for ErrorReport {
    fn from(e: &StegoError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StegoError>;
