// Codec configuration and the persisted CLI settings file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StegoError};

/// Highest usable bit depth: every bit of a color sample.
pub const MAX_BITS: u8 = 8;
pub const DEFAULT_BITS: u8 = 2;
/// Bit depth ceiling applied when visual quality should be preserved.
pub const QUALITY_BITS_CAP: u8 = 4;
/// Side of the canvas synthesized when no cover image is supplied.
pub const TILE: u32 = 256;
/// Ceiling used when the host does not report one.
pub const DEFAULT_MAX_CANVAS_DIMENSION: u32 = 16384;

const SETTINGS_DIR: &str = "stegcanvas";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingConfig {
    pub bits_per_channel: u8,
    pub auto_expand: bool,
    pub max_canvas_dimension: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            bits_per_channel: DEFAULT_BITS,
            auto_expand: true,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }
}

impl EncodingConfig {
    pub fn validate(&self) -> Result<()> {
        validate_bits(self.bits_per_channel)?;
        if self.max_canvas_dimension == 0 {
            return Err(StegoError::InvalidConfig(
                "max canvas dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_bits(bits_per_channel: u8) -> Result<()> {
    if bits_per_channel == 0 || bits_per_channel > MAX_BITS {
        return Err(StegoError::InvalidConfig(format!(
            "bits per channel must be in 1..={MAX_BITS}, got {bits_per_channel}"
        )));
    }
    Ok(())
}

/// Failure to read or parse the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file")]
    Parse(#[from] serde_json::Error),
}

/// User defaults for the CLI, read from `<config dir>/stegcanvas/settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bits_per_channel: u8,
    pub auto_expand: bool,
    pub max_canvas_dimension: u32,
    pub preserve_quality: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bits_per_channel: DEFAULT_BITS,
            auto_expand: true,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
            preserve_quality: true,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Loads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> std::result::Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Effective bit depth after the quality cap.
    pub fn effective_bits(&self, requested: u8) -> u8 {
        if self.preserve_quality && requested > QUALITY_BITS_CAP {
            tracing::warn!(
                requested,
                cap = QUALITY_BITS_CAP,
                "preserve_quality is set, clamping bits per channel"
            );
            QUALITY_BITS_CAP
        } else {
            requested
        }
    }

    pub fn encoding_config(&self) -> EncodingConfig {
        EncodingConfig {
            bits_per_channel: self.effective_bits(self.bits_per_channel),
            auto_expand: self.auto_expand,
            max_canvas_dimension: self.max_canvas_dimension,
        }
    }
}
