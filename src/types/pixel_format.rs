//! Target pixel formats for packed sheets.

use serde::{Deserialize, Serialize};

/// Runtime pixel format a packed sheet is converted to at load time.
///
/// Sheets are stored as codec-native PNG alongside the atlas manifest;
/// this tag tells the engine which GPU format to upload as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8888,
    Rgba4444,
    Rgba5551,
    Rgb565,
}

impl PixelFormat {
    /// Stable on-disk code (u8 in the atlas manifest).
    pub fn code(self) -> u8 {
        match self {
            PixelFormat::Rgba8888 => 0,
            PixelFormat::Rgba4444 => 1,
            PixelFormat::Rgba5551 => 2,
            PixelFormat::Rgb565 => 3,
        }
    }

    pub fn is_16_bit(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba4444 | PixelFormat::Rgba5551 | PixelFormat::Rgb565
        )
    }

    /// Apply the "Force 32-Bit" policy: 16-bit formats are remapped upward.
    pub fn forced_32_bit(self) -> Self {
        if self.is_16_bit() {
            PixelFormat::Rgba8888
        } else {
            self
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Rgba8888
    }
}
