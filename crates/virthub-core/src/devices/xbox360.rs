//! Xbox 360 pad report encoding.
//!
//! Input report (client → hub), fixed 14 bytes, little-endian:
//!
//! ```text
//! Bytes  0-3:  Buttons (u32 bitfield, lower 16 bits used)
//! Byte   4:    LT (0-255)
//! Byte   5:    RT (0-255)
//! Bytes  6-7:  LX (i16)
//! Bytes  8-9:  LY (i16)
//! Bytes 10-11: RX (i16)
//! Bytes 12-13: RY (i16)
//! ```
//!
//! Output record (hub → client): 2 bytes, left and right rumble motor
//! intensity. Several records may arrive concatenated in one delivery;
//! split with [`Rumble::split`].

use serde::{Deserialize, Serialize};

/// Device type tag understood by the hub.
pub const DEVICE_TYPE: &str = "xbox360";

/// Size in bytes of one encoded input report.
pub const INPUT_REPORT_SIZE: usize = 14;

/// Size in bytes of one rumble output record.
pub const OUTPUT_RECORD_SIZE: usize = 2;

// Button bitmasks (XInput compatible)
pub const BUTTON_DPAD_UP: u32 = 0x0001;
pub const BUTTON_DPAD_DOWN: u32 = 0x0002;
pub const BUTTON_DPAD_LEFT: u32 = 0x0004;
pub const BUTTON_DPAD_RIGHT: u32 = 0x0008;
pub const BUTTON_START: u32 = 0x0010;
pub const BUTTON_BACK: u32 = 0x0020;
pub const BUTTON_LEFT_THUMB: u32 = 0x0040;
pub const BUTTON_RIGHT_THUMB: u32 = 0x0080;
pub const BUTTON_LEFT_SHOULDER: u32 = 0x0100;
pub const BUTTON_RIGHT_SHOULDER: u32 = 0x0200;
pub const BUTTON_GUIDE: u32 = 0x0400;
pub const BUTTON_A: u32 = 0x1000;
pub const BUTTON_B: u32 = 0x2000;
pub const BUTTON_X: u32 = 0x4000;
pub const BUTTON_Y: u32 = 0x8000;

/// Pad state used to build input reports. Field ranges follow XInput:
/// triggers 0-255, stick axes the full signed 16-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PadInput {
    pub buttons: u32,
    pub lt: u8,
    pub rt: u8,
    pub lx: i16,
    pub ly: i16,
    pub rx: i16,
    pub ry: i16,
}

impl PadInput {
    /// Encodes the state as the 14-byte wire report.
    pub fn report(&self) -> [u8; INPUT_REPORT_SIZE] {
        let mut b = [0u8; INPUT_REPORT_SIZE];
        b[0..4].copy_from_slice(&self.buttons.to_le_bytes());
        b[4] = self.lt;
        b[5] = self.rt;
        b[6..8].copy_from_slice(&self.lx.to_le_bytes());
        b[8..10].copy_from_slice(&self.ly.to_le_bytes());
        b[10..12].copy_from_slice(&self.rx.to_le_bytes());
        b[12..14].copy_from_slice(&self.ry.to_le_bytes());
        b
    }
}

/// One rumble command from the hub: motor intensities 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rumble {
    pub left: u8,
    pub right: u8,
}

impl Rumble {
    /// Splits a delivery into its rumble records. Output deliveries may
    /// carry zero or more 2-byte records concatenated; a trailing partial
    /// record is ignored.
    pub fn split(buf: &[u8]) -> impl Iterator<Item = Rumble> + '_ {
        buf.chunks_exact(OUTPUT_RECORD_SIZE).map(|c| Rumble {
            left: c[0],
            right: c[1],
        })
    }
}
