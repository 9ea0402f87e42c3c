//! Virtual keyboard report encoding.
//!
//! Input report (client → hub), variable length:
//!
//! ```text
//! Byte 0:  Modifiers
//! Byte 1:  Key count
//! Bytes 2+: Key codes (HID usage ids of pressed keys)
//! ```
//!
//! Output record (hub → client): a single byte of LED flags. Several
//! records may arrive concatenated in one delivery; split with
//! [`LedState::split`].

use serde::{Deserialize, Serialize};

/// Device type tag understood by the hub.
pub const DEVICE_TYPE: &str = "keyboard";

/// Size in bytes of one LED output record.
pub const OUTPUT_RECORD_SIZE: usize = 1;

// Modifier key bitmasks
pub const MOD_LEFT_CTRL: u8 = 0x01;
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_LEFT_ALT: u8 = 0x04;
pub const MOD_LEFT_GUI: u8 = 0x08;
pub const MOD_RIGHT_CTRL: u8 = 0x10;
pub const MOD_RIGHT_SHIFT: u8 = 0x20;
pub const MOD_RIGHT_ALT: u8 = 0x40;
pub const MOD_RIGHT_GUI: u8 = 0x80;

// LED bitmasks
pub const LED_NUM_LOCK: u8 = 0x01;
pub const LED_CAPS_LOCK: u8 = 0x02;
pub const LED_SCROLL_LOCK: u8 = 0x04;
pub const LED_COMPOSE: u8 = 0x08;
pub const LED_KANA: u8 = 0x10;

// HID usage ids (USB HID Keyboard/Keypad usage page)
pub const KEY_A: u8 = 0x04;
pub const KEY_B: u8 = 0x05;
pub const KEY_C: u8 = 0x06;
pub const KEY_D: u8 = 0x07;
pub const KEY_E: u8 = 0x08;
pub const KEY_F: u8 = 0x09;
pub const KEY_G: u8 = 0x0A;
pub const KEY_H: u8 = 0x0B;
pub const KEY_I: u8 = 0x0C;
pub const KEY_J: u8 = 0x0D;
pub const KEY_K: u8 = 0x0E;
pub const KEY_L: u8 = 0x0F;
pub const KEY_M: u8 = 0x10;
pub const KEY_N: u8 = 0x11;
pub const KEY_O: u8 = 0x12;
pub const KEY_P: u8 = 0x13;
pub const KEY_Q: u8 = 0x14;
pub const KEY_R: u8 = 0x15;
pub const KEY_S: u8 = 0x16;
pub const KEY_T: u8 = 0x17;
pub const KEY_U: u8 = 0x18;
pub const KEY_V: u8 = 0x19;
pub const KEY_W: u8 = 0x1A;
pub const KEY_X: u8 = 0x1B;
pub const KEY_Y: u8 = 0x1C;
pub const KEY_Z: u8 = 0x1D;
pub const KEY_1: u8 = 0x1E;
pub const KEY_2: u8 = 0x1F;
pub const KEY_3: u8 = 0x20;
pub const KEY_4: u8 = 0x21;
pub const KEY_5: u8 = 0x22;
pub const KEY_6: u8 = 0x23;
pub const KEY_7: u8 = 0x24;
pub const KEY_8: u8 = 0x25;
pub const KEY_9: u8 = 0x26;
pub const KEY_0: u8 = 0x27;
pub const KEY_ENTER: u8 = 0x28;
pub const KEY_ESC: u8 = 0x29;
pub const KEY_BACKSPACE: u8 = 0x2A;
pub const KEY_TAB: u8 = 0x2B;
pub const KEY_SPACE: u8 = 0x2C;
pub const KEY_MINUS: u8 = 0x2D;
pub const KEY_EQUAL: u8 = 0x2E;

/// Keyboard state used to build input reports.
///
/// Pressed keys live in a 256-bit bitmap, so any combination of keys can
/// be held simultaneously (N-key rollover). The wire report only carries
/// the keys that are down.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyboardInput {
    /// Modifier bitmask (`MOD_*` constants).
    pub modifiers: u8,
    /// One bit per HID usage id 0x00–0xFF.
    key_bitmap: [u8; 32],
}

impl KeyboardInput {
    /// Creates an empty state: no modifiers, no keys down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as pressed.
    pub fn press(&mut self, key: u8) {
        self.key_bitmap[(key / 8) as usize] |= 1 << (key % 8);
    }

    /// Marks `key` as released.
    pub fn release(&mut self, key: u8) {
        self.key_bitmap[(key / 8) as usize] &= !(1 << (key % 8));
    }

    /// Returns `true` if `key` is currently pressed.
    pub fn is_pressed(&self, key: u8) -> bool {
        self.key_bitmap[(key / 8) as usize] & (1 << (key % 8)) != 0
    }

    /// Releases every key and clears the modifiers.
    pub fn clear(&mut self) {
        self.modifiers = 0;
        self.key_bitmap = [0; 32];
    }

    /// Encodes the state as a wire report: `[modifiers, count, keys...]`.
    pub fn report(&self) -> Vec<u8> {
        let mut keys = Vec::new();
        for code in 0u16..=0xFF {
            if self.is_pressed(code as u8) {
                keys.push(code as u8);
            }
        }
        let mut b = Vec::with_capacity(2 + keys.len());
        b.push(self.modifiers);
        b.push(keys.len() as u8);
        b.extend_from_slice(&keys);
        b
    }
}

/// Decoded state of the keyboard LEDs, controlled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedState {
    pub num_lock: bool,
    pub caps_lock: bool,
    pub scroll_lock: bool,
    pub compose: bool,
    pub kana: bool,
}

impl LedState {
    /// Decodes one LED bitmask byte.
    pub fn from_byte(b: u8) -> Self {
        Self {
            num_lock: b & LED_NUM_LOCK != 0,
            caps_lock: b & LED_CAPS_LOCK != 0,
            scroll_lock: b & LED_SCROLL_LOCK != 0,
            compose: b & LED_COMPOSE != 0,
            kana: b & LED_KANA != 0,
        }
    }

    /// Splits a delivery into its LED records. Output deliveries may carry
    /// zero or more 1-byte records concatenated.
    pub fn split(buf: &[u8]) -> impl Iterator<Item = LedState> + '_ {
        buf.iter().copied().map(LedState::from_byte)
    }
}
