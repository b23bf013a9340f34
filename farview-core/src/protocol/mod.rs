//! Session input-event types.
//!
//! These are the payloads the client injects into the stream session:
//! locally captured mouse/keyboard events and externally produced
//! synthetic controller states.
//!
//! `MouseEvent` and `KeyEvent` travel inside the session's tagged
//! message stream as bincode payloads. [`ControllerState`] is different:
//! its byte layout is an externally shared contract (the event-bridge
//! producer packs the same record), so it is packed by hand,
//! little-endian, at a fixed size.

use serde::{Deserialize, Serialize};

use crate::error::FarviewError;

// ── Mouse input ───────────────────────────────────────────────────

/// Mouse input event injected into the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MouseEvent {
    /// X position in remote-display coordinates.
    pub x: i32,
    /// Y position in remote-display coordinates.
    pub y: i32,
    /// Type of mouse event.
    pub kind: MouseEventKind,
    /// Which button (if applicable).
    pub button: MouseButton,
    /// Scroll delta (for scroll events).
    pub scroll_delta: i16,
}

impl MouseEvent {
    /// Create a mouse move event.
    pub fn move_to(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            kind: MouseEventKind::Move,
            button: MouseButton::None,
            scroll_delta: 0,
        }
    }

    /// Create a mouse button press.
    pub fn press(x: i32, y: i32, button: MouseButton) -> Self {
        Self {
            x,
            y,
            kind: MouseEventKind::Press,
            button,
            scroll_delta: 0,
        }
    }

    /// Create a mouse button release.
    pub fn release(x: i32, y: i32, button: MouseButton) -> Self {
        Self {
            x,
            y,
            kind: MouseEventKind::Release,
            button,
            scroll_delta: 0,
        }
    }

    /// Create a scroll event.
    pub fn scroll(x: i32, y: i32, delta: i16) -> Self {
        Self {
            x,
            y,
            kind: MouseEventKind::Scroll,
            button: MouseButton::None,
            scroll_delta: delta,
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FarviewError> {
        bincode::serialize(self).map_err(|e| FarviewError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FarviewError> {
        bincode::deserialize(bytes).map_err(|e| FarviewError::Encoding(e.to_string()))
    }
}

/// Kind of mouse event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Press,
    Release,
    Scroll,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MouseButton {
    None,
    Left,
    Right,
    Middle,
}

// ── Keyboard input ────────────────────────────────────────────────

/// Keyboard input event injected into the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeyEvent {
    /// Virtual key code (platform-specific).
    pub virtual_key: u16,

    /// Hardware scan code.
    pub scan_code: u16,

    /// Whether this is a press or release.
    pub action: KeyAction,

    /// Modifier flags (Shift, Ctrl, Alt, etc.).
    pub modifiers: u8,
}

/// Key action type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

/// Modifier key flags.
pub mod key_modifiers {
    pub const NONE: u8 = 0x00;
    pub const SHIFT: u8 = 0x01;
    pub const CTRL: u8 = 0x02;
    pub const ALT: u8 = 0x04;
    pub const META: u8 = 0x08;
}

impl KeyEvent {
    /// Create a key press event.
    pub fn press(virtual_key: u16, scan_code: u16, modifiers: u8) -> Self {
        Self {
            virtual_key,
            scan_code,
            action: KeyAction::Press,
            modifiers,
        }
    }

    /// Create a key release event.
    pub fn release(virtual_key: u16, scan_code: u16, modifiers: u8) -> Self {
        Self {
            virtual_key,
            scan_code,
            action: KeyAction::Release,
            modifiers,
        }
    }

    /// Check if a modifier is set.
    pub fn has_modifier(&self, modifier: u8) -> bool {
        self.modifiers & modifier != 0
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FarviewError> {
        bincode::serialize(self).map_err(|e| FarviewError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FarviewError> {
        bincode::deserialize(bytes).map_err(|e| FarviewError::Encoding(e.to_string()))
    }
}

// ── Synthetic controller state ────────────────────────────────────

/// Controller button bits for [`ControllerState::buttons`].
pub mod buttons {
    pub const CROSS: u32 = 1 << 0;
    pub const CIRCLE: u32 = 1 << 1;
    pub const SQUARE: u32 = 1 << 2;
    pub const TRIANGLE: u32 = 1 << 3;
    pub const DPAD_UP: u32 = 1 << 4;
    pub const DPAD_DOWN: u32 = 1 << 5;
    pub const DPAD_LEFT: u32 = 1 << 6;
    pub const DPAD_RIGHT: u32 = 1 << 7;
    pub const L1: u32 = 1 << 8;
    pub const R1: u32 = 1 << 9;
    pub const L3: u32 = 1 << 10;
    pub const R3: u32 = 1 << 11;
    pub const OPTIONS: u32 = 1 << 12;
    pub const SHARE: u32 = 1 << 13;
    pub const TOUCHPAD: u32 = 1 << 14;
    pub const HOME: u32 = 1 << 15;
}

/// One synthetic controller snapshot, as produced by the event-bridge
/// peer and injected into the session as if it were local input.
///
/// ## Wire format (14 bytes, little-endian)
///
/// ```text
/// buttons:  u32  (4)
/// l2:       u8   (1)
/// r2:       u8   (1)
/// left_x:   i16  (2)
/// left_y:   i16  (2)
/// right_x:  i16  (2)
/// right_y:  i16  (2)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    /// Pressed-button bitmask (see [`buttons`]).
    pub buttons: u32,
    /// Left trigger, 0..=255.
    pub l2: u8,
    /// Right trigger, 0..=255.
    pub r2: u8,
    /// Left stick X, full i16 range.
    pub left_x: i16,
    /// Left stick Y.
    pub left_y: i16,
    /// Right stick X.
    pub right_x: i16,
    /// Right stick Y.
    pub right_y: i16,
}

impl ControllerState {
    /// Encoded size on the wire.
    pub const SIZE: usize = 14;

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.buttons.to_le_bytes());
        buf[4] = self.l2;
        buf[5] = self.r2;
        buf[6..8].copy_from_slice(&self.left_x.to_le_bytes());
        buf[8..10].copy_from_slice(&self.left_y.to_le_bytes());
        buf[10..12].copy_from_slice(&self.right_x.to_le_bytes());
        buf[12..14].copy_from_slice(&self.right_y.to_le_bytes());
        buf
    }

    /// Deserialize from bytes.
    ///
    /// The record is a fixed-size contract: anything but exactly
    /// [`SIZE`](Self::SIZE) bytes is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, FarviewError> {
        if data.len() != Self::SIZE {
            return Err(FarviewError::InvalidRecordLength {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Ok(Self {
            buttons: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            l2: data[4],
            r2: data[5],
            left_x: i16::from_le_bytes(data[6..8].try_into().unwrap()),
            left_y: i16::from_le_bytes(data[8..10].try_into().unwrap()),
            right_x: i16::from_le_bytes(data[10..12].try_into().unwrap()),
            right_y: i16::from_le_bytes(data[12..14].try_into().unwrap()),
        })
    }

    /// Whether a button bit is set.
    pub fn is_pressed(&self, button: u32) -> bool {
        self.buttons & button != 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_event_roundtrip() {
        let events = vec![
            MouseEvent::move_to(100, 200),
            MouseEvent::press(100, 200, MouseButton::Left),
            MouseEvent::release(100, 200, MouseButton::Left),
            MouseEvent::scroll(100, 200, -120),
        ];

        for event in events {
            let bytes = event.to_bytes().unwrap();
            let decoded = MouseEvent::from_bytes(&bytes).unwrap();
            assert_eq!(event, decoded);
        }
    }

    #[test]
    fn key_event_roundtrip() {
        let event = KeyEvent::press(0x41, 0x1E, key_modifiers::SHIFT | key_modifiers::CTRL);
        let bytes = event.to_bytes().unwrap();
        let decoded = KeyEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, decoded);
        assert!(decoded.has_modifier(key_modifiers::SHIFT));
        assert!(decoded.has_modifier(key_modifiers::CTRL));
        assert!(!decoded.has_modifier(key_modifiers::ALT));
    }

    #[test]
    fn controller_state_roundtrip() {
        let state = ControllerState {
            buttons: buttons::CROSS | buttons::DPAD_LEFT,
            l2: 0x40,
            r2: 0xFF,
            left_x: -32768,
            left_y: 32767,
            right_x: -1,
            right_y: 12345,
        };

        let encoded = state.encode();
        assert_eq!(encoded.len(), ControllerState::SIZE);

        let decoded = ControllerState::decode(&encoded).unwrap();
        assert_eq!(state, decoded);
        assert!(decoded.is_pressed(buttons::CROSS));
        assert!(decoded.is_pressed(buttons::DPAD_LEFT));
        assert!(!decoded.is_pressed(buttons::TRIANGLE));
    }

    #[test]
    fn controller_state_layout() {
        let state = ControllerState {
            buttons: 0x0403_0201,
            l2: 0xAA,
            r2: 0xBB,
            left_x: 0x0102,
            left_y: 0x0304,
            right_x: 0x0506,
            right_y: 0x0708,
        };

        let buf = state.encode();
        // Little-endian field placement.
        assert_eq!(&buf[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buf[4], 0xAA);
        assert_eq!(buf[5], 0xBB);
        assert_eq!(&buf[6..8], &[0x02, 0x01]);
        assert_eq!(&buf[12..14], &[0x08, 0x07]);
    }

    #[test]
    fn controller_state_wrong_length() {
        let short = [0u8; 9];
        let err = ControllerState::decode(&short).unwrap_err();
        assert!(matches!(
            err,
            FarviewError::InvalidRecordLength {
                expected: 14,
                actual: 9
            }
        ));

        let long = [0u8; 20];
        assert!(ControllerState::decode(&long).is_err());
    }
}
