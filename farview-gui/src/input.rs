//! Local input capture → session event conversion.
//!
//! Translates [`WindowEvent`]s into protocol [`MouseEvent`] /
//! [`KeyEvent`] values that the session writer can serialise, scaling
//! pointer coordinates from window space into the remote display.

use farview_core::protocol::{KeyEvent, MouseButton, MouseEvent};

use crate::window::{MouseBtn, WindowEvent};

/// Tagged union of input actions to inject into the session.
pub enum InputAction {
    Mouse(MouseEvent),
    Key(KeyEvent),
}

/// Convert a window event to a session input event (if applicable).
pub fn translate_event(
    event: &WindowEvent,
    window_width: u32,
    window_height: u32,
    remote_width: u32,
    remote_height: u32,
) -> Option<InputAction> {
    match event {
        WindowEvent::MouseMove(x, y) => {
            // Scale from window coordinates to remote coordinates.
            let rx = (*x as f64 / window_width.max(1) as f64 * remote_width as f64) as i32;
            let ry = (*y as f64 / window_height.max(1) as f64 * remote_height as f64) as i32;
            Some(InputAction::Mouse(MouseEvent::move_to(rx, ry)))
        }
        WindowEvent::MouseButton(btn, pressed) => {
            let button = match btn {
                MouseBtn::Left => MouseButton::Left,
                MouseBtn::Right => MouseButton::Right,
                MouseBtn::Middle => MouseButton::Middle,
            };
            let event = if *pressed {
                MouseEvent::press(0, 0, button)
            } else {
                MouseEvent::release(0, 0, button)
            };
            Some(InputAction::Mouse(event))
        }
        WindowEvent::MouseWheel(delta) => {
            Some(InputAction::Mouse(MouseEvent::scroll(0, 0, *delta)))
        }
        WindowEvent::Key(vk, scan, pressed) => {
            let event = if *pressed {
                KeyEvent::press(*vk, *scan, 0)
            } else {
                KeyEvent::release(*vk, *scan, 0)
            };
            Some(InputAction::Key(event))
        }
        WindowEvent::CloseRequested
        | WindowEvent::Resized(..)
        | WindowEvent::Moved(..)
        | WindowEvent::FocusChanged(_)
        | WindowEvent::ToggleFullscreen => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use farview_core::protocol::{KeyAction, MouseEventKind};

    #[test]
    fn mouse_move_scales_to_remote() {
        // Window 800x600 → remote 1920x1080; centre maps to centre.
        let action = translate_event(&WindowEvent::MouseMove(400, 300), 800, 600, 1920, 1080);
        match action {
            Some(InputAction::Mouse(e)) => {
                assert_eq!(e.kind, MouseEventKind::Move);
                assert_eq!(e.x, 960);
                assert_eq!(e.y, 540);
            }
            _ => panic!("expected mouse action"),
        }
    }

    #[test]
    fn zero_window_size_does_not_divide_by_zero() {
        let action = translate_event(&WindowEvent::MouseMove(10, 10), 0, 0, 100, 100);
        assert!(matches!(action, Some(InputAction::Mouse(_))));
    }

    #[test]
    fn buttons_and_keys_map_through() {
        let action = translate_event(
            &WindowEvent::MouseButton(MouseBtn::Right, true),
            100,
            100,
            100,
            100,
        );
        match action {
            Some(InputAction::Mouse(e)) => {
                assert_eq!(e.kind, MouseEventKind::Press);
                assert_eq!(e.button, MouseButton::Right);
            }
            _ => panic!("expected mouse action"),
        }

        let action = translate_event(&WindowEvent::Key(0x41, 0x1E, false), 100, 100, 100, 100);
        match action {
            Some(InputAction::Key(e)) => {
                assert_eq!(e.action, KeyAction::Release);
                assert_eq!(e.virtual_key, 0x41);
            }
            _ => panic!("expected key action"),
        }
    }

    #[test]
    fn lifecycle_events_produce_no_input() {
        for ev in [
            WindowEvent::CloseRequested,
            WindowEvent::Resized(640, 480),
            WindowEvent::Moved(10, 10),
            WindowEvent::FocusChanged(true),
            WindowEvent::ToggleFullscreen,
        ] {
            assert!(translate_event(&ev, 100, 100, 100, 100).is_none());
        }
    }
}
