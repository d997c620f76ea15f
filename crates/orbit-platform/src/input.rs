// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use orbit_math::Vec2;

use crate::InputEvent;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// What a single input event asks the viewer to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputAction {
    None,
    /// Drag with the left button held; pointer motion in pixels.
    Orbit(Vec2),
    Zoom(f32),
    Resize { width: u32, height: u32 },
    Close,
}

/// Held buttons and the last cursor position.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    buttons: MouseButtons,
    cursor: Option<Vec2>,
}

impl InputState {
    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn apply(&mut self, event: &InputEvent) -> InputAction {
        match *event {
            InputEvent::CloseRequested => InputAction::Close,
            InputEvent::Resized { width, height } => InputAction::Resize { width, height },
            InputEvent::CursorMoved { x, y } => self
                .cursor_moved(Vec2::new(x, y))
                .map_or(InputAction::None, InputAction::Orbit),
            InputEvent::Button { button, pressed } => {
                self.buttons.set(button, pressed);
                InputAction::None
            }
            InputEvent::Wheel { delta } => InputAction::Zoom(delta),
        }
    }

    /// Tracks the cursor and returns its motion while the left button is held.
    /// The first position seen only primes the tracker.
    fn cursor_moved(&mut self, pos: Vec2) -> Option<Vec2> {
        let last = self.cursor.replace(pos)?;
        self.buttons
            .contains(MouseButtons::LEFT)
            .then(|| pos - last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(x: f32, y: f32) -> InputEvent {
        InputEvent::CursorMoved { x, y }
    }

    fn left(pressed: bool) -> InputEvent {
        InputEvent::Button {
            button: MouseButtons::LEFT,
            pressed,
        }
    }

    #[test]
    fn drag_reports_motion() {
        let mut input = InputState::default();
        input.apply(&moved(100.0, 100.0));
        input.apply(&left(true));
        assert_eq!(
            input.apply(&moved(110.0, 95.0)),
            InputAction::Orbit(Vec2::new(10.0, -5.0))
        );
    }

    #[test]
    fn hover_only_tracks_position() {
        let mut input = InputState::default();
        input.apply(&moved(10.0, 10.0));
        assert_eq!(input.apply(&moved(50.0, 60.0)), InputAction::None);
        assert_eq!(input.cursor(), Some(Vec2::new(50.0, 60.0)));

        // Pressing afterwards measures from the last hover position.
        input.apply(&left(true));
        assert_eq!(
            input.apply(&moved(52.0, 60.0)),
            InputAction::Orbit(Vec2::new(2.0, 0.0))
        );
    }

    #[test]
    fn first_position_never_rotates() {
        let mut input = InputState::default();
        input.apply(&left(true));
        assert_eq!(input.apply(&moved(400.0, 300.0)), InputAction::None);
    }

    #[test]
    fn release_stops_orbit() {
        let mut input = InputState::default();
        input.apply(&moved(0.0, 0.0));
        input.apply(&left(true));
        input.apply(&left(false));
        assert_eq!(input.apply(&moved(5.0, 5.0)), InputAction::None);
        assert!(input.buttons().is_empty());
    }

    #[test]
    fn right_button_does_not_orbit() {
        let mut input = InputState::default();
        input.apply(&moved(0.0, 0.0));
        input.apply(&InputEvent::Button {
            button: MouseButtons::RIGHT,
            pressed: true,
        });
        assert_eq!(input.apply(&moved(5.0, 5.0)), InputAction::None);
    }

    #[test]
    fn window_events_pass_through() {
        let mut input = InputState::default();
        assert_eq!(input.apply(&InputEvent::CloseRequested), InputAction::Close);
        assert_eq!(
            input.apply(&InputEvent::Wheel { delta: 1.0 }),
            InputAction::Zoom(1.0)
        );
        assert_eq!(
            input.apply(&InputEvent::Resized {
                width: 4,
                height: 3
            }),
            InputAction::Resize {
                width: 4,
                height: 3
            }
        );
    }
}
