// SPDX-License-Identifier: CEPL-1.0
use std::collections::VecDeque;

use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::MouseButtons;

/// Pixel-precise wheels (touchpads) report distances; this many pixels count
/// as one wheel notch.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    CloseRequested,
    Resized { width: u32, height: u32 },
    /// Absolute cursor position in physical pixels.
    CursorMoved { x: f32, y: f32 },
    Button { button: MouseButtons, pressed: bool },
    /// Vertical wheel movement in notches; positive is away from the user.
    Wheel { delta: f32 },
}

/// Maps the window events the viewer cares about; everything else is `None`.
pub fn translate(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::CloseRequested => Some(InputEvent::CloseRequested),
        WindowEvent::Resized(size) => Some(InputEvent::Resized {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved {
            x: position.x as f32,
            y: position.y as f32,
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            button_flag(*button).map(|button| InputEvent::Button {
                button,
                pressed: *state == ElementState::Pressed,
            })
        }
        WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Wheel {
            delta: wheel_notches(*delta),
        }),
        _ => None,
    }
}

fn button_flag(button: MouseButton) -> Option<MouseButtons> {
    match button {
        MouseButton::Left => Some(MouseButtons::LEFT),
        MouseButton::Right => Some(MouseButtons::RIGHT),
        MouseButton::Middle => Some(MouseButtons::MIDDLE),
        _ => None,
    }
}

fn wheel_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
    }
}

/// Events gathered by the window callbacks, drained once per frame.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<InputEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Pending events, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalPosition, PhysicalSize};

    #[test]
    fn translates_window_lifecycle() {
        assert_eq!(
            translate(&WindowEvent::CloseRequested),
            Some(InputEvent::CloseRequested)
        );
        assert_eq!(
            translate(&WindowEvent::Resized(PhysicalSize::new(1280, 720))),
            Some(InputEvent::Resized {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(translate(&WindowEvent::Focused(true)), None);
    }

    #[test]
    fn wheel_lines_and_pixels() {
        assert_eq!(wheel_notches(MouseScrollDelta::LineDelta(0.0, 1.0)), 1.0);
        assert_eq!(
            wheel_notches(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -80.0))),
            -2.0
        );
    }

    #[test]
    fn only_three_buttons_are_tracked() {
        assert_eq!(button_flag(MouseButton::Left), Some(MouseButtons::LEFT));
        assert_eq!(button_flag(MouseButton::Middle), Some(MouseButtons::MIDDLE));
        assert_eq!(button_flag(MouseButton::Back), None);
    }

    #[test]
    fn queue_drains_in_arrival_order() {
        let mut q = EventQueue::new();
        q.push(InputEvent::Wheel { delta: 1.0 });
        q.push(InputEvent::CloseRequested);
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(
            drained,
            [InputEvent::Wheel { delta: 1.0 }, InputEvent::CloseRequested]
        );
        assert!(q.is_empty());
    }
}
