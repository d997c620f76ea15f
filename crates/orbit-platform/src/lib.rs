// SPDX-License-Identifier: CEPL-1.0
//! Window/input side of the viewer: a small event vocabulary decoupled from
//! winit, a FIFO to buffer it between frames, and the pointer state that
//! turns raw cursor positions into drag motion.
pub use winit;

mod event;
mod input;

pub use event::{translate, EventQueue, InputEvent};
pub use input::{InputAction, InputState, MouseButtons};
