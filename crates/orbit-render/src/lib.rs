// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic frame lifecycle: frames in flight, per-image present
//! signals, the surface recreation state machine and the per-frame
//! wait/acquire/record/submit/present sequence.
//!
//! A GPU backend plugs in through [`FrameDevice`]; [`FrameLoop`] owns the
//! backend and drives it.
mod device;
mod error;
mod frame_loop;
mod slot;
mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use device::{Acquire, FrameDevice, FrameUniforms, Present, SurfaceInfo};
pub use error::{FrameError, FrameStage};
pub use frame_loop::{FrameLoop, FrameOutcome, SkipReason};
pub use slot::{FrameCursor, FrameRing, FrameSlot, ImageIndex, ImageSignals};
pub use surface::SurfaceState;

/// Number of frames the host may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be presented.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
