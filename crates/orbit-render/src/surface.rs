// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

/// Swapchain lifecycle as tracked by the frame loop.
///
/// `Created` -> `InUse` on the first successful acquire. Any state -> `Stale`
/// on a resize or an out-of-date/suboptimal report. `Stale` -> `Created` once
/// the surface has been rebuilt at `size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Created,
    InUse,
    Stale { size: RenderSize },
}

impl SurfaceState {
    pub fn is_stale(&self) -> bool {
        matches!(self, SurfaceState::Stale { .. })
    }

    pub(crate) fn acquired(&mut self) {
        if *self == SurfaceState::Created {
            *self = SurfaceState::InUse;
        }
    }

    /// A window resize always wins: several of them before the next frame
    /// collapse into a single rebuild at the last size.
    pub(crate) fn resized(&mut self, size: RenderSize) {
        *self = SurfaceState::Stale { size };
    }

    /// The presentation engine disagrees with the swapchain. A pending resize
    /// keeps its size; otherwise rebuild at `current`.
    pub(crate) fn invalidate(&mut self, current: RenderSize) {
        if !self.is_stale() {
            *self = SurfaceState::Stale { size: current };
        }
    }
}
