// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, info, trace, warn};

use crate::{
    Acquire, FrameCursor, FrameDevice, FrameError, FrameRing, FrameSlot, FrameStage,
    FrameUniforms, ImageIndex, ImageSignals, Present, RenderSize, SurfaceInfo, SurfaceState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: FrameSlot, image: ImageIndex },
    Skipped(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Acquire reported out-of-date; the surface is rebuilt before the next frame.
    OutOfDate,
    /// The window has no area.
    Paused,
}

/// Owns a [`FrameDevice`] and runs the per-frame protocol against it.
///
/// Dropping the loop idles the device first, then releases per-frame and
/// per-image objects, then the device itself.
pub struct FrameLoop<D: FrameDevice> {
    // Declaration order is drop order.
    frames: FrameRing<D::Frame>,
    image_signals: ImageSignals<D::ImageSignal>,
    surface: SurfaceInfo,
    state: SurfaceState,
    cursor: FrameCursor,
    presented: u64,
    recreations: u64,
    device: D,
}

impl<D: FrameDevice> FrameLoop<D> {
    pub fn new(mut device: D) -> Result<Self, FrameError> {
        let surface = device.surface();
        let frames = FrameRing::create(|slot| device.create_frame(slot))
            .map_err(FrameError::at(FrameStage::Setup))?;
        let image_signals =
            ImageSignals::create(surface.image_count, |image| device.create_image_signal(image))
                .map_err(FrameError::at(FrameStage::Setup))?;

        info!(
            "frame loop: {} frames in flight, {} images at {}",
            crate::MAX_FRAMES_IN_FLIGHT,
            surface.image_count,
            surface.extent
        );

        Ok(Self {
            frames,
            image_signals,
            surface,
            state: SurfaceState::Created,
            cursor: FrameCursor::default(),
            presented: 0,
            recreations: 0,
            device,
        })
    }

    #[cfg(test)]
    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Slot the next frame will use.
    pub fn frame_slot(&self) -> FrameSlot {
        self.cursor.current()
    }

    pub fn surface(&self) -> SurfaceInfo {
        self.surface
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    /// Records a window resize. Nothing is rebuilt until [`Self::ensure_surface`]
    /// or the next frame, so a burst of resizes costs one rebuild.
    pub fn notify_resized(&mut self, size: RenderSize) {
        debug!("resize to {size} queued");
        self.state.resized(size);
    }

    /// Rebuilds a stale surface: idle-wait, drop the image signals, recreate
    /// the swapchain and its targets, then one signal per new image.
    ///
    /// Returns `false` while the pending size has no area; the surface stays
    /// stale and frames are skipped.
    pub fn ensure_surface(&mut self) -> Result<bool, FrameError> {
        let SurfaceState::Stale { size } = self.state else {
            return Ok(true);
        };
        if size.is_empty() {
            return Ok(false);
        }

        // STRICT ORDER:
        // 1) device idle: no submission may still reference old images or signals
        // 2) release per-image signals of the old swapchain
        // 3) backend rebuilds swapchain (old one as hint), views, render targets
        // 4) new per-image signals sized to the new image count
        self.device
            .wait_idle()
            .map_err(FrameError::at(FrameStage::Idle))?;
        self.image_signals.clear();

        let surface = self
            .device
            .recreate_surface(size)
            .map_err(FrameError::at(FrameStage::Recreate))?;
        if surface.extent.is_empty() {
            // Minimized before its resize event arrived; wait for the next one.
            debug!("surface has no area (requested {size}), pausing");
            self.state = SurfaceState::Stale {
                size: surface.extent,
            };
            return Ok(false);
        }
        let device = &mut self.device;
        self.image_signals =
            ImageSignals::create(surface.image_count, |image| device.create_image_signal(image))
                .map_err(FrameError::at(FrameStage::Recreate))?;

        self.surface = surface;
        self.state = SurfaceState::Created;
        self.recreations += 1;
        info!(
            "surface recreated: {} images at {} (requested {size})",
            surface.image_count, surface.extent
        );
        Ok(true)
    }

    /// Runs one frame: wait, acquire, update, record, submit, present, advance.
    ///
    /// `update` computes the frame's uniforms from the current surface; it is
    /// only called once the slot is known to be free.
    pub fn render_frame<F>(&mut self, update: F) -> Result<FrameOutcome, FrameError>
    where
        F: FnOnce(SurfaceInfo) -> FrameUniforms,
    {
        if !self.ensure_surface()? {
            return Ok(FrameOutcome::Skipped(SkipReason::Paused));
        }

        let slot = self.cursor.current();

        // 1) Wait for this slot's previous submission to retire.
        self.device
            .wait(&self.frames[slot])
            .map_err(FrameError::at(FrameStage::Wait))?;

        // 2) Acquire. The fence stays signaled until an image is in hand, so an
        //    out-of-date surface can't leave the next wait blocked forever.
        let (image, suboptimal) = match self
            .device
            .acquire(&self.frames[slot])
            .map_err(FrameError::at(FrameStage::Acquire))?
        {
            Acquire::Image { index, suboptimal } => (index, suboptimal),
            Acquire::OutOfDate => {
                warn!("acquire: surface out of date, rebuilding");
                self.state.invalidate(self.surface.extent);
                return Ok(FrameOutcome::Skipped(SkipReason::OutOfDate));
            }
        };
        self.state.acquired();

        // Looked up before the reset so a bad index leaves the fence signaled.
        let Some(signal) = self.image_signals.get(image) else {
            return Err(FrameError::UnknownImage {
                image,
                count: self.image_signals.len(),
            });
        };
        self.device
            .reset(&self.frames[slot])
            .map_err(FrameError::at(FrameStage::Reset))?;

        // 3) Update
        let uniforms = update(self.surface);
        self.device
            .write_uniforms(&mut self.frames[slot], &uniforms)
            .map_err(FrameError::at(FrameStage::Update))?;

        // 4) Record
        self.device
            .record(&mut self.frames[slot], image)
            .map_err(FrameError::at(FrameStage::Record))?;

        // 5) Submit: wait acquired[slot], signal image_signals[image] + fence[slot]
        self.device
            .submit(&self.frames[slot], signal)
            .map_err(FrameError::at(FrameStage::Submit))?;

        // 6) Present, gated on the same per-image signal
        let presented = self
            .device
            .present(image, signal)
            .map_err(FrameError::at(FrameStage::Present))?;

        // 7) Advance
        self.cursor.advance();
        self.presented += 1;
        trace!("{slot} presented {image}");

        if suboptimal || presented != Present::Presented {
            warn!("surface suboptimal (present: {presented:?}), rebuilding");
            self.state.invalidate(self.surface.extent);
        }

        Ok(FrameOutcome::Presented { slot, image })
    }
}

impl<D: FrameDevice> Drop for FrameLoop<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("device idle-wait before teardown failed: {e:#}");
        }
        debug!(
            "frame loop teardown after {} frames, {} surface rebuilds",
            self.presented, self.recreations
        );
    }
}

#[cfg(test)]
mod tests;
