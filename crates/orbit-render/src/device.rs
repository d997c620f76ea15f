// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use bytemuck::{Pod, Zeroable};

use crate::{FrameSlot, ImageIndex, RenderSize};

/// Per-frame shader constants, laid out as the vertex shader's `set = 0` block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub mvp: [[f32; 4]; 4],
}

impl FrameUniforms {
    pub const IDENTITY: Self = Self {
        mvp: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };
}

/// Current presentation surface as seen by the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub extent: RenderSize,
    pub image_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// An image was handed out; `suboptimal` still allows rendering to it.
    Image { index: ImageIndex, suboptimal: bool },
    /// The surface no longer matches the swapchain; nothing was acquired.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Present {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// GPU backend driven by [`crate::FrameLoop`].
///
/// `Frame` is one slot's bundle (command buffer, completion fence, acquired
/// signal, mapped uniforms). `ImageSignal` is a render-complete signal owned
/// by one swapchain image. Both release their GPU objects on drop; the loop
/// only drops them after `wait_idle`.
///
/// Out-of-date and suboptimal surfaces are reported through [`Acquire`] and
/// [`Present`], never as errors.
pub trait FrameDevice {
    type Frame;
    type ImageSignal;

    /// Creates a slot bundle. The completion fence starts signaled.
    fn create_frame(&mut self, slot: FrameSlot) -> Result<Self::Frame>;
    fn create_image_signal(&mut self, image: ImageIndex) -> Result<Self::ImageSignal>;

    fn surface(&self) -> SurfaceInfo;

    /// Blocks until the slot's previous submission has retired.
    fn wait(&mut self, frame: &Self::Frame) -> Result<()>;
    /// Requests the next image; `frame`'s acquired signal fires when it is ready.
    fn acquire(&mut self, frame: &Self::Frame) -> Result<Acquire>;
    /// Re-arms the completion fence. Only called after a successful acquire.
    fn reset(&mut self, frame: &Self::Frame) -> Result<()>;
    fn write_uniforms(&mut self, frame: &mut Self::Frame, uniforms: &FrameUniforms) -> Result<()>;
    /// Records the whole frame from scratch into `frame`'s command buffer.
    fn record(&mut self, frame: &mut Self::Frame, image: ImageIndex) -> Result<()>;
    /// Waits on `frame`'s acquired signal, signals `signal` and `frame`'s fence.
    fn submit(&mut self, frame: &Self::Frame, signal: &Self::ImageSignal) -> Result<()>;
    fn present(&mut self, image: ImageIndex, signal: &Self::ImageSignal) -> Result<Present>;

    fn wait_idle(&mut self) -> Result<()>;
    /// Rebuilds the swapchain (using the old one as a hint) and every
    /// extent-dependent target. The device is idle when this is called.
    ///
    /// If the surface itself has no area (whatever `size` says), nothing is
    /// rebuilt and the returned extent is empty.
    fn recreate_surface(&mut self, size: RenderSize) -> Result<SurfaceInfo>;
}
