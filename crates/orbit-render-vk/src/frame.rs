// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::memory::GpuBuffer;
use crate::sync::{Fence, Semaphore};

/// Everything one frame slot records and submits with. The command buffer and
/// descriptor set belong to pools owned by the device and are freed with them.
pub struct VkFrame {
    pub(crate) cmd: vk::CommandBuffer,
    pub(crate) set: vk::DescriptorSet,
    pub(crate) uniforms: GpuBuffer,
    pub(crate) acquired: Semaphore,
    pub(crate) fence: Fence,
}

/// Render-complete signal owned by one swapchain image.
pub type VkImageSignal = Semaphore;
