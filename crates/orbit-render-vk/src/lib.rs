// SPDX-License-Identifier: CEPL-1.0
//! Vulkan 1.3 backend for `orbit-render`: dynamic rendering, synchronization2,
//! `gpu-allocator` memory and a single textured-mesh pipeline.
mod descriptors;
mod device;
mod frame;
mod instance;
mod memory;
mod mesh;
mod pipeline;
mod renderer;
mod swapchain;
mod sync;
mod targets;
mod texture;

pub use device::DeviceContext;
pub use frame::{VkFrame, VkImageSignal};
pub use instance::{InstanceContext, Surface};
pub use memory::{GpuBuffer, GpuImage, MemoryAllocator, UsageHint};
pub use renderer::{VkConfig, VkFrameDevice};
pub use swapchain::Swapchain;
