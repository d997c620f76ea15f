// SPDX-License-Identifier: CEPL-1.0
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use tracing::{debug, warn};

use crate::device::DeviceContext;

/// How a resource's memory will be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageHint {
    /// Device-local, never touched by the host.
    GpuOnly,
    /// Host-visible and persistently mapped; the host writes, the GPU reads.
    HostSequentialWrite,
    /// Device-local with its own memory block (render targets).
    Dedicated,
}

impl UsageHint {
    fn location(self) -> MemoryLocation {
        match self {
            UsageHint::GpuOnly | UsageHint::Dedicated => MemoryLocation::GpuOnly,
            UsageHint::HostSequentialWrite => MemoryLocation::CpuToGpu,
        }
    }
}

pub struct MemoryAllocator {
    allocator: Mutex<Allocator>,
    pub(crate) device: Arc<DeviceContext>,
}

impl MemoryAllocator {
    pub fn new(device: Arc<DeviceContext>) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: device.instance.instance.clone(),
            device: device.device.clone(),
            physical_device: device.phys,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("create gpu allocator")?;
        debug!("gpu memory allocator initialized");
        Ok(Self {
            allocator: Mutex::new(allocator),
            device,
        })
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        hint: UsageHint,
        linear: bool,
        allocation_scheme: AllocationScheme,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| anyhow!("allocator mutex poisoned"))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: hint.location(),
                linear,
                allocation_scheme,
            })
            .with_context(|| format!("allocate {name} ({} bytes)", requirements.size))
    }

    fn free(&self, allocation: Allocation) {
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    warn!("free allocation: {e}");
                }
            }
            Err(_) => warn!("allocator mutex poisoned, leaking allocation"),
        }
    }

    pub fn create_buffer(
        self: &Arc<Self>,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        hint: UsageHint,
    ) -> Result<GpuBuffer> {
        let d = &self.device.device;
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buffer = d.create_buffer(&bci, None)?;
            let requirements = d.get_buffer_memory_requirements(buffer);
            let scheme = match hint {
                UsageHint::Dedicated => AllocationScheme::DedicatedBuffer(buffer),
                _ => AllocationScheme::GpuAllocatorManaged,
            };
            let allocation = match self.allocate(name, requirements, hint, true, scheme) {
                Ok(a) => a,
                Err(e) => {
                    d.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };
            if let Err(e) = d.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                d.destroy_buffer(buffer, None);
                self.free(allocation);
                return Err(e).context("bind_buffer_memory");
            }
            debug!("buffer {name}: {size} bytes, {hint:?}");
            Ok(GpuBuffer {
                handle: buffer,
                size,
                allocation: Some(allocation),
                allocator: Arc::clone(self),
            })
        }
    }

    pub fn create_image(
        self: &Arc<Self>,
        name: &str,
        info: &vk::ImageCreateInfo,
        hint: UsageHint,
    ) -> Result<GpuImage> {
        let d = &self.device.device;
        unsafe {
            let image = d.create_image(info, None)?;
            let requirements = d.get_image_memory_requirements(image);
            let scheme = match hint {
                UsageHint::Dedicated => AllocationScheme::DedicatedImage(image),
                _ => AllocationScheme::GpuAllocatorManaged,
            };
            let linear = info.tiling == vk::ImageTiling::LINEAR;
            let allocation = match self.allocate(name, requirements, hint, linear, scheme) {
                Ok(a) => a,
                Err(e) => {
                    d.destroy_image(image, None);
                    return Err(e);
                }
            };
            if let Err(e) = d.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                d.destroy_image(image, None);
                self.free(allocation);
                return Err(e).context("bind_image_memory");
            }
            debug!(
                "image {name}: {}x{} {:?}, {hint:?}",
                info.extent.width, info.extent.height, info.format
            );
            Ok(GpuImage {
                handle: image,
                format: info.format,
                allocation: Some(allocation),
                allocator: Arc::clone(self),
            })
        }
    }
}

/// Buffer plus its memory. Freed together on drop.
pub struct GpuBuffer {
    pub(crate) handle: vk::Buffer,
    size: vk::DeviceSize,
    allocation: Option<Allocation>,
    allocator: Arc<MemoryAllocator>,
}

impl GpuBuffer {
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Copies `bytes` into host-visible memory at `offset`. The mapping is
    /// persistent, so nothing is mapped or unmapped here.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or_else(|| anyhow!("buffer is not host visible"))?;
        let end = offset + bytes.len();
        if end > mapped.len() {
            return Err(anyhow!(
                "write of {} bytes at {offset} overruns {} byte mapping",
                bytes.len(),
                mapped.len()
            ));
        }
        mapped[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator
                .device
                .device
                .destroy_buffer(self.handle, None)
        };
        if let Some(a) = self.allocation.take() {
            self.allocator.free(a);
        }
    }
}

/// Image plus its memory. Views are owned by whoever creates them.
pub struct GpuImage {
    pub(crate) handle: vk::Image,
    pub(crate) format: vk::Format,
    allocation: Option<Allocation>,
    allocator: Arc<MemoryAllocator>,
}

impl GpuImage {
    pub(crate) fn device(&self) -> &ash::Device {
        &self.allocator.device.device
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.allocator
                .device
                .device
                .destroy_image(self.handle, None)
        };
        if let Some(a) = self.allocation.take() {
            self.allocator.free(a);
        }
    }
}
