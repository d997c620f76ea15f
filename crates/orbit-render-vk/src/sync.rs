// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;

use crate::device::DeviceContext;

pub struct Fence {
    pub(crate) handle: vk::Fence,
    device: Arc<DeviceContext>,
}

impl Fence {
    pub fn new(device: Arc<DeviceContext>, signaled: bool) -> Result<Self> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        let handle = unsafe { device.device.create_fence(&ci, None)? };
        Ok(Self { handle, device })
    }

    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.handle], true, u64::MAX)
        }
        .context("wait_for_fences")
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.handle]) }.context("reset_fences")
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_fence(self.handle, None) };
    }
}

pub struct Semaphore {
    pub(crate) handle: vk::Semaphore,
    device: Arc<DeviceContext>,
}

impl Semaphore {
    pub fn new(device: Arc<DeviceContext>) -> Result<Self> {
        let ci = vk::SemaphoreCreateInfo::default();
        let handle = unsafe { device.device.create_semaphore(&ci, None)? };
        Ok(Self { handle, device })
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_semaphore(self.handle, None) };
    }
}

pub struct CommandPool {
    pub(crate) handle: vk::CommandPool,
    device: Arc<DeviceContext>,
}

impl CommandPool {
    /// Pool whose buffers can be reset one at a time.
    pub fn new(device: Arc<DeviceContext>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: device.queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let handle = unsafe { device.device.create_command_pool(&pool_info, None)? };
        Ok(Self { handle, device })
    }

    pub fn allocate(&self) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.handle,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bufs = unsafe { self.device.device.allocate_command_buffers(&alloc_info)? };
        Ok(bufs[0])
    }

    /// Records `record` into a throwaway command buffer, submits it with its
    /// own fence, and blocks until the GPU is done.
    pub fn one_shot(&self, record: impl FnOnce(vk::CommandBuffer)) -> Result<()> {
        let d = &self.device.device;
        let cmd = self.allocate()?;
        let fence = Fence::new(Arc::clone(&self.device), false)?;
        let result = unsafe {
            (|| -> Result<()> {
                let bi = vk::CommandBufferBeginInfo {
                    s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                    flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                    ..Default::default()
                };
                d.begin_command_buffer(cmd, &bi)?;
                record(cmd);
                d.end_command_buffer(cmd)?;

                let si = vk::SubmitInfo {
                    s_type: vk::StructureType::SUBMIT_INFO,
                    command_buffer_count: 1,
                    p_command_buffers: &cmd,
                    ..Default::default()
                };
                d.queue_submit(self.device.queue, std::slice::from_ref(&si), fence.handle)
                    .context("queue_submit(one-shot)")?;
                fence.wait()
            })()
        };
        unsafe { d.free_command_buffers(self.handle, std::slice::from_ref(&cmd)) };
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_command_pool(self.handle, None) };
    }
}
