// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{ensure, Result};
use ash::vk;
use orbit_assets::MeshData;
use tracing::debug;

use crate::memory::{GpuBuffer, MemoryAllocator, UsageHint};

/// Vertices followed by `u16` indices in one host-written buffer.
pub struct MeshBuffer {
    pub(crate) buffer: GpuBuffer,
    pub(crate) index_offset: vk::DeviceSize,
    pub(crate) index_count: u32,
}

impl MeshBuffer {
    pub fn new(allocator: &Arc<MemoryAllocator>, mesh: &MeshData) -> Result<Self> {
        let vertices = mesh.vertex_bytes();
        let indices = mesh.index_bytes();
        ensure!(!vertices.is_empty() && !indices.is_empty(), "mesh has no geometry");

        let size = (vertices.len() + indices.len()) as vk::DeviceSize;
        let mut buffer = allocator.create_buffer(
            "mesh",
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER,
            UsageHint::HostSequentialWrite,
        )?;
        buffer.write(0, vertices)?;
        buffer.write(vertices.len(), indices)?;

        debug!(
            "mesh buffer: {} vertices, {} indices, {size} bytes",
            mesh.vertices.len(),
            mesh.index_count()
        );
        Ok(Self {
            buffer,
            index_offset: vertices.len() as vk::DeviceSize,
            index_count: mesh.index_count(),
        })
    }

    pub(crate) unsafe fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.buffer.handle], &[0]);
        device.cmd_bind_index_buffer(cmd, self.buffer.handle, self.index_offset, vk::IndexType::UINT16);
    }
}
