// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use orbit_render::MAX_FRAMES_IN_FLIGHT;

use crate::device::DeviceContext;
use crate::memory::GpuBuffer;
use crate::texture::Texture;

/// Set 0: per-frame uniform buffer (vertex). Set 1: texture (fragment).
pub struct Descriptors {
    pool: vk::DescriptorPool,
    pub(crate) frame_layout: vk::DescriptorSetLayout,
    pub(crate) texture_layout: vk::DescriptorSetLayout,
    device: Arc<DeviceContext>,
}

unsafe fn single_binding_layout(
    device: &ash::Device,
    descriptor_type: vk::DescriptorType,
    stage_flags: vk::ShaderStageFlags,
) -> Result<vk::DescriptorSetLayout> {
    let binding = vk::DescriptorSetLayoutBinding {
        binding: 0,
        descriptor_type,
        descriptor_count: 1,
        stage_flags,
        ..Default::default()
    };
    let ci = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: 1,
        p_bindings: &binding,
        ..Default::default()
    };
    device
        .create_descriptor_set_layout(&ci, None)
        .context("create_descriptor_set_layout")
}

impl Descriptors {
    pub fn new(device: Arc<DeviceContext>) -> Result<Self> {
        let d = &device.device;
        unsafe {
            let frame_layout = single_binding_layout(
                d,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
            )?;
            let texture_layout = match single_binding_layout(
                d,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            ) {
                Ok(l) => l,
                Err(e) => {
                    d.destroy_descriptor_set_layout(frame_layout, None);
                    return Err(e);
                }
            };

            let sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: MAX_FRAMES_IN_FLIGHT as u32,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 1,
                },
            ];
            let pool_ci = vk::DescriptorPoolCreateInfo {
                s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
                max_sets: MAX_FRAMES_IN_FLIGHT as u32 + 1,
                pool_size_count: sizes.len() as u32,
                p_pool_sizes: sizes.as_ptr(),
                ..Default::default()
            };
            let pool = match d.create_descriptor_pool(&pool_ci, None) {
                Ok(p) => p,
                Err(e) => {
                    d.destroy_descriptor_set_layout(texture_layout, None);
                    d.destroy_descriptor_set_layout(frame_layout, None);
                    return Err(e).context("create_descriptor_pool");
                }
            };

            Ok(Self {
                pool,
                frame_layout,
                texture_layout,
                device,
            })
        }
    }

    fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let ai = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: 1,
            p_set_layouts: &layout,
            ..Default::default()
        };
        let sets = unsafe { self.device.device.allocate_descriptor_sets(&ai) }
            .context("allocate_descriptor_sets")?;
        Ok(sets[0])
    }

    /// Set 0 for one frame slot, pointing at its uniform buffer.
    pub fn frame_set(&self, uniforms: &GpuBuffer) -> Result<vk::DescriptorSet> {
        let set = self.allocate(self.frame_layout)?;
        let info = vk::DescriptorBufferInfo {
            buffer: uniforms.handle,
            offset: 0,
            range: uniforms.size(),
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            p_buffer_info: &info,
            ..Default::default()
        };
        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    pub fn texture_set(&self, texture: &Texture) -> Result<vk::DescriptorSet> {
        let set = self.allocate(self.texture_layout)?;
        let info = vk::DescriptorImageInfo {
            sampler: texture.sampler,
            image_view: texture.image.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            p_image_info: &info,
            ..Default::default()
        };
        unsafe { self.device.device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }
}

impl Drop for Descriptors {
    fn drop(&mut self) {
        // Sets are freed with the pool.
        unsafe {
            let d = &self.device.device;
            d.destroy_descriptor_pool(self.pool, None);
            d.destroy_descriptor_set_layout(self.texture_layout, None);
            d.destroy_descriptor_set_layout(self.frame_layout, None);
        }
    }
}
