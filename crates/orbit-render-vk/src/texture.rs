// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use orbit_assets::{TextureData, TextureFormat};
use tracing::debug;

use crate::memory::{MemoryAllocator, UsageHint};
use crate::sync::CommandPool;
use crate::targets::ViewedImage;

const MAX_ANISOTROPY: f32 = 8.0;

pub(crate) fn vk_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
    }
}

/// One buffer-to-image copy per mip level, reading from the packed pixels.
pub(crate) fn copy_regions(data: &TextureData) -> Vec<vk::BufferImageCopy> {
    data.levels
        .iter()
        .enumerate()
        .map(|(level, l)| vk::BufferImageCopy {
            buffer_offset: l.offset as vk::DeviceSize,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level as u32,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: l.width,
                height: l.height,
                depth: 1,
            },
        })
        .collect()
}

/// Sampled image plus its sampler. Immutable after upload.
pub struct Texture {
    pub(crate) sampler: vk::Sampler,
    pub(crate) image: ViewedImage,
}

impl Texture {
    /// Uploads every mip level through a staging buffer and blocks until the
    /// copy has finished. The staging buffer is gone when this returns.
    pub fn upload(
        allocator: &Arc<MemoryAllocator>,
        pool: &CommandPool,
        data: &TextureData,
    ) -> Result<Self> {
        let device = &allocator.device;
        let format = vk_format(data.format);
        let mip_levels = data.mip_levels();

        let mut staging = allocator.create_buffer(
            "texture staging",
            data.pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            UsageHint::HostSequentialWrite,
        )?;
        staging.write(0, &data.pixels)?;

        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: data.width(),
                height: data.height(),
                depth: 1,
            },
            mip_levels,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = allocator.create_image("texture", &info, UsageHint::GpuOnly)?;
        let image = ViewedImage::new(image, vk::ImageAspectFlags::COLOR, mip_levels)?;

        let regions = copy_regions(data);
        let d = &device.device;
        pool.one_shot(|cmd| unsafe {
            let to_dst = vk::ImageMemoryBarrier2 {
                s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
                src_stage_mask: vk::PipelineStageFlags2::TOP_OF_PIPE,
                src_access_mask: vk::AccessFlags2::empty(),
                dst_stage_mask: vk::PipelineStageFlags2::COPY,
                dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                image: image.image.handle,
                subresource_range: image.range,
                ..Default::default()
            };
            let dep = vk::DependencyInfo {
                s_type: vk::StructureType::DEPENDENCY_INFO,
                image_memory_barrier_count: 1,
                p_image_memory_barriers: &to_dst,
                ..Default::default()
            };
            d.cmd_pipeline_barrier2(cmd, &dep);

            d.cmd_copy_buffer_to_image(
                cmd,
                staging.handle,
                image.image.handle,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            let to_read = vk::ImageMemoryBarrier2 {
                s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
                src_stage_mask: vk::PipelineStageFlags2::COPY,
                src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
                dst_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
                dst_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
                old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                image: image.image.handle,
                subresource_range: image.range,
                ..Default::default()
            };
            let dep = vk::DependencyInfo {
                s_type: vk::StructureType::DEPENDENCY_INFO,
                image_memory_barrier_count: 1,
                p_image_memory_barriers: &to_read,
                ..Default::default()
            };
            d.cmd_pipeline_barrier2(cmd, &dep);
        })
        .context("texture upload")?;
        drop(staging);

        let anisotropy = device.anisotropy;
        let sampler_info = vk::SamplerCreateInfo {
            s_type: vk::StructureType::SAMPLER_CREATE_INFO,
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            anisotropy_enable: if anisotropy { vk::TRUE } else { vk::FALSE },
            max_anisotropy: if anisotropy {
                MAX_ANISOTROPY.min(device.limits.max_sampler_anisotropy)
            } else {
                1.0
            },
            min_lod: 0.0,
            max_lod: mip_levels as f32,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
            ..Default::default()
        };
        let sampler = unsafe { d.create_sampler(&sampler_info, None)? };

        debug!(
            "texture uploaded: {}x{}, {mip_levels} mips, {format:?}",
            data.width(),
            data.height()
        );
        Ok(Self { sampler, image })
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.image.image.device().destroy_sampler(self.sampler, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_map_one_to_one() {
        assert_eq!(vk_format(TextureFormat::Rgba8Srgb), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(vk_format(TextureFormat::Rgba8Unorm), vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn one_region_per_mip() {
        let mut data = TextureData::checker(8, 2).unwrap();
        data.generate_mips();
        let regions = copy_regions(&data);
        assert_eq!(regions.len(), 4);
        assert_eq!(regions[0].buffer_offset, 0);
        assert_eq!(regions[1].buffer_offset, 8 * 8 * 4);
        assert_eq!(regions[3].image_subresource.mip_level, 3);
        assert_eq!(regions[3].image_extent.width, 1);
    }
}
