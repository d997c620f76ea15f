// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use tracing::debug;

use crate::memory::{GpuImage, MemoryAllocator, UsageHint};
use crate::swapchain::create_view;

/// An image with a single full-range view.
pub struct ViewedImage {
    pub(crate) view: vk::ImageView,
    pub(crate) image: GpuImage,
    pub(crate) range: vk::ImageSubresourceRange,
}

impl ViewedImage {
    pub(crate) fn new(
        image: GpuImage,
        aspect_mask: vk::ImageAspectFlags,
        level_count: u32,
    ) -> Result<Self> {
        let range = vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        };
        let view = unsafe { create_view(image.device(), image.handle, image.format, range)? };
        Ok(Self { view, image, range })
    }
}

impl Drop for ViewedImage {
    fn drop(&mut self) {
        unsafe { self.image.device().destroy_image_view(self.view, None) };
    }
}

pub(crate) fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

fn attachment_info(
    format: vk::Format,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    usage: vk::ImageUsageFlags,
) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples,
        tiling: vk::ImageTiling::OPTIMAL,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    }
}

/// Multisampled color and depth attachments sized to the swapchain. Both are
/// thrown away and rebuilt whenever the extent changes.
pub struct RenderTargets {
    pub(crate) color: ViewedImage,
    pub(crate) depth: ViewedImage,
    pub(crate) samples: vk::SampleCountFlags,
    pub(crate) depth_format: vk::Format,
}

impl RenderTargets {
    pub fn new(
        allocator: &Arc<MemoryAllocator>,
        color_format: vk::Format,
        depth_format: vk::Format,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let color = allocator.create_image(
            "msaa color",
            &attachment_info(
                color_format,
                extent,
                samples,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            ),
            UsageHint::Dedicated,
        )?;
        let depth = allocator.create_image(
            "depth",
            &attachment_info(
                depth_format,
                extent,
                samples,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ),
            UsageHint::Dedicated,
        )?;
        debug!(
            "render targets: {}x{} samples={:?} depth={depth_format:?}",
            extent.width, extent.height, samples
        );
        Ok(Self {
            color: ViewedImage::new(color, vk::ImageAspectFlags::COLOR, 1)?,
            depth: ViewedImage::new(depth, depth_aspect(depth_format), 1)?,
            samples,
            depth_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_formats_carry_both_aspects() {
        assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            depth_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
