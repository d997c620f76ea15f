// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use orbit_render::RenderSize;
use tracing::{debug, info};

use crate::device::DeviceContext;
use crate::instance::Surface;

pub(crate) fn pick_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB]
        .into_iter()
        .find_map(|want| formats.iter().copied().find(|f| f.format == want))
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// `None` when the surface currently has no area (a minimized window).
pub(crate) fn extent_from_caps(
    caps: &vk::SurfaceCapabilitiesKHR,
    want: RenderSize,
) -> Option<vk::Extent2D> {
    let extent = if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    };
    (extent.width != 0 && extent.height != 0).then_some(extent)
}

pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

pub(crate) fn color_subresource() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    subresource_range: vk::ImageSubresourceRange,
) -> Result<vk::ImageView> {
    let iv_info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range,
        ..Default::default()
    };
    device
        .create_image_view(&iv_info, None)
        .context("create_image_view")
}

/// Swapchain with one view per image. The surface is held so it outlives us.
pub struct Swapchain {
    pub(crate) handle: vk::SwapchainKHR,
    pub(crate) format: vk::Format,
    pub(crate) extent: vk::Extent2D,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    vsync: bool,
    surface: Arc<Surface>,
    device: Arc<DeviceContext>,
}

impl Swapchain {
    pub fn new(
        device: Arc<DeviceContext>,
        surface: Arc<Surface>,
        size: RenderSize,
        vsync: bool,
    ) -> Result<Self> {
        let mut sc = Self {
            handle: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            views: Vec::new(),
            vsync,
            surface,
            device,
        };
        if !unsafe { sc.rebuild(size) }? {
            return Err(anyhow!("surface has no area at startup (requested {size})"));
        }
        Ok(sc)
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn size(&self) -> RenderSize {
        RenderSize::new(self.extent.width, self.extent.height)
    }

    /// Caller must have idled the device. Returns `false`, leaving the current
    /// swapchain untouched, while the surface has no area.
    pub fn recreate(&mut self, size: RenderSize) -> Result<bool> {
        let before = self.format;
        if !unsafe { self.rebuild(size) }? {
            debug!("surface has no area, swapchain kept at {}", self.size());
            return Ok(false);
        }
        if self.format != before {
            return Err(anyhow!(
                "swapchain format changed from {before:?} to {:?}",
                self.format
            ));
        }
        Ok(true)
    }

    // STRICT ORDER (rebuild):
    // 1) create NEW swapchain, passing the OLD handle as old_swapchain
    // 2) destroy OLD views
    // 3) enumerate NEW images
    // 4) create NEW views
    // 5) destroy OLD swapchain handle
    // Nothing is created or destroyed when the surface has no area.
    unsafe fn rebuild(&mut self, size: RenderSize) -> Result<bool> {
        let surface_loader = &self.surface.instance.surface_loader;
        let phys = self.device.phys;
        let surface = self.surface.handle;
        let d = &self.device.device;

        let caps = surface_loader
            .get_physical_device_surface_capabilities(phys, surface)
            .context("get_physical_device_surface_capabilities")?;
        let formats = surface_loader.get_physical_device_surface_formats(phys, surface)?;
        let modes = surface_loader.get_physical_device_surface_present_modes(phys, surface)?;

        let surf_format =
            pick_surface_format(&formats).ok_or_else(|| anyhow!("surface reports no formats"))?;
        let present_mode = choose_present_mode(&modes, self.vsync);
        let Some(extent) = extent_from_caps(&caps, size) else {
            return Ok(false);
        };
        let min_count = image_count_from_caps(&caps);

        let old = self.handle;
        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count: min_count,
            image_format: surf_format.format,
            image_color_space: surf_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };

        // 1)
        let handle = self
            .device
            .swapchain_loader
            .create_swapchain(&swap_info, None)
            .context("create_swapchain")?;

        // 2)
        for iv in self.views.drain(..) {
            d.destroy_image_view(iv, None);
        }
        self.images.clear();

        // From here on `self.handle` owns the new swapchain so a failure below
        // still releases it on drop.
        self.handle = handle;
        self.format = surf_format.format;
        self.extent = extent;

        let finish = (|| -> Result<()> {
            // 3)
            self.images = self
                .device
                .swapchain_loader
                .get_swapchain_images(handle)
                .context("get_swapchain_images")?;
            // 4)
            for &img in &self.images {
                self.views
                    .push(create_view(d, img, surf_format.format, color_subresource())?);
            }
            Ok(())
        })();

        // 5)
        if old != vk::SwapchainKHR::null() {
            self.device.swapchain_loader.destroy_swapchain(old, None);
            debug!("retired previous swapchain");
        }
        finish?;

        info!(
            "swapchain ready: {}x{} {:?} {:?}, {} images (min {})",
            extent.width,
            extent.height,
            surf_format.format,
            present_mode,
            self.images.len(),
            min_count
        );
        Ok(true)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &iv in &self.views {
                self.device.device.destroy_image_view(iv, None);
            }
            if self.handle != vk::SwapchainKHR::null() {
                self.device
                    .swapchain_loader
                    .destroy_swapchain(self.handle, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn prefers_bgra_srgb() {
        let formats = [
            fmt(vk::Format::B8G8R8A8_UNORM),
            fmt(vk::Format::R8G8B8A8_SRGB),
            fmt(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            pick_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
    }

    #[test]
    fn falls_back_to_rgba_then_first() {
        let formats = [fmt(vk::Format::B8G8R8A8_UNORM), fmt(vk::Format::R8G8B8A8_SRGB)];
        assert_eq!(
            pick_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::R8G8B8A8_SRGB)
        );
        let formats = [fmt(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(
            pick_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::A2B10G10R10_UNORM_PACK32)
        );
        assert!(pick_surface_format(&[]).is_none());
    }

    #[test]
    fn vsync_always_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn uncapped_prefers_mailbox_then_immediate() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);
        let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&no_mailbox, false),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_current_unless_undefined() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let want = RenderSize::new(2000, 500);
        assert_eq!(
            extent_from_caps(&caps, want),
            Some(vk::Extent2D {
                width: 800,
                height: 600
            })
        );

        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert_eq!(
            extent_from_caps(&caps, want),
            Some(vk::Extent2D {
                width: 1024,
                height: 500
            })
        );
    }

    #[test]
    fn minimized_surface_has_no_extent() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        // The window still believes it is 800x600.
        assert!(extent_from_caps(&caps, RenderSize::new(800, 600)).is_none());

        caps.current_extent = vk::Extent2D {
            width: 640,
            height: 0,
        };
        assert!(extent_from_caps(&caps, RenderSize::new(640, 480)).is_none());

        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert!(extent_from_caps(&caps, RenderSize::new(0, 480)).is_none());
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(image_count_from_caps(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(image_count_from_caps(&caps), 2);
        caps.max_image_count = 8;
        assert_eq!(image_count_from_caps(&caps), 3);
    }
}
