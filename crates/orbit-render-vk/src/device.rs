// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::khr::swapchain;
use ash::vk;
use tracing::info;

use crate::instance::{InstanceContext, Surface};

/// Logical device with a single graphics+present queue.
pub struct DeviceContext {
    pub(crate) swapchain_loader: swapchain::Device,
    pub(crate) device: ash::Device,
    pub(crate) queue: vk::Queue,
    pub(crate) queue_family: u32,
    pub(crate) phys: vk::PhysicalDevice,
    pub(crate) limits: vk::PhysicalDeviceLimits,
    pub(crate) anisotropy: bool,
    pub(crate) instance: Arc<InstanceContext>,
}

unsafe fn pick_device_and_queue(
    instance: &InstanceContext,
    surface: &Surface,
) -> Result<(vk::PhysicalDevice, u32)> {
    for phys in instance.instance.enumerate_physical_devices()? {
        let props = instance.instance.get_physical_device_properties(phys);
        let api = props.api_version;
        if vk::api_version_major(api) == 1 && vk::api_version_minor(api) < 3 {
            continue;
        }

        let qprops = instance
            .instance
            .get_physical_device_queue_family_properties(phys);
        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && instance
                    .surface_loader
                    .get_physical_device_surface_support(phys, i as u32, surface.handle)
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!(
        "no Vulkan 1.3 device with a graphics queue that can present to this window"
    ))
}

impl DeviceContext {
    pub fn new(instance: Arc<InstanceContext>, surface: &Surface) -> Result<Self> {
        unsafe {
            let (phys, queue_family) = pick_device_and_queue(&instance, surface)?;
            let props = instance.instance.get_physical_device_properties(phys);
            let supported = instance.instance.get_physical_device_features(phys);
            let anisotropy = supported.sampler_anisotropy == vk::TRUE;

            // STRICT ORDER (feature pNext chain): feats2 -> feats13
            let priorities = [1.0_f32];
            let qinfo = vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: queue_family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            };
            let device_exts = [swapchain::NAME.as_ptr()];

            let mut feats13 = vk::PhysicalDeviceVulkan13Features {
                s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
                synchronization2: vk::TRUE,
                dynamic_rendering: vk::TRUE,
                ..Default::default()
            };
            let feats2 = vk::PhysicalDeviceFeatures2 {
                s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
                p_next: (&mut feats13) as *mut _ as *mut _,
                features: vk::PhysicalDeviceFeatures {
                    sampler_anisotropy: if anisotropy { vk::TRUE } else { vk::FALSE },
                    ..Default::default()
                },
                ..Default::default()
            };

            let dinfo = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                p_next: (&feats2) as *const _ as *const _,
                queue_create_info_count: 1,
                p_queue_create_infos: &qinfo,
                enabled_extension_count: device_exts.len() as u32,
                pp_enabled_extension_names: device_exts.as_ptr(),
                ..Default::default()
            };
            let device = instance
                .instance
                .create_device(phys, &dinfo, None)
                .context("create_device")?;
            let queue = device.get_device_queue(queue_family, 0);
            let swapchain_loader = swapchain::Device::new(&instance.instance, &device);

            let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy();
            info!(
                "device: {name} (api {}.{}), queue family {queue_family}, anisotropy={anisotropy}",
                vk::api_version_major(props.api_version),
                vk::api_version_minor(props.api_version),
            );

            Ok(Self {
                swapchain_loader,
                device,
                queue,
                queue_family,
                phys,
                limits: props.limits,
                anisotropy,
                instance,
            })
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }

    /// Highest sample count no greater than `requested` usable for both color
    /// and depth attachments.
    pub fn sample_count(&self, requested: u32) -> vk::SampleCountFlags {
        clamp_sample_count(
            self.limits.framebuffer_color_sample_counts
                & self.limits.framebuffer_depth_sample_counts,
            requested,
        )
    }

    pub(crate) unsafe fn pick_depth_format(&self) -> Result<vk::Format> {
        // Prefer 32f → 24+S8 → 32f+S8 → 16
        let candidates = [
            vk::Format::D32_SFLOAT,
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D16_UNORM,
        ];
        candidates
            .into_iter()
            .find(|&fmt| {
                self.instance
                    .instance
                    .get_physical_device_format_properties(self.phys, fmt)
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .ok_or_else(|| anyhow!("no depth attachment format supported"))
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

pub(crate) fn clamp_sample_count(
    supported: vk::SampleCountFlags,
    requested: u32,
) -> vk::SampleCountFlags {
    [
        (64, vk::SampleCountFlags::TYPE_64),
        (32, vk::SampleCountFlags::TYPE_32),
        (16, vk::SampleCountFlags::TYPE_16),
        (8, vk::SampleCountFlags::TYPE_8),
        (4, vk::SampleCountFlags::TYPE_4),
        (2, vk::SampleCountFlags::TYPE_2),
    ]
    .into_iter()
    .find(|&(n, flag)| n <= requested && supported.contains(flag))
    .map(|(_, flag)| flag)
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}
