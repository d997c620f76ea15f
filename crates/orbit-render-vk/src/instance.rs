// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use anyhow::{anyhow, Context, Result};
use ash::khr::surface;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, error, info, trace, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Loader entry, instance, and (debug builds) the validation messenger.
pub struct InstanceContext {
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub(crate) surface_loader: surface::Instance,
    pub(crate) instance: ash::Instance,
    pub(crate) entry: Entry,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else {
        trace!("[vulkan] {msg}");
    }
    vk::FALSE
}

unsafe fn has_layer(entry: &Entry, name: &CStr) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default()
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == name)
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance> {
    let app = c"orbit";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_3,
        ..Default::default()
    };

    let mut ext_vec = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    if validation {
        ext_vec.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0u32, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = loader.create_debug_utils_messenger(&ci, None)?;
    Ok((loader, messenger))
}

impl InstanceContext {
    /// Loads Vulkan and creates a 1.3 instance with the window-system
    /// extensions `display` needs. Debug builds add validation when the
    /// layer is installed.
    pub fn new(display: &dyn HasDisplayHandle) -> Result<Self> {
        let display_raw = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        unsafe {
            let entry = Entry::load().context("load Vulkan loader")?;
            let validation = cfg!(debug_assertions) && has_layer(&entry, VALIDATION_LAYER);
            if cfg!(debug_assertions) && !validation {
                warn!("validation layer not installed, running without it");
            }

            let instance = create_instance(&entry, display_raw, validation)
                .context("create_instance (with WSI + optional debug ext)")?;
            let debug = if validation {
                Some(create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };
            let surface_loader = surface::Instance::new(&entry, &instance);

            info!("vulkan instance created (validation={validation})");
            Ok(Self {
                debug,
                surface_loader,
                instance,
                entry,
            })
        }
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("vulkan instance destroyed");
    }
}

/// Window surface. Must outlive every swapchain created from it.
pub struct Surface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) instance: std::sync::Arc<InstanceContext>,
}

impl Surface {
    pub fn new(
        instance: std::sync::Arc<InstanceContext>,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let handle = unsafe {
            ash_window::create_surface(&instance.entry, &instance.instance, dh, wh, None)
                .context("ash_window::create_surface")?
        };
        Ok(Self { handle, instance })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.instance
                .surface_loader
                .destroy_surface(self.handle, None);
        }
    }
}
