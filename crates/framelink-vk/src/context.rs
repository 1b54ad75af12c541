// SPDX-License-Identifier: CEPL-1.0
//! One-shot setup: instance, debug messenger, physical and logical device.

use std::ffi::{c_void, CStr};

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use framelink_present::QueueFamilies;
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};

const APP_NAME: &CStr = c"framelink";
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Creates the instance with the platform WSI extensions. With `validation`
/// the Khronos layer and `VK_EXT_debug_utils` are enabled when the loader
/// has them. Returns whether validation ended up enabled.
pub(crate) unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<(Instance, bool)> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut ext_vec = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();

    let validation = validation && unsafe { layer_available(entry, VALIDATION_LAYER) };
    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        ext_vec.push(debug_utils::NAME.as_ptr());
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

    let instance = unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?;
    Ok((instance, validation))
}

unsafe fn layer_available(entry: &Entry, name: &CStr) -> bool {
    let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(l) => l,
        Err(e) => {
            warn!("enumerate_instance_layer_properties: {e:?}");
            return false;
        }
    };
    let found = layers
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == name);
    if !found {
        warn!("{name:?} not installed, continuing without validation");
    }
    found
}

/// Routes validation output into `tracing` at the matching level.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", ?types, "{msg}");
    } else {
        trace!(target: "vulkan", ?types, "{msg}");
    }
    vk::FALSE
}

pub(crate) struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub(crate) unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
            .context("create_debug_utils_messenger")?;
        debug!("validation messenger installed");
        Ok(Self { loader, messenger })
    }

    /// Must run before the instance is destroyed.
    pub(crate) unsafe fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None)
        };
    }
}

/// Graphics and present families for `phys`, preferring one family that
/// does both.
unsafe fn find_queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Option<QueueFamilies> {
    let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };

    let mut graphics = Vec::new();
    let mut present = Vec::new();
    for (i, q) in qprops.iter().enumerate() {
        let i = i as u32;
        if q.queue_count == 0 {
            continue;
        }
        if q.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics.push(i);
        }
        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(phys, i, surface)
                .unwrap_or(false)
        };
        if supported {
            present.push(i);
        }
    }

    if let Some(&both) = graphics.iter().find(|g| present.contains(g)) {
        return Some(QueueFamilies {
            graphics: both,
            present: both,
        });
    }
    Some(QueueFamilies {
        graphics: *graphics.first()?,
        present: *present.first()?,
    })
}

unsafe fn supports_swapchain(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    let Ok(exts) = (unsafe { instance.enumerate_device_extension_properties(phys) }) else {
        return false;
    };
    exts.iter()
        .any(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) } == swapchain::NAME)
}

/// First physical device that can render and present to `surface`, has
/// `VK_KHR_swapchain`, and reports at least one surface format and mode.
pub(crate) unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.context("enumerate_physical_devices")?;
    if devices.is_empty() {
        return Err(anyhow!("no Vulkan-capable GPU found"));
    }

    for phys in devices {
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();

        let Some(families) = (unsafe { find_queue_families(instance, surface_loader, surface, phys) })
        else {
            debug!("{name}: no graphics/present queue family");
            continue;
        };
        if !unsafe { supports_swapchain(instance, phys) } {
            debug!("{name}: VK_KHR_swapchain unsupported");
            continue;
        }
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(phys, surface) }
            .unwrap_or_default();
        let modes =
            unsafe { surface_loader.get_physical_device_surface_present_modes(phys, surface) }
                .unwrap_or_default();
        if formats.is_empty() || modes.is_empty() {
            debug!("{name}: surface reports no formats or present modes");
            continue;
        }

        info!(
            "gpu: {name} (graphics family {}, present family {})",
            families.graphics, families.present
        );
        return Ok((phys, families));
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

/// Opens the device with one queue per distinct family and `VK_KHR_swapchain`.
/// Returns the device and its graphics and present queues.
pub(crate) unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let priorities = [1.0_f32];
    let mut unique = vec![families.graphics];
    if families.present != families.graphics {
        unique.push(families.present);
    }
    let qinfos: Vec<_> = unique
        .iter()
        .map(|&family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures::default();
    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: qinfos.len() as u32,
        p_queue_create_infos: qinfos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    let device =
        unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;
    let graphics = unsafe { device.get_device_queue(families.graphics, 0) };
    let present = unsafe { device.get_device_queue(families.present, 0) };
    Ok((device, graphics, present))
}
