use std::collections::HashSet;

use crate::{
    queues::QueueFamilyIndices,
    renderer::{RenderData, PORTABILITY_MACOS_VERSION, VALIDATION_ENABLED, VALIDATION_LAYER},
    swapchain::SwapchainSupport,
};

use thiserror::Error;
use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};
use log::*;

/// Required device extensions: the swapchain is an extension
/// because it isn't part of the core Vulkan API, which is
/// render-agnostic and knows nothing of window surfaces.
pub const REQUIRED_EXTENSIONS: &[vk::ExtensionName] = &[
    vk::KHR_SWAPCHAIN_EXTENSION.name,
];

// The macro will create an error type with a Display impl that
// prints the given string.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SuitabilityError(pub &'static str);

unsafe fn check_physical_device_extensions(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<()> {
    // Get the list of supported device extensions on the
    // device...
    let extensions = instance
        .enumerate_device_extension_properties(physical_device, None)?
        .iter()
        .map(|e| e.extension_name)
        .collect::<HashSet<_>>();

    // ...and check that all the required ones are supported.
    if REQUIRED_EXTENSIONS.iter().all(|e| extensions.contains(e)) {
        Ok(())
    } else {
        Err(anyhow!(SuitabilityError("Missing required device extensions.")))
    }
}

unsafe fn check_physical_device(
    instance: &Instance,
    data: &RenderData,
    physical_device: vk::PhysicalDevice,
) -> Result<()> {
    // Each device has a number of associated queue families
    // that represent the supported functionalities (graphics,
    // compute shaders, transfer operations, etc.). We need
    // both a graphics queue for drawing and a present queue to
    // hand finished images over to the surface.
    QueueFamilyIndices::get(instance, data, physical_device)?;

    // Then we can check if the device supports all the
    // required extensions.
    check_physical_device_extensions(instance, physical_device)?;

    // Finally, we can check if the device's swapchain support
    // is sufficient: we want at least one supported image
    // format and presentation mode for our window surface.
    let support = SwapchainSupport::get(instance, data, physical_device)?;
    if support.formats.is_empty() || support.present_modes.is_empty() {
        return Err(anyhow!(SuitabilityError("Insufficient swapchain support.")));
    }

    Ok(())
}

pub unsafe fn pick_physical_device(
    instance: &Instance,
    data: &mut RenderData,
) -> Result<()> {
    // There can be more than one graphics device on the system
    // (one dedicated and one integrated graphics card at the
    // same time, for example), and in fact a Vulkan instance
    // can set up and use any number of them simultaneously,
    // but we will stick here to listing the available physical
    // devices and picking the first suitable one.
    for device in instance.enumerate_physical_devices()? {
        let properties = instance.get_physical_device_properties(device);

        if let Err(error) = check_physical_device(instance, data, device) {
            warn!("Skipping physical device ({}): {}", properties.device_name, error);
        } else {
            info!("Selected physical device: {}", properties.device_name);
            data.physical_device = device;
            return Ok(());
        }
    }

    Err(anyhow!(SuitabilityError("Failed to find suitable physical device.")))
}

pub unsafe fn create_logical_device(
    entry: &Entry,
    instance: &Instance,
    data: &mut RenderData,
) -> Result<Device> {
    // The logical device serves as a layer between a physical
    // device and the application. There might be more than one
    // logical device per physical device, each representing
    // different sets of requirements. To create the logical
    // device, we need to build a representation of the queue
    // families of the physical device we are using; the
    // graphics and present families may or may not be the same
    // index, so the set below deduplicates them before
    // building one queue create info per unique family.
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;

    let mut unique_indices = HashSet::new();
    unique_indices.insert(indices.graphics);
    unique_indices.insert(indices.present);

    // For each queue family we provide its index on the device
    // and the priorities of its queues (a number between 0.0
    // and 1.0 which influences the scheduling of command
    // buffer execution); since we only want one queue per
    // family, but are still required to provide the
    // priorities, we simply input the array [1.0].
    let priorities = &[1.0];
    let queue_infos = unique_indices
        .iter()
        .map(|&i| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(i)
                .queue_priorities(priorities)
                .build()
        })
        .collect::<Vec<_>>();

    // The next piece of information for the logical device are
    // layers and extensions. Previous implementations of
    // Vulkan made a distinction between instance and device
    // specific validation layers, but this is no longer the
    // case. However, it is still a good idea to set them
    // anyway to be compatible with older implementations.
    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    // Then we add the required extensions.
    let mut extensions = REQUIRED_EXTENSIONS
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // Some implementations are not fully conformant, so
    // certain Vulkan extensions need to be enabled to ensure
    // portability.
    if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
        extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
    }

    // We have no optional device features to require: the
    // renderer draws plain filled triangles with fixed
    // function blending.
    let features = vk::PhysicalDeviceFeatures::builder();

    // Then, the actual device info struct combines all the
    // information in one place.
    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    // Finally, we can create the device, and retrieve our
    // handles for the graphics and present queues.
    let device = instance.create_device(data.physical_device, &info, None)?;
    data.graphics_queue = device.get_device_queue(indices.graphics, 0);
    data.present_queue = device.get_device_queue(indices.present, 0);

    info!("Logical device created.");
    Ok(device)
}
