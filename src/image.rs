use crate::{
    buffers::find_memory_type,
    devices::SuitabilityError,
    renderer::RenderData,
};

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};

pub unsafe fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspects: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    // Images in Vulkan are not accessed as such, but through
    // what are called "image views", which add a level of
    // indirection to the image specifying how it should be
    // accessed. The subresource range describes which parts of
    // the image the view covers: the aspect (color bits for
    // the swapchain images, depth bits for the depth buffer),
    // and the mipmap levels and array layers it spans (a
    // single one of each here, since neither mipmapping nor
    // layered rendering is used).
    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(aspects)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
        .build();

    // Then we can build the info struct, containing the image
    // itself, the view type of the image (a 2D texture), its
    // format and the subresource range. The component mapping
    // is left at the default, which is the identity swizzle.
    let info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .subresource_range(subresource_range);

    Ok(device.create_image_view(&info, None)?)
}

pub unsafe fn create_image(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    width: u32,
    height: u32,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> Result<(vk::Image, vk::DeviceMemory)> {
    // First, fill the image info struct: a 2D image of the
    // given extent and format, with a single mip level and
    // array layer, no multisampling, and OPTIMAL tiling (the
    // texels are laid out in an implementation defined order
    // for optimal GPU access, as opposed to the row-major
    // LINEAR layout). The initial layout is UNDEFINED: the
    // image is treated as containing no valid data, and
    // whatever it holds is discarded on the first transition.
    let info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(tiling)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(vk::SampleCountFlags::_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = device.create_image(&info, None)?;

    // As with buffers, creating the image does not allocate
    // any memory for it: we query the image's memory
    // requirements, pick a suitable memory type, allocate, and
    // bind the two together.
    let requirements = device.get_image_memory_requirements(image);

    let memory_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(find_memory_type(
            instance,
            data,
            properties,
            requirements,
        )?);

    let image_memory = device.allocate_memory(&memory_info, None)?;
    device.bind_image_memory(image, image_memory, 0)?;

    Ok((image, image_memory))
}

pub unsafe fn get_supported_format(
    instance: &Instance,
    data: &RenderData,
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
) -> Result<vk::Format> {
    // Not every device supports every image format for every
    // use: we go through the candidate formats in order of
    // preference and return the first whose feature flags,
    // under the requested tiling, contain the ones we need.
    candidates
        .iter()
        .cloned()
        .find(|&f| {
            let properties = instance.get_physical_device_format_properties(
                data.physical_device,
                f,
            );

            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or(anyhow!(SuitabilityError("Failed to find supported image format.")))
}
