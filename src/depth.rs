use crate::{
    image::{create_image, create_image_view, get_supported_format},
    renderer::RenderData,
};

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;

/// Depth attachment of a single swapchain extent: the image,
/// its backing memory, and the view the render pass writes
/// through. Recreated together with the swapchain, since the
/// image is sized to the swapchain extent.
#[derive(Clone, Copy)]
pub struct DepthBuffer {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
}

impl DepthBuffer {
    pub unsafe fn create(
        instance: &Instance,
        device: &Device,
        data: &RenderData,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        // The depth attachment stores, for each pixel, how
        // close the nearest fragment written so far was, which
        // is what lets overlapping geometry resolve correctly
        // regardless of draw order. From the swapchain's point
        // of view this is just another image, with the same
        // extent as the color attachments, optimal tiling and
        // device local memory.
        let format = get_depth_format(instance, data)?;

        let (image, memory) = create_image(
            instance,
            device,
            data,
            extent.width,
            extent.height,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        // Then, as with other images, we need a view to attach
        // it to the framebuffer; the render pass takes care of
        // transitioning it into the depth attachment layout.
        let view = create_image_view(device, image, format, vk::ImageAspectFlags::DEPTH)?;

        Ok(Self {
            image,
            memory,
            view,
            format,
        })
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

pub unsafe fn get_depth_format(
    instance: &Instance,
    data: &RenderData,
) -> Result<vk::Format> {
    // Depth formats are characterized by their depth
    // (typically 24 or 32 bits), their data type (SFLOAT for
    // signed floats, UNORM for unsigned normalized floats) and
    // the presence of a stencil component (S8_UINT for 8-bit
    // unsigned integer).
    let depth_formats = &[
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    // Then, we can use the helper function to get the first
    // supported format with optimal tiling and a depth/stencil
    // attachment.
    get_supported_format(
        instance,
        data,
        depth_formats,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    )
}
