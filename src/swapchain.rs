use crate::{
    depth::DepthBuffer,
    frame::{FrameStatus, FrameSync, MAX_FRAMES_IN_FLIGHT},
    image::create_image_view,
    queues::QueueFamilyIndices,
    renderer::RenderData,
};

use vulkanalia::{
    prelude::v1_0::*,
    vk::KhrSurfaceExtension,
    vk::KhrSwapchainExtension,
};

use anyhow::{anyhow, Result};
use log::*;

pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &Instance,
        data: &RenderData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        // There is no concept of a "default framebuffer" in
        // Vulkan as there is in OpenGL, so it requires an
        // infrastructure that will own the buffers we will
        // render to before we visualize them on the screen.
        // This is the swapchain, essentially a queue of images
        // that are waiting to be presented to the screen. Not
        // all graphics cards are capable of presenting images
        // directly to a screen (for example because they are
        // designed for servers and don't have any display
        // outputs), so swapchain support and compatibility
        // with our window surface have to be queried
        // beforehand.
        Ok(Self {
            capabilities: instance.get_physical_device_surface_capabilities_khr(
                physical_device,
                data.surface,
            )?,
            formats: instance.get_physical_device_surface_formats_khr(
                physical_device,
                data.surface,
            )?,
            present_modes: instance.get_physical_device_surface_present_modes_khr(
                physical_device,
                data.surface,
            )?,
        })
    }
}

pub fn get_swapchain_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> vk::SurfaceFormatKHR {
    // The first setting to determine is the surface format,
    // which itself consists of two fields: 'format', which
    // specifies the color channels and types, and
    // 'color_space', which indicates the supported color
    // space. In our case, we will want a B8G8R8A8_SRGB format
    // (B, G, R and alpha channels of 8 bits each in sRGB color
    // space, which makes for 32 bits of color per pixel, the
    // most common bit depth) and a sRGB color space (standard
    // non-linear RGB space, made to match more closely the way
    // the human eye perceives color). If this surface format
    // is not available, we will just default on the first one
    // available.
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .cloned()
        .unwrap_or(formats[0])
}

pub fn get_swapchain_present_mode(
    present_modes: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    // The second property of the swapchain to determine is the
    // presentation mode, which is the way images are sent from
    // the render queue to the screen. There are four possible
    // modes available in Vulkan:
    // - IMMEDIATE: images are submitted right away, which may
    //   result in tearing (since the graphics and display
    //   devices refresh rates may not match)
    // - FIFO: images are queued and presented after each
    //   vertical blanking interval (VBI), when the display is
    //   refreshed. This prevents tearing, and is most similar
    //   to vertical sync (VSync) in OpenGL.
    // - FIFO_RELAXED: like FIFO, but if the application is
    //   late and the queue was empty at the last vertical
    //   blank, the next image is immediately presented to
    //   avoid a frame lag, at the risk of visible tearing.
    // - MAILBOX: like FIFO, but if the queue is full, instead
    //   of blocking the application, the queued images are
    //   simply replaced with newer ones. This is equivalent to
    //   what is commonly known as "triple buffering", which
    //   results in fewer latency with no tearing, but also a
    //   higher CPU and GPU usage.
    //
    // Only FIFO is guaranteed to be available, so it is the
    // fallback.
    present_modes
        .iter()
        .cloned()
        .find(|&m| m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn get_swapchain_extent(
    window_extent: vk::Extent2D,
    capabilities: vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    // The last property, the swapchain extent, is the
    // resolution of the swapchain images, almost always
    // exactly equal to the resolution of the window that we
    // are drawing to. There is a range of possible
    // resolutions, defined in the SurfaceCapabilitiesKHR
    // struct, with the current width and height of the surface
    // stored in the 'current_extent' field. Some window
    // managers allow different swapchain image and surface
    // resolutions, and indicate this by setting the width and
    // height in 'current_extent' to the maximum value of u32.
    // In that case, we will still pick the resolution of the
    // window, clamped between the min and max values of the
    // swapchain capabilities.
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D::builder()
            .width(window_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ))
            .height(window_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ))
            .build()
    }
}

pub fn get_swapchain_image_count(
    capabilities: vk::SurfaceCapabilitiesKHR,
) -> u32 {
    // We have to decide the number of images that our
    // swapchain will contain; it is recommended to ask for at
    // least one more than the minimum, so that the application
    // does not have to wait on the driver to finish internal
    // operations before another image can be acquired. A
    // maximum of 0 means that there is no limit.
    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }

    image_count
}

// The swapchain owns everything whose lifetime is tied to the
// set of presentable images: the images themselves and their
// views, the render pass and per-image framebuffers, the depth
// buffer shared across images, and the synchronization objects
// that pace CPU recording against GPU consumption. The whole
// bundle is torn down and rebuilt as one unit whenever the
// surface becomes incompatible. That includes the frame-slot
// sync objects, even though their count never changes: a
// rebuild only happens after the device is idle, so recreating
// them is safe, and it guarantees no semaphore carries a stale
// signal from a presentation against the old swapchain.

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub depth: DepthBuffer,
    frames: [FrameSync; MAX_FRAMES_IN_FLIGHT],
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
}

impl Swapchain {
    /// Builds a swapchain for the given surface extent. When
    /// rebuilding, the predecessor is passed in by value: its
    /// handle seeds the `old_swapchain` field of the create
    /// info (which lets the presentation engine carry in-flight
    /// presents over to the replacement), and it is destroyed
    /// once the replacement exists. The caller must have waited
    /// for the device to be idle beforehand.
    pub unsafe fn new(
        instance: &Instance,
        device: &Device,
        data: &RenderData,
        window_extent: vk::Extent2D,
        old: Option<Swapchain>,
    ) -> Result<Self> {
        // To create the swapchain, we will first query the
        // queue family indices and support info for the
        // device, and derive the image format, presentation
        // mode, extent and image count from them.
        let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;
        let support = SwapchainSupport::get(instance, data, data.physical_device)?;

        let surface_format = get_swapchain_surface_format(&support.formats);
        let present_mode = get_swapchain_present_mode(&support.present_modes);
        let extent = get_swapchain_extent(window_extent, support.capabilities);
        let image_count = get_swapchain_image_count(support.capabilities);

        // Then we have to decide how to handle swapchain
        // images that will be used across multiple queue
        // families, which happens if the graphics and
        // presentation queues are different. There are two
        // possible sharing modes for this:
        // - EXCLUSIVE: images are owned by one queue family at
        //   a time, and ownership must be explicitly
        //   transfered. This option offers the best
        //   performance.
        // - CONCURRENT: images can be used across multiple
        //   queue families without explicit transfers.
        let mut queue_family_indices = vec![];
        let image_sharing_mode = if indices.graphics != indices.present {
            queue_family_indices.push(indices.graphics);
            queue_family_indices.push(indices.present);
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        // The predecessor's handle, if any, is handed to the
        // new swapchain so that the transition between the two
        // is seamless; passing a null handle means building
        // from scratch.
        let old_handle = old
            .as_ref()
            .map(|o| o.handle)
            .unwrap_or_else(vk::SwapchainKHR::null);

        // We can finally fill in the (large) swapchain info
        // struct. Besides the fields computed above:
        // - image_array_layers: the amount of views of the
        //   image, which is always 1 except in stereoscopic
        //   applications;
        // - image_usage: the kind of operations the images
        //   will be used for; we render to them directly, so
        //   they are used as COLOR_ATTACHMENT;
        // - pre_transform: a transform to apply to the images
        //   before presentation, like a clockwise rotation on
        //   a rotated display; the surface's current transform
        //   keeps whatever the window system already does;
        // - composite_alpha: whether the alpha channel should
        //   be used for blending with other windows in the
        //   window system (OPAQUE: it should not);
        // - clipped: we don't care about the color of pixels
        //   that are obscured, for example because another
        //   window is in front of them.
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(data.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_handle);

        let handle = device.create_swapchain_khr(&info, None)?;

        // The image count passed above is only a minimum; the
        // implementation may have created more, so the actual
        // set is queried back.
        let images = device.get_swapchain_images_khr(handle)?;

        // The swapchain is a structure to hold and present
        // images. In Vulkan, however, images are not used as
        // such, but under an "image view", which describes how
        // to access the image and which parts of it to access.
        let image_views = images
            .iter()
            .map(|&i| create_image_view(
                device,
                i,
                surface_format.format,
                vk::ImageAspectFlags::COLOR,
            ))
            .collect::<Result<Vec<_>, _>>()?;

        // Everything the framebuffers depend on: the depth
        // buffer sized to the new extent, the render pass
        // describing both attachments, and the framebuffers
        // themselves, one per swapchain image.
        let depth = DepthBuffer::create(instance, device, data, extent)?;
        let render_pass = create_render_pass(device, surface_format.format, depth.format)?;
        let framebuffers = create_framebuffers(device, &image_views, &depth, render_pass, extent)?;

        // Synchronization objects: one set per in-flight frame
        // slot, plus a table recording, for each swapchain
        // image, the fence of the submission that last
        // rendered to it (null until the image is first used).
        let mut frames = [FrameSync::default(); MAX_FRAMES_IN_FLIGHT];
        for frame in &mut frames {
            *frame = FrameSync::create(device)?;
        }

        let images_in_flight = vec![vk::Fence::null(); images.len()];

        info!(
            "Swapchain created ({} images, {}x{}).",
            images.len(),
            extent.width,
            extent.height
        );

        let swapchain = Self {
            handle,
            format: surface_format.format,
            extent,
            images,
            image_views,
            render_pass,
            framebuffers,
            depth,
            frames,
            images_in_flight,
            current_frame: 0,
        };

        // The predecessor can now be retired. A different
        // color or depth format in the replacement would
        // silently invalidate every pipeline and render pass
        // built against the old one, so format drift is a hard
        // failure, not a reconfiguration.
        if let Some(old) = old {
            let compatible = old.format == swapchain.format
                && old.depth.format == swapchain.depth.format;
            old.destroy(device);

            if !compatible {
                return Err(anyhow!("Swapchain image or depth format has changed."));
            }
        }

        Ok(swapchain)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Blocks until the presentation engine hands out the next
    /// presentable image for the current frame slot, signaling
    /// the slot's image-available semaphore as a side effect.
    ///
    /// Returns the image index paired with a status, or `None`
    /// if the swapchain is out of date, in which case no image
    /// was acquired and the caller must rebuild before
    /// rendering anything.
    pub unsafe fn acquire_next_image(
        &mut self,
        device: &Device,
    ) -> Result<Option<(usize, FrameStatus)>> {
        // Before anything else, wait for the GPU to be done
        // with the submission this slot made two frames ago;
        // until then its command buffer and semaphores are
        // still in use. The fence is deliberately not reset
        // here: if the acquire below reports the swapchain out
        // of date, no submission follows, and a reset fence
        // would deadlock the next wait on this slot.
        let frame = &self.frames[self.current_frame];
        device.wait_for_fences(&[frame.in_flight_fence], true, u64::MAX)?;

        // The "acquire next image" call takes the swapchain
        // from which to acquire, a timeout specifying how long
        // to wait if no image is available (in nanoseconds;
        // effectively forever here), and a semaphore and/or
        // fence to signal once the image is actually free.
        let result = device.acquire_next_image_khr(
            self.handle,
            u64::MAX,
            frame.image_available_semaphore,
            vk::Fence::null(),
        );

        classify_acquire(result)
    }

    /// Submits the recorded command buffer for the acquired
    /// image and queues it for presentation. Returns the
    /// presentation status; the caller decides whether a
    /// rebuild follows. The internal frame slot counter
    /// advances unconditionally.
    pub unsafe fn submit_command_buffers(
        &mut self,
        device: &Device,
        data: &RenderData,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
    ) -> Result<FrameStatus> {
        // Acquisition order and image index are not guaranteed
        // to align across frames: the image we just acquired
        // may have last been rendered to by a different frame
        // slot, whose submission could still be executing. The
        // per-image table remembers which fence that was, so
        // we can wait it out before overwriting the image.
        let image_in_flight = self.images_in_flight[image_index];
        if image_in_flight != vk::Fence::null() {
            device.wait_for_fences(&[image_in_flight], true, u64::MAX)?;
        }

        let frame = self.frames[self.current_frame];
        self.images_in_flight[image_index] = frame.in_flight_fence;

        // The submission waits on the image-available
        // semaphore at the color attachment output stage (the
        // earlier pipeline stages don't touch the image, so
        // they may run before it is free), executes the
        // command buffer, and signals both the render-finished
        // semaphore and the slot's fence on completion.
        let wait_semaphores = &[frame.image_available_semaphore];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[command_buffer];
        let signal_semaphores = &[frame.render_finished_semaphore];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        // The fence is restored to the unsignaled state only
        // now that a submission is certain to re-signal it.
        device.reset_fences(&[frame.in_flight_fence])?;
        device.queue_submit(data.graphics_queue, &[submit_info], frame.in_flight_fence)?;

        // The final step is to hand the image back to the
        // presentation engine, gated on the render-finished
        // semaphore so that presentation can never overtake
        // rendering.
        let swapchains = &[self.handle];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = device.queue_present_khr(data.present_queue, &present_info);

        // The slot counter keeps cycling whatever presentation
        // reported; a stale-surface rebuild never
        // desynchronizes frame pacing.
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        classify_present(result)
    }

    pub unsafe fn destroy(&self, device: &Device) {
        self.framebuffers
            .iter()
            .for_each(|&f| device.destroy_framebuffer(f, None));

        self.depth.destroy(device);
        device.destroy_render_pass(self.render_pass, None);

        self.image_views
            .iter()
            .for_each(|&v| device.destroy_image_view(v, None));

        device.destroy_swapchain_khr(self.handle, None);

        self.frames.iter().for_each(|f| f.destroy(device));

        debug!("Destroyed the swapchain and related objects.");
    }
}

/// Classifies the result of an image acquisition into the
/// status taxonomy: `None` for an out-of-date swapchain (no
/// image acquired), a status-tagged image index otherwise, and
/// a hard error for anything fatal.
fn classify_acquire(
    result: Result<(u32, vk::SuccessCode), vk::ErrorCode>,
) -> Result<Option<(usize, FrameStatus)>> {
    match result {
        Ok((index, code)) if code == vk::SuccessCode::SUBOPTIMAL_KHR => {
            Ok(Some((index as usize, FrameStatus::Suboptimal)))
        }
        Ok((index, _)) => Ok(Some((index as usize, FrameStatus::Adequate))),
        Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(None),
        Err(e) => Err(anyhow!("Failed to acquire swapchain image: {}", e)),
    }
}

/// Classifies the result of a present request. Unlike at
/// acquisition, an out-of-date result here is returned as a
/// status rather than `None`: the frame has already been
/// handed over, only the rebuild decision remains.
fn classify_present(
    result: Result<vk::SuccessCode, vk::ErrorCode>,
) -> Result<FrameStatus> {
    match result {
        Ok(code) if code == vk::SuccessCode::SUBOPTIMAL_KHR => Ok(FrameStatus::Suboptimal),
        Ok(_) => Ok(FrameStatus::Adequate),
        Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
        Err(e) => Err(anyhow!("Failed to present swapchain image: {}", e)),
    }
}

unsafe fn create_render_pass(
    device: &Device,
    format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    // During rendering, the framebuffer accesses two
    // attachments: the color buffer (one of the swapchain
    // images) and the depth buffer. The render pass object
    // specifies how these render targets are configured, what
    // to do with their contents at the beginning and end of
    // the pass, and which layouts they go through.
    //
    // The color attachment is cleared at the start of the pass
    // and stored at the end (so it can be presented); we don't
    // use the stencil component, so its load and store don't
    // matter. The initial layout is UNDEFINED (whatever was
    // presented last frame is about to be cleared anyway), and
    // the final layout is PRESENT_SRC_KHR, ready to be handed
    // to the presentation engine.
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    // The depth attachment is also cleared at the start, but
    // its contents are useless after the pass, so they are not
    // stored.
    let depth_attachment = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(vk::SampleCountFlags::_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    // Each subpass references its attachments by index in the
    // render pass, paired with the layout the attachment
    // should be in while the subpass runs.
    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let depth_attachment_ref = vk::AttachmentReference::builder()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .depth_stencil_attachment(&depth_attachment_ref);

    // The subpass dependency makes the pass wait, before
    // writing either attachment, for whatever was previously
    // reading or writing them outside the pass; without it the
    // layout transitions above could happen while the
    // presentation engine still reads the image.
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);

    let attachments = &[color_attachment, depth_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];
    let info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    let render_pass = device.create_render_pass(&info, None)?;

    info!("Render pass created.");
    Ok(render_pass)
}

unsafe fn create_framebuffers(
    device: &Device,
    image_views: &[vk::ImageView],
    depth: &DepthBuffer,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    // A framebuffer binds concrete image views to the
    // attachment slots of a render pass: one per swapchain
    // image, each pairing that image's color view with the
    // shared depth view.
    image_views
        .iter()
        .map(|&view| {
            let attachments = &[view, depth.view];
            let info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            Ok(device.create_framebuffer(&info, None)?)
        })
        .collect::<Result<Vec<_>>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR::builder()
            .format(format)
            .color_space(color_space)
            .build()
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let formats = &[
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = get_swapchain_surface_format(formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = &[
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = get_swapchain_surface_format(formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        let modes = &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(get_swapchain_present_mode(modes), vk::PresentModeKHR::MAILBOX);

        let modes = &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(get_swapchain_present_mode(modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_reported_size_when_fixed() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 1280, height: 720 },
            ..Default::default()
        };

        let window_extent = vk::Extent2D { width: 800, height: 600 };
        let extent = get_swapchain_extent(window_extent, capabilities);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn extent_clamps_window_size_when_flexible() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 640, height: 480 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..Default::default()
        };

        let extent = get_swapchain_extent(vk::Extent2D { width: 4000, height: 100 }, capabilities);
        assert_eq!((extent.width, extent.height), (1920, 480));
    }

    #[test]
    fn image_count_is_one_over_minimum_capped_by_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(get_swapchain_image_count(capabilities), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(get_swapchain_image_count(capabilities), 2);

        // A maximum of zero means unbounded.
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(get_swapchain_image_count(capabilities), 4);
    }

    #[test]
    fn acquire_classification() {
        let acquired = classify_acquire(Ok((1, vk::SuccessCode::SUCCESS))).unwrap();
        assert_eq!(acquired, Some((1, FrameStatus::Adequate)));

        let acquired = classify_acquire(Ok((2, vk::SuccessCode::SUBOPTIMAL_KHR))).unwrap();
        assert_eq!(acquired, Some((2, FrameStatus::Suboptimal)));

        let acquired = classify_acquire(Err(vk::ErrorCode::OUT_OF_DATE_KHR)).unwrap();
        assert_eq!(acquired, None);

        assert!(classify_acquire(Err(vk::ErrorCode::DEVICE_LOST)).is_err());
    }

    #[test]
    fn present_classification() {
        let status = classify_present(Ok(vk::SuccessCode::SUCCESS)).unwrap();
        assert_eq!(status, FrameStatus::Adequate);

        let status = classify_present(Ok(vk::SuccessCode::SUBOPTIMAL_KHR)).unwrap();
        assert_eq!(status, FrameStatus::Suboptimal);

        let status = classify_present(Err(vk::ErrorCode::OUT_OF_DATE_KHR)).unwrap();
        assert_eq!(status, FrameStatus::OutOfDate);

        assert!(classify_present(Err(vk::ErrorCode::SURFACE_LOST_KHR)).is_err());
    }
}
