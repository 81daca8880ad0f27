use crate::{
    commands::{allocate_command_buffers, create_command_pool, free_command_buffers},
    devices::{create_logical_device, pick_physical_device},
    frame::{FrameTracker, RebuildGate},
    model::Model,
    swapchain::Swapchain,
};

use std::collections::HashSet;

use winit::window::Window;
use vulkanalia::{
    prelude::v1_0::*,
    window as vk_window,
    loader::{LibloadingLoader, LIBRARY},
    Version,
    vk::ExtDebugUtilsExtension,
    vk::KhrSurfaceExtension,
};
use anyhow::{anyhow, Result};
use log::*;

pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

/// Device-level handles shared by every rendering subsystem.
#[derive(Default)]
pub struct RenderData {
    pub surface: vk::SurfaceKHR,
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub command_pool: vk::CommandPool,
}

// The renderer owns the whole Vulkan context and drives the
// per-frame protocol:
//
//   begin_frame -> begin_render_pass -> (draw) ->
//   end_render_pass -> end_frame
//
// begin_frame acquires a swapchain image and opens its command
// buffer (or returns None when the swapchain had to be rebuilt
// instead), and end_frame submits and presents it. The render
// pass bracket is separate from the frame bracket so that other
// passes (offscreen, post-processing) can later slot into the
// same frame.

pub struct Renderer {
    // - Entry: the Vulkan entry point, the first function to
    //   call to load the Vulkan library
    // - Instance: the Vulkan instance, the handle to the Vulkan
    //   library and the first object to create
    // - Data: the device-level handles shared by the rendering
    //   subsystems
    // - Device: the logical device, the interface to the
    //   physical device and the object to create other Vulkan
    //   objects
    // - Swapchain: the presentable images and everything tied
    //   to them; None only transiently, while a rebuild is
    //   deferred because the window has no drawable area
    entry: Entry,
    instance: Instance,
    data: RenderData,
    pub device: Device,
    swapchain: Option<Swapchain>,
    command_buffers: Vec<vk::CommandBuffer>,
    image_index: usize,
    tracker: FrameTracker,
    resized: bool,
    rebuild_gate: RebuildGate,
}

impl Renderer {
    pub unsafe fn create(window: &Window) -> Result<Self> {
        // To create a Vulkan instance, we first need a special
        // function loader to load the initial commands from
        // the Vulkan DLL. Next we create an entry point using
        // this loader, and finally use the entry point, window
        // handle and application data to create the Vulkan
        // instance.
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;
        let mut data = RenderData::default();
        let instance = create_instance(window, &entry, &mut data)?;

        // Since Vulkan is a platform agnostic API, it does not
        // interface directly with the window system on its
        // own; instead, it exposes surface objects, abstract
        // representations of native window objects to render
        // images on. Vulkanalia provides a convenient function
        // to handle the platform differences for us and return
        // a proper Vulkan surface.
        data.surface = vk_window::create_surface(&instance, window, window)?;
        info!("Surface created.");

        // The next step involves choosing a physical device to
        // use on the system (the graphics card, for example),
        // and then creating a logical device to interface with
        // the application.
        pick_physical_device(&instance, &mut data)?;
        let device = create_logical_device(&entry, &instance, &mut data)?;

        // The command pool is created once and outlives every
        // swapchain rebuild; both the frame command buffers
        // and transfer commands (model uploads) come from it.
        create_command_pool(&instance, &device, &mut data)?;

        // We then create the swapchain, the structure
        // presenting rendered images to the surface, and one
        // command buffer per swapchain image. Pairing buffers
        // with images (rather than with in-flight frame slots)
        // means a buffer can never be re-recorded while the
        // image it targets is still being presented.
        let swapchain = Swapchain::new(&instance, &device, &data, window_extent(window), None)?;
        let command_buffers = allocate_command_buffers(&device, &data, swapchain.image_count() as u32)?;

        Ok(Self {
            entry,
            instance,
            data,
            device,
            swapchain: Some(swapchain),
            command_buffers,
            image_index: 0,
            tracker: FrameTracker::new(),
            resized: false,
            rebuild_gate: RebuildGate::new(),
        })
    }

    /// Opens a frame: acquires the next swapchain image and
    /// starts recording its command buffer.
    ///
    /// Returns `None` without opening anything when the frame
    /// could not start: either the acquire found the swapchain
    /// out of date (it is rebuilt here and the caller simply
    /// retries next frame), or a rebuild is still deferred
    /// because the window has no drawable area.
    pub unsafe fn begin_frame(&mut self, window: &Window) -> Result<Option<vk::CommandBuffer>> {
        if self.tracker.in_progress() {
            return Err(anyhow!("Cannot begin a frame while another is in progress."));
        }

        // A rebuild deferred while the window was minimized is
        // retried first; until it succeeds there is no
        // swapchain to acquire from.
        if self.rebuild_gate.pending() {
            self.recreate_swapchain(window)?;
            if self.rebuild_gate.pending() {
                return Ok(None);
            }
        }

        let Some(swapchain) = self.swapchain.as_mut() else {
            return Err(anyhow!("No swapchain to acquire from."));
        };

        // An out-of-date swapchain at acquisition means no
        // image was handed out at all; the frame is abandoned
        // before it began. A suboptimal acquire, on the other
        // hand, did hand out a usable image, so the frame
        // proceeds and the rebuild decision is left to
        // presentation.
        let Some((image_index, _)) = swapchain.acquire_next_image(&self.device)? else {
            self.recreate_swapchain(window)?;
            return Ok(None);
        };

        self.image_index = image_index;
        self.tracker.begin()?;

        // The pool was created with RESET_COMMAND_BUFFER, so
        // beginning the buffer implicitly resets whatever was
        // recorded for this image last time around.
        let command_buffer = self.command_buffers[image_index];
        let info = vk::CommandBufferBeginInfo::builder();
        self.device.begin_command_buffer(command_buffer, &info)?;

        Ok(Some(command_buffer))
    }

    /// Closes the frame: ends the command buffer, submits it,
    /// and queues the image for presentation. If presentation
    /// reports the swapchain stale, or the window was resized
    /// since the last frame, the swapchain is rebuilt here.
    pub unsafe fn end_frame(&mut self, window: &Window) -> Result<()> {
        if !self.tracker.in_progress() {
            return Err(anyhow!("Cannot end a frame while none is in progress."));
        }

        let command_buffer = self.command_buffers[self.image_index];
        self.device.end_command_buffer(command_buffer)?;

        let Some(swapchain) = self.swapchain.as_mut() else {
            return Err(anyhow!("No swapchain to present to."));
        };

        let status = swapchain.submit_command_buffers(
            &self.device,
            &self.data,
            command_buffer,
            self.image_index,
        )?;

        // The frame is over whatever presentation reported;
        // the slot index advances before any rebuild.
        self.tracker.end()?;

        if status.needs_rebuild() || self.resized {
            self.resized = false;
            self.recreate_swapchain(window)?;
        }

        Ok(())
    }

    /// Starts the swapchain render pass on the frame's command
    /// buffer, clearing both attachments and setting the
    /// viewport and scissor to the full extent.
    pub unsafe fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        self.check_frame_buffer(command_buffer)?;

        let Some(swapchain) = self.swapchain.as_ref() else {
            return Err(anyhow!("No swapchain to render to."));
        };

        // Two clear values, in attachment order: a near-black
        // color for the swapchain image, and the farthest
        // possible depth (1.0 in Vulkan's 0..1 range) for the
        // depth buffer.
        let color_clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.01, 0.01, 0.01, 0.1],
            },
        };

        let depth_clear_value = vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        };

        let extent = swapchain.extent();
        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(extent);

        // INLINE means the pass commands are recorded directly
        // in this primary buffer, with no secondary buffers.
        let clear_values = &[color_clear_value, depth_clear_value];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(swapchain.render_pass)
            .framebuffer(swapchain.framebuffers[self.image_index])
            .render_area(render_area)
            .clear_values(clear_values);

        self.device.cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);

        // Viewport and scissor are dynamic pipeline state, set
        // here once per pass so that pipelines don't have to
        // be rebuilt when the swapchain extent changes.
        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(extent);

        self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);

        Ok(())
    }

    pub unsafe fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        self.check_frame_buffer(command_buffer)?;
        self.device.cmd_end_render_pass(command_buffer);
        Ok(())
    }

    // Render pass brackets only make sense inside a frame, and
    // only on the command buffer begin_frame handed out.
    fn check_frame_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        if !self.tracker.in_progress() {
            return Err(anyhow!("No frame in progress."));
        }

        if command_buffer != self.command_buffers[self.image_index] {
            return Err(anyhow!("Command buffer does not belong to the current frame."));
        }

        Ok(())
    }

    /// Rebuilds the swapchain at the window's current size. If
    /// the window has no drawable area (it is minimized), the
    /// rebuild is deferred: nothing is destroyed, and the next
    /// `begin_frame` retries once there is something to render
    /// to.
    unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        let extent = window_extent(window);
        if !self.rebuild_gate.request(extent) {
            return Ok(());
        }

        self.device.device_wait_idle()?;

        // The old swapchain is moved into the constructor of
        // the new one, which uses its handle as a creation
        // hint and destroys it.
        let old = self.swapchain.take();
        let old_count = old.as_ref().map(|s| s.image_count());
        let swapchain = Swapchain::new(&self.instance, &self.device, &self.data, extent, old)?;

        // Command buffers are paired with swapchain images, so
        // a different image count invalidates the whole set.
        if Some(swapchain.image_count()) != old_count {
            free_command_buffers(&self.device, &self.data, &self.command_buffers);
            self.command_buffers =
                allocate_command_buffers(&self.device, &self.data, swapchain.image_count() as u32)?;
        }

        self.swapchain = Some(swapchain);
        Ok(())
    }

    /// Loads an OBJ file and uploads it to the device.
    pub unsafe fn load_model(&self, path: impl AsRef<std::path::Path>) -> Result<Model> {
        Model::from_file(&self.instance, &self.device, &self.data, path)
    }

    /// Flags that the window was resized; the swapchain is
    /// rebuilt at the end of the current (or next) frame.
    pub fn mark_resized(&mut self) {
        self.resized = true;
    }

    pub fn render_pass(&self) -> Result<vk::RenderPass> {
        self.swapchain
            .as_ref()
            .map(|s| s.render_pass)
            .ok_or(anyhow!("No swapchain."))
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain
            .as_ref()
            .map(|s| s.aspect_ratio())
            .unwrap_or(1.0)
    }

    pub unsafe fn device_wait_idle(&self) -> Result<()> {
        self.device.device_wait_idle()?;
        Ok(())
    }

    pub unsafe fn destroy(&mut self) {
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&self.device);
        }

        free_command_buffers(&self.device, &self.data, &self.command_buffers);
        self.device.destroy_command_pool(self.data.command_pool, None);

        self.device.destroy_device(None);
        self.instance.destroy_surface_khr(self.data.surface, None);

        if VALIDATION_ENABLED {
            self.instance.destroy_debug_utils_messenger_ext(self.data.debug_messenger, None);
        }

        self.instance.destroy_instance(None);
        info!("Destroyed the Vulkan instance.");
    }
}

fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

unsafe fn create_instance(window: &Window, entry: &Entry, data: &mut RenderData) -> Result<Instance> {
    // Validation layers: because the Vulkan API is designed
    // around the idea of minimal driver overhead, there is
    // very little default error checking. Instead, Vulkan
    // provides "validation layers", which are optional
    // components that hook into Vulkan function calls to apply
    // additional checks and debug operations. Validation
    // layers can only be used if they have been installed onto
    // the system, for example as part of the LunarG Vulkan
    // SDK. We first need to get the list of available
    // layers...
    let available_layers = entry
        .enumerate_instance_layer_properties()?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    // ...then check if validation layers are available...
    if VALIDATION_ENABLED && !available_layers.contains(&VALIDATION_LAYER) {
        return Err(anyhow!("Validation layer not available."));
    }

    // ...and finally put in our layers list, which we will
    // give to Vulkan later.
    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    // Application info: application name and version, engine
    // name and version, and Vulkan API version. The Vulkan API
    // version is required and must be set to 1.0.0 or greater.
    let application_info = vk::ApplicationInfo::builder()
        .application_name(b"miranda-app\0")
        .application_version(vk::make_version(1, 0, 0))
        .engine_name(b"miranda\0")
        .engine_version(vk::make_version(1, 0, 0))
        .api_version(vk::make_version(1, 0, 0));

    // Extensions: enumerate the required extensions for window
    // integration and convert them to C strings.
    let mut extensions = vk_window::get_required_instance_extensions(window)
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // If the validation layers are enabled, we add the debug
    // utils extension to set up a callback for the validation
    // layer messages.
    if VALIDATION_ENABLED {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
    }

    // Some platforms have not a fully compliant Vulkan
    // implementation, and need since v1.3.216 of the Vulkan
    // API to enable special portability extensions. One of
    // those platforms is none other than macOS, so we check
    // the target OS and the Vulkan API version to enable those
    // extensions if needed.
    let flags = if
        cfg!(target_os = "macos") &&
        entry.version()? >= PORTABILITY_MACOS_VERSION
    {
        info!("Enabling extensions for macOS portability.");
        extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name.as_ptr());
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());

        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    }
    else {
        vk::InstanceCreateFlags::empty()
    };

    // Instance info: combines the application and extensions
    // info, and enables the given layers
    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .flags(flags);

    // Debug info: set up a debug messenger for the validation
    // layers, that calls our debug callback function to print
    // messages for all severity levels and types of events.
    let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
        .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
        .user_callback(Some(debug_callback));

    if VALIDATION_ENABLED {
        // Vulkan structs, like the instance info, have the
        // ability to be extended with other structs, which can
        // in turn be extended with other structs, and so on.
        // In this case, we are extending the instance info
        // with the debug info if the validation layers are
        // enabled, which will be used to create the debug
        // messenger.
        info = info.push_next(&mut debug_info);
    }

    // We can give a custom allocator to the instance, but we
    // set it here to None.
    let instance = entry.create_instance(&info, None)?;

    if VALIDATION_ENABLED {
        // Create the debug messenger in the instance with our
        // debug info and link it to our app data
        data.debug_messenger = instance.create_debug_utils_messenger_ext(&debug_info, None)?;
    }

    info!("Vulkan instance created.");
    Ok(instance)
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // The debug callback function ensures that we print
    // messages with our own log system instead of the
    // standard output. The 'extern "system"' bit links the
    // function to the system ABI, instead of the Rust one,
    // which is required for Vulkan to use it directly;
    // furthermore, the function prototype needs to match
    // that of vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    // which specifies four parameters:
    //  1) 'messageSeverity': the importance of the message,
    //     as standard DEBUG, WARNING, ERR, ..., log levels
    //  2) 'messageType': the type of event associated,
    //     either GENERAL (unrelated to the specification),
    //     VALIDATION (specification violation) or
    //     PERFORMANCE (non-optimal use of the API)
    //  3) 'pCallbackData': the debug message data
    //  4) 'pUserData': a pointer to user-defined data, here
    //     unused

    let data = unsafe { *data };
    let message = unsafe { std::ffi::CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({type_:?}) {message}");
    } else {
        trace!("({type_:?}) {message}");
    }

    // If the callback returns true, the call is aborted with a
    // VALIDATION_FAILED error code; it should therefore only
    // return true when testing the validation layers
    // themselves.
    vk::FALSE
}
