use crate::{
    camera::Camera,
    game_object::{GameObject, IdAllocator},
    model::Model,
    render_system::SimpleRenderSystem,
    renderer::Renderer,
};

use std::rc::Rc;

use glam::vec3;
use winit::window::Window;
use anyhow::Result;
use log::*;

/// The application: the window, the renderer built on it, the
/// scene (camera and game objects), and the render system that
/// draws the one into the other. Everything but the scene is
/// optional because the window only exists once the event loop
/// delivers it.
pub struct App {
    pub window: Option<Window>,
    pub renderer: Option<Renderer>,
    render_system: Option<SimpleRenderSystem>,
    camera: Camera,
    game_objects: Vec<GameObject>,
    models: Vec<Rc<Model>>,
    ids: IdAllocator,
    pub minimised: bool,
    pub resized: bool,
    pub error: Option<anyhow::Error>,
}

impl App {
    pub fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            render_system: None,
            camera: Camera::default(),
            game_objects: Vec::new(),
            models: Vec::new(),
            ids: IdAllocator::new(),
            minimised: false,
            resized: false,
            error: None,
        }
    }

    /// Builds the whole rendering stack on the freshly created
    /// window, then loads the scene.
    pub unsafe fn init(&mut self, window: Window) -> Result<()> {
        let renderer = Renderer::create(&window)?;
        let render_system = SimpleRenderSystem::new(&renderer.device, renderer.render_pass()?)?;

        self.load_game_objects(&renderer)?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.render_system = Some(render_system);

        info!("Application initialized.");
        Ok(())
    }

    unsafe fn load_game_objects(&mut self, renderer: &Renderer) -> Result<()> {
        // The model list owns the uploaded meshes; game objects
        // hold shared handles, so several objects can render
        // the same mesh.
        let cube = Rc::new(renderer.load_model("models/cube.obj")?);
        self.models.push(cube.clone());

        let mut object = GameObject::new(&mut self.ids);
        object.model = Some(cube);
        object.transform.translation = vec3(0.0, 0.0, 2.5);
        object.transform.scale = vec3(0.5, 0.5, 0.5);
        self.game_objects.push(object);

        Ok(())
    }

    /// Renders one frame. If the swapchain had to be rebuilt
    /// instead of handing out an image, the frame is simply
    /// skipped.
    pub unsafe fn render(&mut self) -> Result<()> {
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        let Some(render_system) = self.render_system.as_ref() else {
            return Ok(());
        };

        if self.resized {
            self.resized = false;
            renderer.mark_resized();
        }

        // The camera is reconfigured every frame so that the
        // projection follows the swapchain's aspect ratio
        // across resizes without distorting the scene.
        self.camera.set_view_target(vec3(-1.0, -2.0, 2.0), vec3(0.0, 0.0, 2.5));
        self.camera.set_perspective_projection(
            50f32.to_radians(),
            renderer.aspect_ratio(),
            0.1,
            10.0,
        );

        if let Some(command_buffer) = renderer.begin_frame(window)? {
            renderer.begin_swapchain_render_pass(command_buffer)?;
            render_system.render_game_objects(
                &renderer.device,
                command_buffer,
                &self.game_objects,
                &self.camera,
            );
            renderer.end_swapchain_render_pass(command_buffer)?;
            renderer.end_frame(window)?;
        }

        Ok(())
    }

    /// Tears the application down in reverse creation order.
    /// Render operations are asynchronous, so the device is
    /// drained first; destroying resources the GPU is still
    /// using would be an error.
    pub unsafe fn destroy(&mut self) {
        let Some(mut renderer) = self.renderer.take() else {
            return;
        };

        if let Err(e) = renderer.device_wait_idle() {
            warn!("Failed to wait for the device on shutdown: {e}");
        }

        self.game_objects.clear();
        for model in self.models.drain(..) {
            model.destroy(&renderer.device);
        }

        if let Some(render_system) = self.render_system.take() {
            render_system.destroy(&renderer.device);
        }

        renderer.destroy();
        self.window = None;
        info!("Destroyed the app.");
    }
}
