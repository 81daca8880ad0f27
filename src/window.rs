use crate::app::App;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::Window,
};
use anyhow::anyhow;
use log::error;

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attr = Window::default_attributes()
            .with_title("miranda")
            .with_inner_size(LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attr) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create the window: {e}");
                self.error = Some(anyhow!(e));
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = unsafe { self.init(window) } {
            error!("Failed to initialize the application: {e}");
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                // Teardown waits for the device internally, so
                // no in-flight frame is destroyed under the
                // GPU.
                unsafe { self.destroy() };
                event_loop.exit();
            },
            WindowEvent::Resized(size) => {
                // A zero-sized window has nothing to present
                // to; rendering pauses until it grows back.
                if size.width == 0 || size.height == 0 {
                    self.minimised = true;
                } else {
                    self.minimised = false;
                    self.resized = true;
                }
            },
            WindowEvent::RedrawRequested => {
                if self.minimised {
                    return;
                }

                // A render error is fatal: remember it for the
                // process exit code, tear down, and leave the
                // loop.
                if let Err(e) = unsafe { self.render() } {
                    error!("Render failed: {e}");
                    self.error = Some(e);
                    unsafe { self.destroy() };
                    event_loop.exit();
                }
            },
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        // Continuous rendering: ask for a new frame as soon as
        // the previous batch of events is processed.
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}
