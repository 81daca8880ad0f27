mod app;
mod buffers;
mod camera;
mod commands;
mod depth;
mod devices;
mod frame;
mod game_object;
mod image;
mod model;
mod pipeline;
mod queues;
mod render_system;
mod renderer;
mod swapchain;
mod window;

use winit::event_loop::{ControlFlow, EventLoop};
use anyhow::Result;

use app::App;

fn main() -> Result<()> {
    std::env::set_var("RUST_LOG", "info");
    pretty_env_logger::init();

    // Poll rather than wait: the scene renders continuously,
    // with redraws requested from the handler itself.
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    // Fatal errors inside the event loop are stashed on the
    // app, since the handler callbacks cannot return them.
    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
