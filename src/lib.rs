pub mod app;
pub mod asset;
pub mod effect;
pub mod error;
pub mod io;
pub mod renderer;
pub mod session;
pub mod settings;
pub mod texture;
pub mod time;

use std::path::PathBuf;

use app::EffectHost;
use winit::event_loop::EventLoop;

pub use effect::{Effect, Parameter, ParameterType, Stage};
pub use error::{BindError, CompileError, DeviceError, EffectError, LinkError};
pub use renderer::{EffectRenderer, FrameReport, HeadlessDevice, RenderDevice, WgpuDevice};
pub use session::{LoadedEffect, RenderSession};
pub use settings::EffectSettings;

/// Install `env_logger` with the configured filter. `RUST_LOG` still wins when set.
/// Safe to call more than once.
pub fn init_logging(settings: &EffectSettings) {
    let _ = env_logger::Builder::new()
        .parse_filters(&settings.log_filter)
        .parse_default_env()
        .try_init();
}

/// Open a window and run the given effect files over it every frame.
pub fn run(effect_paths: Vec<PathBuf>) -> Result<(), winit::error::EventLoopError> {
    let settings = EffectSettings::load();
    init_logging(&settings);

    log::info!("Starting effect host with {} effect(s)", effect_paths.len());

    let event_loop = EventLoop::new()?;
    let mut app = EffectHost::new(settings, effect_paths);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    result
}
