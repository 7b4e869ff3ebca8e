// app.rs
use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::error::DeviceError;
use crate::renderer::{GpuContext, WgpuDevice};
use crate::session::RenderSession;
use crate::settings::EffectSettings;

/// Colour the host "renders" before the effects run.
const HOST_CLEAR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.12,
    b: 0.2,
    a: 1.0,
};

/// Window host: clears the backbuffer, runs every loaded effect over it and presents.
pub struct EffectHost {
    settings: EffectSettings,
    effect_paths: Vec<PathBuf>,
    window: Option<Arc<Window>>,
    window_id: Option<WindowId>,
    session: Option<RenderSession<WgpuDevice>>,
}

impl EffectHost {
    pub fn new(settings: EffectSettings, effect_paths: Vec<PathBuf>) -> Self {
        Self {
            settings,
            effect_paths,
            window: None,
            window_id: None,
            session: None,
        }
    }

    fn start(&mut self, window: Arc<Window>) -> Result<RenderSession<WgpuDevice>, String> {
        let size = window.inner_size();
        let context =
            pollster::block_on(GpuContext::for_window(window)).map_err(|err| err.to_string())?;
        let device = WgpuDevice::new(context, size.width, size.height);
        let mut session =
            RenderSession::new(device, self.settings.clone()).map_err(|err| err.to_string())?;

        for path in &self.effect_paths {
            match session.load_effect(path) {
                Ok(loaded) => {
                    for err in &loaded.errors {
                        log::warn!("{:?}: {}", path, err);
                    }
                }
                Err(err) => log::error!("Failed to load {:?}: {}", path, err),
            }
        }
        Ok(session)
    }

    fn redraw(session: &mut RenderSession<WgpuDevice>) -> Result<(), DeviceError> {
        session.device_mut().clear_backbuffer(HOST_CLEAR);
        for report in session.render_frame(None)? {
            for err in &report.bind_errors {
                log::debug!("Pass skipped this frame: {}", err);
            }
        }
        session.device_mut().present()
    }
}

impl ApplicationHandler for EffectHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop
            .create_window(Window::default_attributes().with_title("wgpu effects"))
        {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        match self.start(Arc::clone(&window)) {
            Ok(session) => self.session = Some(session),
            Err(err) => {
                log::error!("Failed to start the effect session: {}", err);
                event_loop.exit();
                return;
            }
        }

        self.window_id = Some(window.id());
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if Some(id) != self.window_id {
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                session.device_mut().resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = Self::redraw(session) {
                    log::error!("Frame failed: {}", err);
                    if err == DeviceError::Lost {
                        event_loop.exit();
                        return;
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
