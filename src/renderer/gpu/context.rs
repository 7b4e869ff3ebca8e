use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use winit::window::Window;

use crate::error::DeviceError;

pub(crate) struct PresentSurface {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) config: wgpu::SurfaceConfiguration,
}

/// Adapter, device and queue, plus the window surface when there is one.
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) surface: Option<PresentSurface>,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub async fn for_window(window: Arc<Window>) -> Result<Self, DeviceError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|err| DeviceError::InvalidCall(format!("create surface: {}", err)))?;
        log::info!("Surface created successfully!");

        let (adapter, device, queue) = Self::request(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| DeviceError::InvalidCall("surface has no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self::finish(
            device,
            queue,
            Some(PresentSurface { surface, config }),
        ))
    }

    /// A device with nothing to present to; used by tools and GPU tests.
    pub async fn headless() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let (_, device, queue) = Self::request(&instance, None).await?;
        Ok(Self::finish(device, queue, None))
    }

    async fn request(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), DeviceError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| DeviceError::InvalidCall(format!("request adapter: {}", err)))?;

        log::info!("Using adapter: {:?}", adapter.get_info());
        log::info!("Using backend: {:?}", adapter.get_info().backend);

        let mut required_features = wgpu::Features::empty();
        if adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE) {
            required_features |= wgpu::Features::FLOAT32_FILTERABLE;
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Effect device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| DeviceError::InvalidCall(format!("request device: {}", err)))?;

        Ok((adapter, device, queue))
    }

    fn finish(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<PresentSurface>,
    ) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("Device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::SeqCst);
        });

        Self {
            device,
            queue,
            surface,
            lost,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(present) = self.surface.as_mut() {
            present.config.width = width;
            present.config.height = height;
            present.surface.configure(&self.device, &present.config);
        }
    }

    /// Run `f` inside a validation error scope and turn a captured error into a `DeviceError`.
    pub(crate) fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(DeviceError::InvalidCall(err.to_string())),
            None => Ok(value),
        }
    }
}
