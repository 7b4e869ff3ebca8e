//! The render session: everything one host needs to load effects and run them each frame.
//!
//! A session replaces process-wide state. It owns the virtual parameter namespace, the
//! named textures (staging textures included), the program compiler and the renderer, so
//! several independent sessions can live side by side.

use std::path::Path;

use crate::asset::{AssetCache, Handle};
use crate::effect::{
    Effect, EffectDescription, Linker, Parameter, ParameterRegistry, ParameterType,
    ProgramCompiler,
};
use crate::error::{DeviceError, EffectError, LinkError};
use crate::io::{self, SearchPathFileSystem, Verbatim};
use crate::renderer::{EffectRenderer, FrameReport, Geometry, RenderDevice, Surface};
use crate::settings::EffectSettings;
use crate::texture::{staging, Texture, TextureDesc, TextureRegistry};
use crate::time::FrameClock;

/// Result of loading one effect. `errors` holds the non-fatal link problems; the effect is
/// loaded either way and is skipped at draw time if it ended up with no valid technique.
#[derive(Debug)]
pub struct LoadedEffect {
    pub id: Handle<Effect>,
    pub errors: Vec<LinkError>,
}

struct Builtins {
    time: Parameter,
    frame: Parameter,
    resolution: Parameter,
}

impl Builtins {
    const TIME: &'static str = "time";
    const FRAME: &'static str = "frame";
    const RESOLUTION: &'static str = "resolution";

    fn register(parameters: &mut ParameterRegistry) -> Result<Self, LinkError> {
        Ok(Self {
            time: parameters.create_virtual(Self::TIME, ParameterType::Float1)?,
            frame: parameters.create_virtual(Self::FRAME, ParameterType::Float1)?,
            resolution: parameters.create_virtual(Self::RESOLUTION, ParameterType::Float2)?,
        })
    }
}

pub struct RenderSession<D: RenderDevice> {
    settings: EffectSettings,
    parameters: ParameterRegistry,
    textures: TextureRegistry,
    compiler: ProgramCompiler,
    renderer: EffectRenderer<D>,
    effects: AssetCache<Effect>,
    clock: FrameClock,
    builtins: Option<Builtins>,
}

impl<D: RenderDevice> RenderSession<D> {
    /// Session with a search-path file system over `settings.search_paths` and no variable
    /// substitution.
    pub fn new(device: D, settings: EffectSettings) -> Result<Self, LinkError> {
        let compiler = ProgramCompiler::new(
            Box::new(SearchPathFileSystem::new(settings.search_paths.clone())),
            Box::new(Verbatim),
        );
        Self::with_compiler(device, settings, compiler)
    }

    /// Session whose file lookups and variable expansion go through `compiler`.
    pub fn with_compiler(
        device: D,
        settings: EffectSettings,
        compiler: ProgramCompiler,
    ) -> Result<Self, LinkError> {
        let mut renderer = EffectRenderer::new(device, settings.half_pixel_offset);
        let mut textures = TextureRegistry::new();

        let (width, height) = renderer.device().backbuffer_size();
        let desc = TextureDesc::render_target(width, height, settings.staging_format);
        for name in staging::ALL {
            let backing = renderer.device_mut().create_texture(name, &desc)?;
            textures.register(name, backing, desc)?;
        }

        let mut parameters = ParameterRegistry::new();
        let builtins = if settings.builtin_parameters {
            Some(Builtins::register(&mut parameters)?)
        } else {
            None
        };

        log::info!(
            "Render session ready: {}x{} staging in {:?}, builtins {}",
            width,
            height,
            settings.staging_format,
            if builtins.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            settings,
            parameters,
            textures,
            compiler,
            renderer,
            effects: AssetCache::default(),
            clock: FrameClock::new(),
            builtins,
        })
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn parameters(&self) -> &ParameterRegistry {
        &self.parameters
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn renderer(&self) -> &EffectRenderer<D> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut EffectRenderer<D> {
        &mut self.renderer
    }

    pub fn device(&self) -> &D {
        self.renderer.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.renderer.device_mut()
    }

    /// Create a blank render target and register it under `name`.
    pub fn create_texture(
        &mut self,
        name: &str,
        desc: TextureDesc,
    ) -> Result<Handle<Texture>, LinkError> {
        if self.textures.contains(name) {
            return Err(LinkError::DuplicateTextureName(name.to_string()));
        }
        let backing = self.renderer.device_mut().create_texture(name, &desc)?;
        self.textures.register(name, backing, desc)
    }

    pub fn create_virtual(&mut self, name: &str, ty: ParameterType) -> Result<Parameter, LinkError> {
        self.parameters.create_virtual(name, ty)
    }

    pub fn attach(&self, target: &Parameter, source: &Parameter) -> Result<(), LinkError> {
        self.parameters.attach(target, source)
    }

    /// Load an effect file. Relative paths that don't exist as given are looked up through
    /// the session's file system.
    pub fn load_effect(&mut self, path: impl AsRef<Path>) -> Result<LoadedEffect, EffectError> {
        let path = path.as_ref();
        let resolved = if path.exists() {
            path.to_path_buf()
        } else {
            self.compiler
                .resolve_file(&path.to_string_lossy())
                .unwrap_or_else(|| path.to_path_buf())
        };

        let contents = io::load_text(&resolved).map_err(|reason| EffectError::Io {
            path: resolved.clone(),
            reason,
        })?;
        log::info!("Loading effect from {:?}", resolved);
        self.load_effect_from_str(&resolved.to_string_lossy(), &contents)
    }

    /// Parse, compile and link an effect document. `name` only identifies the document in
    /// errors.
    pub fn load_effect_from_str(
        &mut self,
        name: &str,
        contents: &str,
    ) -> Result<LoadedEffect, EffectError> {
        let description = EffectDescription::from_json(name, contents)?;
        let mut effect = Effect::compile(&description, &self.compiler)?;

        let report = Linker::new(
            &self.parameters,
            &mut self.textures,
            &self.compiler,
            self.renderer.device_mut(),
        )
        .link(&mut effect);

        let id = self.effects.insert(effect);
        Ok(LoadedEffect {
            id,
            errors: report.errors,
        })
    }

    pub fn effect(&self, id: Handle<Effect>) -> Option<&Effect> {
        self.effects.get(id)
    }

    /// Loaded effects in load order.
    pub fn effects(&self) -> impl Iterator<Item = (Handle<Effect>, &Effect)> {
        self.effects.iter()
    }

    /// Drop an effect. Its parameters detach from their globals as they are dropped.
    pub fn unload_effect(&mut self, id: Handle<Effect>) -> Option<Effect> {
        self.renderer.unbind_pass();
        let effect = self.effects.remove(id)?;
        log::info!("Unloaded effect '{}'", effect.name());
        Some(effect)
    }

    /// Point a sampler parameter of a loaded effect at a registered texture.
    pub fn connect_texture(&mut self, id: Handle<Effect>, parameter: &str, texture: &str) -> bool {
        let Some(handle) = self.textures.find(texture) else {
            log::warn!("Cannot connect unregistered texture '{}'", texture);
            return false;
        };
        let Some(parameter) = self.effects.get(id).and_then(|effect| effect.parameter(parameter))
        else {
            return false;
        };
        self.renderer
            .connect_texture(parameter, handle, &self.textures)
    }

    /// Run every loaded effect once, in load order, over the current backbuffer.
    ///
    /// The backbuffer is copied into `:thisframe` before the first effect and into
    /// `:lastframe` after the last one. Device loss aborts the frame.
    pub fn render_frame(
        &mut self,
        geometry: Option<&Geometry>,
    ) -> Result<Vec<FrameReport>, DeviceError> {
        if self.renderer.device().is_lost() {
            return Err(DeviceError::Lost);
        }

        let time = self.clock.tick();
        if let Some(builtins) = &self.builtins {
            let (width, height) = self.renderer.device().backbuffer_size();
            builtins.time.set_float(time.elapsed);
            builtins.frame.set_float(time.frame as f32);
            builtins
                .resolution
                .set_scalar(&[width as f32, height as f32]);
        }

        self.snapshot(staging::THIS_FRAME)?;

        let mut reports = Vec::with_capacity(self.effects.len());
        for (_, effect) in self.effects.iter() {
            let report = self
                .renderer
                .draw_effect(effect, &self.textures, geometry)?;
            log::trace!(
                "Effect '{}': {} pass(es) drawn",
                effect.name(),
                report.passes_drawn
            );
            reports.push(report);
        }

        self.snapshot(staging::LAST_FRAME)?;
        Ok(reports)
    }

    fn snapshot(&mut self, name: &str) -> Result<(), DeviceError> {
        let Some(texture) = self.textures.by_name(name) else {
            return Ok(());
        };
        let destination = Surface::Texture(texture.backing);
        match self
            .renderer
            .device_mut()
            .stretch_copy(Surface::Backbuffer, destination)
        {
            Ok(()) => Ok(()),
            Err(DeviceError::Lost) => Err(DeviceError::Lost),
            Err(err) => {
                log::error!("Backbuffer copy into '{}' failed: {}", name, err);
                Ok(())
            }
        }
    }
}
