//! Per-frame execution of a linked effect.
//!
//! Every pass draws into the scratch surface; the scratch is then stretch-copied into
//! the pass target (`:lastpass` unless annotated otherwise), which becomes the running
//! result. When the technique ends the running result is copied into the technique target
//! and, when that target is the `:lastshader` default, onto the backbuffer.

use std::collections::HashMap;
use std::rc::Rc;

use crate::asset::Handle;
use crate::effect::{
    ConstantTable, Effect, Parameter, ParameterCategory, Pass, ProgramKey, Stage, TargetBinding,
    Technique,
};
use crate::error::{BindError, DeviceError};
use crate::renderer::device::{ProgramId, RenderDevice, Surface};
use crate::renderer::quad::{FullscreenQuad, Geometry};
use crate::texture::{Texture, TextureRegistry};

/// Outcome of drawing one effect for one frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameReport {
    pub passes_drawn: usize,
    pub bind_errors: Vec<BindError>,
    /// Set when nothing was drawn because the effect has no usable technique.
    pub skipped: bool,
}

impl FrameReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

struct BoundProgram {
    stage: Stage,
    id: ProgramId,
    constants: Rc<ConstantTable>,
}

struct BoundPass {
    label: String,
    programs: Vec<BoundProgram>,
}

/// Drives a [`RenderDevice`] through the pass protocol. Holds the single bound-pass slot,
/// so one renderer must never be shared between concurrent draws.
pub struct EffectRenderer<D: RenderDevice> {
    device: D,
    quad: FullscreenQuad,
    loaded: HashMap<ProgramKey, ProgramId>,
    bound: Option<BoundPass>,
}

impl<D: RenderDevice> EffectRenderer<D> {
    pub fn new(device: D, half_pixel_offset: bool) -> Self {
        let (width, height) = device.backbuffer_size();
        Self {
            device,
            quad: FullscreenQuad::new(width, height, half_pixel_offset),
            loaded: HashMap::new(),
            bound: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn quad(&self) -> &FullscreenQuad {
        &self.quad
    }

    /// Label of the currently bound pass, if any.
    pub fn bound_pass(&self) -> Option<&str> {
        self.bound.as_ref().map(|bound| bound.label.as_str())
    }

    pub fn loaded_program_count(&self) -> usize {
        self.loaded.len()
    }

    /// Load every stage program of `pass` that isn't loaded yet.
    pub fn load_pass(&mut self, pass: &Pass) -> Result<(), BindError> {
        for program in pass.programs() {
            if self.loaded.contains_key(&program.key()) {
                continue;
            }
            let id = self
                .device
                .load_program(program)
                .map_err(|err| BindError::ProgramLoadFailed {
                    stage: program.stage(),
                    program: program.label().to_string(),
                    reason: err.to_string(),
                })?;
            log::trace!("Loaded {} as {:?}", program.label(), id);
            self.loaded.insert(program.key(), id);
        }
        Ok(())
    }

    /// Load and bind `pass`, then upload every effect parameter its programs reference.
    ///
    /// Stages without a program are left as they are. If any stage fails, the stages
    /// already bound for this pass are released before returning.
    pub fn bind_pass(
        &mut self,
        effect: &Effect,
        pass: &Pass,
        textures: &TextureRegistry,
    ) -> Result<(), BindError> {
        self.unbind_pass();
        self.load_pass(pass)?;

        let mut bound = BoundPass {
            label: format!("{}/{}/{}", effect.name(), pass.technique_name(), pass.name()),
            programs: Vec::new(),
        };

        for program in pass.programs() {
            let stage = program.stage();
            let result = match self.loaded.get(&program.key()).copied() {
                Some(id) => self.device.bind_program(stage, id).map(|_| id),
                None => Err(DeviceError::InvalidCall("program was never loaded".into())),
            };
            match result {
                Ok(id) => bound.programs.push(BoundProgram {
                    stage,
                    id,
                    constants: program.shared_constants(),
                }),
                Err(err) => {
                    for partial in &bound.programs {
                        self.device.unbind_program(partial.stage);
                    }
                    return Err(BindError::ProgramBindFailed {
                        stage,
                        program: program.label().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.bound = Some(bound);
        for parameter in effect.parameters() {
            self.apply_parameter(parameter, textures);
        }
        Ok(())
    }

    /// Release the bound stages from the binding layer. Loaded programs stay loaded.
    pub fn unbind_pass(&mut self) {
        if let Some(bound) = self.bound.take() {
            for program in &bound.programs {
                self.device.unbind_program(program.stage);
            }
        }
    }

    /// Upload `parameter` to every bound program that references it.
    /// Returns false when nothing was uploaded.
    pub fn apply_parameter(&mut self, parameter: &Parameter, textures: &TextureRegistry) -> bool {
        let Some(bound) = &self.bound else {
            return false;
        };

        let mut applied = false;
        for program in &bound.programs {
            match parameter.category() {
                ParameterCategory::Scalar => {
                    if let Some(slot) = program.constants.constant(parameter.name()) {
                        let values = parameter.scalar();
                        let count = (slot.registers as usize * 4).min(values.len());
                        self.device
                            .set_constants(program.id, slot.register, &values[..count]);
                        applied = true;
                    }
                }
                ParameterCategory::Sampler => {
                    let slot = program.constants.sampler(parameter.name());
                    let texture = parameter.texture().and_then(|handle| textures.get(handle));
                    if let (Some(slot), Some(texture)) = (slot, texture) {
                        self.device.set_sampler(program.id, slot.slot, texture.backing);
                        applied = true;
                    }
                }
            }
        }
        applied
    }

    /// Point a sampler parameter at `texture` and upload it if a pass is bound.
    /// Scalar parameters store the handle but never sample it; returns false for them.
    pub fn connect_texture(
        &mut self,
        parameter: &Parameter,
        texture: Handle<Texture>,
        textures: &TextureRegistry,
    ) -> bool {
        parameter.set_texture(Some(texture));
        if parameter.category() != ParameterCategory::Sampler {
            log::debug!("'{}' is not a sampler; texture ignored", parameter.name());
            return false;
        }
        self.apply_parameter(parameter, textures);
        true
    }

    /// Draw the effect's default technique. Effects without one are skipped.
    pub fn draw_effect(
        &mut self,
        effect: &Effect,
        textures: &TextureRegistry,
        geometry: Option<&Geometry>,
    ) -> Result<FrameReport, DeviceError> {
        match effect.default_technique() {
            Some(technique) => self.draw_technique(effect, technique, textures, geometry),
            None => {
                log::debug!("Skipping effect '{}': no valid technique", effect.name());
                Ok(FrameReport::skipped())
            }
        }
    }

    pub fn draw_technique(
        &mut self,
        effect: &Effect,
        technique: &Technique,
        textures: &TextureRegistry,
        geometry: Option<&Geometry>,
    ) -> Result<FrameReport, DeviceError> {
        if !technique.is_valid() {
            log::debug!(
                "Skipping technique '{}' of '{}': not valid",
                technique.name(),
                effect.name()
            );
            return Ok(FrameReport::skipped());
        }
        if self.device.is_lost() {
            return Err(DeviceError::Lost);
        }

        let (width, height) = self.device.backbuffer_size();
        if self.quad.fit(width, height) {
            log::debug!("Rebuilt full-screen quad at {}x{}", width, height);
        }

        let original = self.device.render_target();
        let result = self.run_passes(effect, technique, textures, geometry);

        if let Err(err) = self.device.set_render_target(original) {
            log::error!("Failed to restore the render target: {}", err);
        }
        if let Err(err) = &result {
            log::error!(
                "Technique '{}' of '{}' aborted: {}",
                technique.name(),
                effect.name(),
                err
            );
        }
        result
    }

    fn run_passes(
        &mut self,
        effect: &Effect,
        technique: &Technique,
        textures: &TextureRegistry,
        geometry: Option<&Geometry>,
    ) -> Result<FrameReport, DeviceError> {
        self.device.set_render_target(Surface::Scratch)?;

        let mut report = FrameReport::default();
        let mut running = None;

        for pass in technique.passes() {
            if !pass.is_valid() {
                log::trace!("Pass '{}' failed validation; not drawn", pass.name());
                continue;
            }

            if let Err(err) = self.bind_pass(effect, pass, textures) {
                if self.device.is_lost() {
                    return Err(DeviceError::Lost);
                }
                log::error!("Skipping pass '{}' of '{}': {}", pass.name(), effect.name(), err);
                report.bind_errors.push(err);
                continue;
            }

            let drawn = self.draw_bound(geometry);
            self.unbind_pass();
            if let Err(err) = drawn {
                if err == DeviceError::Lost || self.device.is_lost() {
                    return Err(DeviceError::Lost);
                }
                log::error!("Draw of pass '{}' failed: {}", pass.name(), err);
                continue;
            }

            let destination = target_surface(pass.target(), textures);
            if self.copy(Surface::Scratch, destination)? {
                running = Some(destination);
                report.passes_drawn += 1;
            }
        }

        if let Some(result) = running {
            let target = technique.target();
            let destination = target_surface(target, textures);
            if result != destination {
                self.copy(result, destination)?;
            }
            let is_default = target.map_or(false, |binding| !binding.explicit);
            if is_default && destination != Surface::Backbuffer {
                self.copy(destination, Surface::Backbuffer)?;
            }
        }

        Ok(report)
    }

    fn draw_bound(&mut self, geometry: Option<&Geometry>) -> Result<(), DeviceError> {
        let state = self.device.capture_state();
        self.device.set_effect_state();
        let result = match geometry {
            Some(geometry) => self.device.draw(geometry),
            None => self.device.draw(self.quad.geometry()),
        };
        self.device.restore_state(state);
        result
    }

    /// Stretch copy that only escalates device loss. Returns whether the copy happened.
    fn copy(&mut self, source: Surface, destination: Surface) -> Result<bool, DeviceError> {
        match self.device.stretch_copy(source, destination) {
            Ok(()) => Ok(true),
            Err(DeviceError::Lost) => Err(DeviceError::Lost),
            Err(err) => {
                log::error!("Copy {:?} -> {:?} failed: {}", source, destination, err);
                Ok(false)
            }
        }
    }
}

fn target_surface(binding: Option<TargetBinding>, textures: &TextureRegistry) -> Surface {
    binding
        .and_then(|binding| textures.get(binding.texture))
        .map_or(Surface::Backbuffer, |texture| Surface::Texture(texture.backing))
}
