//! The seam between the effect engine and a real graphics device.

use std::path::Path;

use crate::effect::{CompiledProgram, Profile, Stage};
use crate::error::DeviceError;
use crate::renderer::quad::Geometry;
use crate::texture::{TextureDesc, TextureId};

/// Something the device can render into or copy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Backbuffer,
    /// The composition surface every pass draws into.
    Scratch,
    Texture(TextureId),
}

/// Device-side handle of a loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// Everything the effect engine needs from a graphics device.
///
/// Calls are made from one thread, once per displayed frame. Implementations report
/// device loss through [`DeviceError::Lost`] and [`RenderDevice::is_lost`].
pub trait RenderDevice {
    /// Host-visible state (stream source, vertex format, render states) that drawing an
    /// effect must not leak.
    type State;

    fn backbuffer_size(&self) -> (u32, u32);

    fn supports_profile(&self, profile: &Profile) -> bool;

    /// Whether these programs, all belonging to one pass, can be loaded and bound together.
    fn validate_programs(&mut self, programs: &[&CompiledProgram]) -> Result<(), DeviceError>;

    fn create_texture(&mut self, name: &str, desc: &TextureDesc) -> Result<TextureId, DeviceError>;

    fn load_texture(&mut self, name: &str, path: &Path)
        -> Result<(TextureId, TextureDesc), DeviceError>;

    /// Create the device object for `program`. Called at most once per program key.
    fn load_program(&mut self, program: &CompiledProgram) -> Result<ProgramId, DeviceError>;

    fn bind_program(&mut self, stage: Stage, program: ProgramId) -> Result<(), DeviceError>;

    /// Release the stage from the binding layer; the program object stays loaded.
    fn unbind_program(&mut self, stage: Stage);

    /// Upload whole vec4 registers starting at `register`.
    fn set_constants(&mut self, program: ProgramId, register: u32, values: &[f32]);

    fn set_sampler(&mut self, program: ProgramId, slot: u32, texture: TextureId);

    fn render_target(&self) -> Surface;

    fn set_render_target(&mut self, target: Surface) -> Result<(), DeviceError>;

    fn capture_state(&self) -> Self::State;

    fn restore_state(&mut self, state: Self::State);

    /// Depth test, alpha blending and culling off.
    fn set_effect_state(&mut self);

    /// Draw with the currently bound programs into the current render target.
    fn draw(&mut self, geometry: &Geometry) -> Result<(), DeviceError>;

    /// Unfiltered stretch copy of a whole surface.
    fn stretch_copy(&mut self, source: Surface, destination: Surface) -> Result<(), DeviceError>;

    fn is_lost(&self) -> bool;
}
