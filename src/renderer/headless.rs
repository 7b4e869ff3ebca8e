//! A device without a GPU.
//!
//! Every surface carries a content tag instead of pixels: a draw stamps the label of the
//! bound fragment program onto the render target and copies move tags between surfaces.
//! That is enough to follow a frame through the pass chain, which makes this device the
//! backbone of the test suite and useful for dry-running effect files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::effect::{CompiledProgram, Profile, Stage};
use crate::error::DeviceError;
use crate::renderer::device::{ProgramId, RenderDevice, Surface};
use crate::renderer::quad::Geometry;
use crate::texture::{TextureDesc, TextureId};

/// Host render state the effect engine must put back after drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessState {
    pub depth_test: bool,
    pub alpha_blend: bool,
    pub culling: bool,
    pub stream: Option<String>,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            depth_test: true,
            alpha_blend: true,
            culling: true,
            stream: Some("host".to_string()),
        }
    }
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    LoadProgram(String),
    BindProgram(Stage, String),
    UnbindProgram(Stage),
    SetRenderTarget(Surface),
    Draw {
        target: Surface,
        indices: usize,
        state: HeadlessState,
    },
    Copy {
        source: Surface,
        destination: Surface,
    },
}

#[derive(Debug)]
struct HeadlessProgram {
    label: String,
    stage: Stage,
    constants: BTreeMap<u32, [f32; 4]>,
    samplers: BTreeMap<u32, TextureId>,
}

#[derive(Debug)]
struct HeadlessTexture {
    name: String,
    desc: TextureDesc,
}

pub struct HeadlessDevice {
    size: (u32, u32),
    unsupported_profiles: HashSet<String>,
    failing_binds: HashSet<String>,
    failing_loads: HashSet<String>,
    lose_after_draws: Option<usize>,
    lost: bool,

    next_id: u64,
    textures: HashMap<TextureId, HeadlessTexture>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    bound: [Option<ProgramId>; Stage::COUNT],
    contents: HashMap<Surface, String>,
    render_target: Surface,
    state: HeadlessState,
    calls: Vec<DeviceCall>,
}

impl HeadlessDevice {
    pub const BACKBUFFER_CONTENT: &'static str = "backbuffer";

    pub fn new(width: u32, height: u32) -> Self {
        let mut contents = HashMap::new();
        contents.insert(Surface::Backbuffer, Self::BACKBUFFER_CONTENT.to_string());
        Self {
            size: (width.max(1), height.max(1)),
            unsupported_profiles: HashSet::new(),
            failing_binds: HashSet::new(),
            failing_loads: HashSet::new(),
            lose_after_draws: None,
            lost: false,
            next_id: 1,
            textures: HashMap::new(),
            programs: HashMap::new(),
            bound: [None; Stage::COUNT],
            contents,
            render_target: Surface::Backbuffer,
            state: HeadlessState::default(),
            calls: Vec::new(),
        }
    }

    /// Reject programs compiled for `profile` at validation time.
    pub fn without_profile(mut self, profile: &str) -> Self {
        self.unsupported_profiles.insert(profile.to_ascii_lowercase());
        self
    }

    /// Make binding the program with this label fail.
    pub fn failing_bind(mut self, label: &str) -> Self {
        self.failing_binds.insert(label.to_string());
        self
    }

    /// Make loading the program with this label fail.
    pub fn failing_load(mut self, label: &str) -> Self {
        self.failing_loads.insert(label.to_string());
        self
    }

    /// Lose the device on the draw after `draws` successful ones.
    pub fn losing_after(mut self, draws: usize) -> Self {
        self.lose_after_draws = Some(draws);
        self
    }

    pub fn lose(&mut self) {
        self.lost = true;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
    }

    /// Paint a surface, standing in for whatever the host rendered.
    pub fn paint(&mut self, surface: Surface, content: &str) {
        self.contents.insert(surface, content.to_string());
    }

    pub fn content(&self, surface: Surface) -> Option<&str> {
        self.contents.get(&surface).map(String::as_str)
    }

    pub fn backbuffer(&self) -> Option<&str> {
        self.content(Surface::Backbuffer)
    }

    pub fn texture_id(&self, name: &str) -> Option<TextureId> {
        self.textures
            .iter()
            .find(|(_, texture)| texture.name == name)
            .map(|(id, _)| *id)
    }

    pub fn texture_desc(&self, name: &str) -> Option<TextureDesc> {
        self.texture_id(name)
            .and_then(|id| self.textures.get(&id))
            .map(|texture| texture.desc)
    }

    pub fn texture_content(&self, name: &str) -> Option<&str> {
        self.texture_id(name)
            .and_then(|id| self.content(Surface::Texture(id)))
    }

    /// Last vec4 written to `register` of the program with this label.
    pub fn constant(&self, label: &str, register: u32) -> Option<[f32; 4]> {
        self.program_by_label(label)
            .and_then(|program| program.constants.get(&register).copied())
    }

    pub fn sampler(&self, label: &str, slot: u32) -> Option<TextureId> {
        self.program_by_label(label)
            .and_then(|program| program.samplers.get(&slot).copied())
    }

    pub fn state(&self) -> &HeadlessState {
        &self.state
    }

    pub fn bound_program(&self, stage: Stage) -> Option<&str> {
        self.bound[stage.index()]
            .and_then(|id| self.programs.get(&id))
            .map(|program| program.label.as_str())
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn program_by_label(&self, label: &str) -> Option<&HeadlessProgram> {
        self.programs.values().find(|program| program.label == label)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_surface(&self, surface: Surface) -> Result<(), DeviceError> {
        match surface {
            Surface::Texture(id) if !self.textures.contains_key(&id) => Err(
                DeviceError::InvalidCall(format!("unknown texture {:?}", id)),
            ),
            _ => Ok(()),
        }
    }

    fn alive(&self) -> Result<(), DeviceError> {
        if self.lost {
            Err(DeviceError::Lost)
        } else {
            Ok(())
        }
    }

    fn draw_tag(&self) -> String {
        [Stage::Fragment, Stage::Vertex]
            .iter()
            .find_map(|stage| self.bound_program(*stage))
            .unwrap_or("unbound")
            .to_string()
    }
}

impl RenderDevice for HeadlessDevice {
    type State = HeadlessState;

    fn backbuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn supports_profile(&self, profile: &Profile) -> bool {
        !self.unsupported_profiles.contains(profile.name())
    }

    fn validate_programs(&mut self, programs: &[&CompiledProgram]) -> Result<(), DeviceError> {
        self.alive()?;
        let mut stages = HashSet::new();
        for program in programs {
            if !stages.insert(program.stage()) {
                return Err(DeviceError::InvalidCall(format!(
                    "two {:?} programs in one pass",
                    program.stage()
                )));
            }
        }
        Ok(())
    }

    fn create_texture(&mut self, name: &str, desc: &TextureDesc) -> Result<TextureId, DeviceError> {
        self.alive()?;
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::TextureCreation {
                name: name.to_string(),
                reason: "zero-sized texture".to_string(),
            });
        }
        let id = TextureId(self.allocate());
        self.textures.insert(
            id,
            HeadlessTexture {
                name: name.to_string(),
                desc: *desc,
            },
        );
        Ok(id)
    }

    fn load_texture(
        &mut self,
        name: &str,
        path: &Path,
    ) -> Result<(TextureId, TextureDesc), DeviceError> {
        self.alive()?;
        let (width, height) =
            image::image_dimensions(path).map_err(|err| DeviceError::TextureLoad {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let desc = TextureDesc {
            mipmaps: true,
            ..TextureDesc::render_target(width, height, Default::default())
        };
        let id = self.create_texture(name, &desc)?;
        self.contents
            .insert(Surface::Texture(id), format!("file:{}", path.display()));
        Ok((id, desc))
    }

    fn load_program(&mut self, program: &CompiledProgram) -> Result<ProgramId, DeviceError> {
        self.alive()?;
        if self.failing_loads.contains(program.label()) {
            return Err(DeviceError::InvalidCall(format!(
                "{} rejected by the runtime",
                program.label()
            )));
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(
            id,
            HeadlessProgram {
                label: program.label().to_string(),
                stage: program.stage(),
                constants: BTreeMap::new(),
                samplers: BTreeMap::new(),
            },
        );
        self.calls
            .push(DeviceCall::LoadProgram(program.label().to_string()));
        Ok(id)
    }

    fn bind_program(&mut self, stage: Stage, program: ProgramId) -> Result<(), DeviceError> {
        self.alive()?;
        let loaded = self
            .programs
            .get(&program)
            .ok_or_else(|| DeviceError::InvalidCall(format!("unknown program {:?}", program)))?;
        if loaded.stage != stage {
            return Err(DeviceError::InvalidCall(format!(
                "{} is not a {:?} program",
                loaded.label, stage
            )));
        }
        if self.failing_binds.contains(&loaded.label) {
            return Err(DeviceError::InvalidCall(format!(
                "{} could not be bound",
                loaded.label
            )));
        }
        let label = loaded.label.clone();
        self.bound[stage.index()] = Some(program);
        self.calls.push(DeviceCall::BindProgram(stage, label));
        Ok(())
    }

    fn unbind_program(&mut self, stage: Stage) {
        self.bound[stage.index()] = None;
        self.calls.push(DeviceCall::UnbindProgram(stage));
    }

    fn set_constants(&mut self, program: ProgramId, register: u32, values: &[f32]) {
        let Some(program) = self.programs.get_mut(&program) else {
            return;
        };
        for (offset, chunk) in values.chunks(4).enumerate() {
            let mut vec4 = [0.0; 4];
            vec4[..chunk.len()].copy_from_slice(chunk);
            program.constants.insert(register + offset as u32, vec4);
        }
    }

    fn set_sampler(&mut self, program: ProgramId, slot: u32, texture: TextureId) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.samplers.insert(slot, texture);
        }
    }

    fn render_target(&self) -> Surface {
        self.render_target
    }

    fn set_render_target(&mut self, target: Surface) -> Result<(), DeviceError> {
        self.alive()?;
        self.check_surface(target)?;
        self.render_target = target;
        self.calls.push(DeviceCall::SetRenderTarget(target));
        Ok(())
    }

    fn capture_state(&self) -> HeadlessState {
        self.state.clone()
    }

    fn restore_state(&mut self, state: HeadlessState) {
        self.state = state;
    }

    fn set_effect_state(&mut self) {
        self.state.depth_test = false;
        self.state.alpha_blend = false;
        self.state.culling = false;
        self.state.stream = Some("effect".to_string());
    }

    fn draw(&mut self, geometry: &Geometry) -> Result<(), DeviceError> {
        self.alive()?;
        if let Some(remaining) = self.lose_after_draws.as_mut() {
            if *remaining == 0 {
                self.lost = true;
                return Err(DeviceError::Lost);
            }
            *remaining -= 1;
        }

        let tag = self.draw_tag();
        self.contents.insert(self.render_target, tag);
        self.calls.push(DeviceCall::Draw {
            target: self.render_target,
            indices: geometry.index_count(),
            state: self.state.clone(),
        });
        Ok(())
    }

    fn stretch_copy(&mut self, source: Surface, destination: Surface) -> Result<(), DeviceError> {
        self.alive()?;
        self.check_surface(source)?;
        self.check_surface(destination)?;
        match self.contents.get(&source).cloned() {
            Some(content) => {
                self.contents.insert(destination, content);
            }
            None => {
                self.contents.remove(&destination);
            }
        }
        self.calls.push(DeviceCall::Copy {
            source,
            destination,
        });
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.lost
    }
}
