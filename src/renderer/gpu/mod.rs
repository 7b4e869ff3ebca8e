//! [`RenderDevice`] over wgpu.
//!
//! Programs are WGSL. Each program gets a generated prelude declaring the parameters its
//! constant table references:
//!
//! * scalars become fields of a uniform struct bound as `constants` (vertex programs at
//!   group 0 binding 0, fragment programs at group 0 binding 1), one `vec4<f32>` per
//!   register, `mat4x4<f32>` for matrices;
//! * each 2D sampler `name` becomes `name: texture_2d<f32>` plus `name_sampler: sampler`
//!   at bindings `2 * slot` and `2 * slot + 1` of group 1 (vertex) or group 2 (fragment).
//!
//! The backbuffer is an offscreen texture so it can be copied and sampled like any other
//! surface; [`WgpuDevice::present`] blits it to the window.

pub mod context;
pub mod pipeline;
pub mod texture;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use wgpu::util::DeviceExt;

use crate::effect::{CompiledProgram, ParameterType, Profile, ProfileFamily, ProgramKey, Stage};
use crate::error::DeviceError;
use crate::renderer::device::{ProgramId, RenderDevice, Surface};
use crate::renderer::quad::{Geometry, Vertex};
use crate::texture::{TextureDesc, TextureId};

pub use context::GpuContext;
use pipeline::{Blitter, PipelineBuilder, MAX_REGISTERS};
use texture::GpuTexture;

struct LoadedProgram {
    label: String,
    stage: Stage,
    entry: String,
    module: wgpu::ShaderModule,
    sampler_count: u32,
    registers: Vec<[f32; 4]>,
    buffer: wgpu::Buffer,
    dirty: bool,
    samplers: Vec<Option<TextureId>>,
}

type PipelineKey = (ProgramId, ProgramId, wgpu::TextureFormat);

pub struct WgpuDevice {
    context: GpuContext,
    backbuffer: GpuTexture,
    scratch: GpuTexture,
    fallback: GpuTexture,
    textures: HashMap<TextureId, GpuTexture>,
    modules: HashMap<ProgramKey, wgpu::ShaderModule>,
    programs: HashMap<ProgramId, LoadedProgram>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    sampler_layouts: HashMap<(u32, u32), wgpu::BindGroupLayout>,
    constants_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    blitter: Blitter,
    bound: [Option<ProgramId>; Stage::COUNT],
    render_target: Surface,
    next_id: u64,
}

impl WgpuDevice {
    pub fn new(context: GpuContext, width: u32, height: u32) -> Self {
        let format = context
            .surface_format()
            .unwrap_or(wgpu::TextureFormat::Rgba8Unorm);
        let device = &context.device;

        let backbuffer = GpuTexture::new(device, "Backbuffer", width, height, format);
        let scratch = GpuTexture::new(device, "Scratch", width, height, format);
        let fallback = GpuTexture::new(device, "Fallback", 1, 1, wgpu::TextureFormat::Rgba8Unorm);
        let constants_layout = pipeline::constants_layout(device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Effect sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let blitter = Blitter::new(device);

        log::info!("wgpu effect device ready ({}x{}, {:?})", width, height, format);

        Self {
            context,
            backbuffer,
            scratch,
            fallback,
            textures: HashMap::new(),
            modules: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            sampler_layouts: HashMap::new(),
            constants_layout,
            sampler,
            blitter,
            bound: [None; Stage::COUNT],
            render_target: Surface::Backbuffer,
            next_id: 1,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Resize the window surface and the backbuffer/scratch pair. Their contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.context.resize(width, height);
        let format = self.backbuffer.format;
        let device = &self.context.device;
        self.backbuffer = GpuTexture::new(device, "Backbuffer", width, height, format);
        self.scratch = GpuTexture::new(device, "Scratch", width, height, format);
    }

    pub fn clear_backbuffer(&mut self, color: wgpu::Color) {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear backbuffer"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear backbuffer"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.backbuffer.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.context.queue.submit(Some(encoder.finish()));
    }

    /// Blit the backbuffer to the window. A no-op without a window surface.
    pub fn present(&mut self) -> Result<(), DeviceError> {
        let Some(present) = self.context.surface.as_ref() else {
            return Ok(());
        };
        let frame = match present.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = (present.config.width, present.config.height);
                log::warn!("Surface lost or outdated; reconfiguring");
                self.context.resize(width, height);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame");
                return Ok(());
            }
            Err(err) => return Err(DeviceError::InvalidCall(format!("present: {}", err))),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let format = present.config.format;

        let device = &self.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Present"),
        });
        self.blitter
            .blit(device, &mut encoder, &self.backbuffer.view, &view, format);
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn alive(&self) -> Result<(), DeviceError> {
        if self.context.is_lost() {
            Err(DeviceError::Lost)
        } else {
            Ok(())
        }
    }

    fn module_for(&mut self, program: &CompiledProgram) -> Result<wgpu::ShaderModule, DeviceError> {
        if let Some(module) = self.modules.get(&program.key()) {
            return Ok(module.clone());
        }
        let source = format!("{}\n{}", prelude(program), program.source());
        let module = self.context.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;
        self.modules.insert(program.key(), module.clone());
        Ok(module)
    }

    fn sampler_layout(&mut self, group: u32, count: u32) -> wgpu::BindGroupLayout {
        let device = &self.context.device;
        self.sampler_layouts
            .entry((group, count))
            .or_insert_with(|| {
                let visibility = if group == pipeline::VERTEX_SAMPLERS_GROUP {
                    wgpu::ShaderStages::VERTEX
                } else {
                    wgpu::ShaderStages::FRAGMENT
                };
                pipeline::samplers_layout(device, visibility, count)
            })
            .clone()
    }

    fn pipeline_layout(&mut self, vertex_samplers: u32, fragment_samplers: u32) -> wgpu::PipelineLayout {
        let vertex = self.sampler_layout(pipeline::VERTEX_SAMPLERS_GROUP, vertex_samplers);
        let fragment = self.sampler_layout(pipeline::FRAGMENT_SAMPLERS_GROUP, fragment_samplers);
        self.context
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Effect pipeline layout"),
                bind_group_layouts: &[&self.constants_layout, &vertex, &fragment],
                push_constant_ranges: &[],
            })
    }

    fn build_pipeline(
        &mut self,
        label: &str,
        vertex: (&wgpu::ShaderModule, &str, u32),
        fragment: (&wgpu::ShaderModule, &str, u32),
        format: wgpu::TextureFormat,
    ) -> Result<wgpu::RenderPipeline, DeviceError> {
        let layout = self.pipeline_layout(vertex.2, fragment.2);
        self.context.validated(|device| {
            PipelineBuilder::new(device, &layout, vertex.0, fragment.0)
                .with_label(label)
                .with_entries(vertex.1, fragment.1)
                .with_vertex_buffer(Vertex::layout())
                .with_color_target(format)
                .build()
        })
    }

    fn samplers_bind_group(
        &mut self,
        group: u32,
        program: ProgramId,
    ) -> Result<wgpu::BindGroup, DeviceError> {
        let (count, slots) = match self.programs.get(&program) {
            Some(loaded) => (loaded.sampler_count, loaded.samplers.clone()),
            None => return Err(DeviceError::InvalidCall(format!("unknown program {:?}", program))),
        };
        let layout = self.sampler_layout(group, count);

        let mut entries = Vec::with_capacity(count as usize * 2);
        for slot in 0..count {
            let view = slots
                .get(slot as usize)
                .copied()
                .flatten()
                .and_then(|id| self.textures.get(&id))
                .map_or(&self.fallback.view, |texture| &texture.view);
            entries.push(wgpu::BindGroupEntry {
                binding: slot * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }

        self.context.validated(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Effect samplers"),
                layout: &layout,
                entries: &entries,
            })
        })
    }
}

fn surface_texture<'a>(
    surface: Surface,
    backbuffer: &'a GpuTexture,
    scratch: &'a GpuTexture,
    textures: &'a HashMap<TextureId, GpuTexture>,
) -> Result<&'a GpuTexture, DeviceError> {
    match surface {
        Surface::Backbuffer => Ok(backbuffer),
        Surface::Scratch => Ok(scratch),
        Surface::Texture(id) => textures
            .get(&id)
            .ok_or_else(|| DeviceError::InvalidCall(format!("unknown texture {:?}", id))),
    }
}

fn prelude(program: &CompiledProgram) -> String {
    let (binding, group, name) = match program.stage() {
        Stage::Vertex => (0, pipeline::VERTEX_SAMPLERS_GROUP, "VertexConstants"),
        _ => (1, pipeline::FRAGMENT_SAMPLERS_GROUP, "FragmentConstants"),
    };
    let table = program.constants();
    let mut out = String::new();

    if !table.constants.is_empty() {
        let _ = writeln!(out, "struct {} {{", name);
        for slot in &table.constants {
            let ty = match slot.ty {
                ParameterType::Matrix => "mat4x4<f32>",
                _ => "vec4<f32>",
            };
            let _ = writeln!(out, "    {}: {},", slot.parameter, ty);
        }
        let _ = writeln!(out, "}};");
        let _ = writeln!(
            out,
            "@group(0) @binding({}) var<uniform> constants: {};",
            binding, name
        );
    }

    for slot in &table.samplers {
        let _ = writeln!(
            out,
            "@group({}) @binding({}) var {}: texture_2d<f32>;",
            group,
            slot.slot * 2,
            slot.parameter
        );
        let _ = writeln!(
            out,
            "@group({}) @binding({}) var {}_sampler: sampler;",
            group,
            slot.slot * 2 + 1,
            slot.parameter
        );
    }
    out
}

impl RenderDevice for WgpuDevice {
    /// Pipelines carry depth, blend and cull state, so nothing ambient needs saving.
    type State = ();

    fn backbuffer_size(&self) -> (u32, u32) {
        self.backbuffer.size()
    }

    fn supports_profile(&self, profile: &Profile) -> bool {
        profile.family() == ProfileFamily::Wgsl
    }

    fn validate_programs(&mut self, programs: &[&CompiledProgram]) -> Result<(), DeviceError> {
        self.alive()?;
        let find = |stage| programs.iter().find(|p| p.stage() == stage).copied();
        let (Some(vertex), Some(fragment)) = (find(Stage::Vertex), find(Stage::Fragment)) else {
            return Err(DeviceError::InvalidCall(
                "a pass needs both a vertex and a fragment program".into(),
            ));
        };
        if programs.len() != 2 {
            return Err(DeviceError::InvalidCall(
                "only vertex and fragment programs are supported".into(),
            ));
        }

        for program in [vertex, fragment] {
            let table = program.constants();
            if table.register_count() > MAX_REGISTERS {
                return Err(DeviceError::InvalidCall(format!(
                    "{} needs {} registers, the limit is {}",
                    program.label(),
                    table.register_count(),
                    MAX_REGISTERS
                )));
            }
            if let Some(slot) = table.samplers.iter().find(|s| s.ty != ParameterType::Sampler2D) {
                return Err(DeviceError::InvalidCall(format!(
                    "{}: sampler '{}' is {:?}; only 2D samplers are supported",
                    program.label(),
                    slot.parameter,
                    slot.ty
                )));
            }
        }

        let vertex_module = self.module_for(vertex)?;
        let fragment_module = self.module_for(fragment)?;
        let label = format!("{} (validation)", fragment.label());
        self.build_pipeline(
            &label,
            (&vertex_module, vertex.entry(), vertex.constants().samplers.len() as u32),
            (&fragment_module, fragment.entry(), fragment.constants().samplers.len() as u32),
            wgpu::TextureFormat::Rgba8Unorm,
        )
        .map(|_| ())
    }

    fn create_texture(&mut self, name: &str, desc: &TextureDesc) -> Result<TextureId, DeviceError> {
        self.alive()?;
        let texture = self
            .context
            .validated(|device| GpuTexture::render_target(device, name, desc))??;
        let id = TextureId(self.allocate());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn load_texture(
        &mut self,
        name: &str,
        path: &Path,
    ) -> Result<(TextureId, TextureDesc), DeviceError> {
        self.alive()?;
        let (texture, desc) =
            GpuTexture::from_path(&self.context.device, &self.context.queue, name, path)?;
        let id = TextureId(self.allocate());
        self.textures.insert(id, texture);
        Ok((id, desc))
    }

    fn load_program(&mut self, program: &CompiledProgram) -> Result<ProgramId, DeviceError> {
        self.alive()?;
        let module = self.module_for(program)?;
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(program.label()),
            size: pipeline::REGISTER_FILE_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler_count = program.constants().samplers.len() as u32;

        let id = ProgramId(self.allocate());
        self.programs.insert(
            id,
            LoadedProgram {
                label: program.label().to_string(),
                stage: program.stage(),
                entry: program.entry().to_string(),
                module,
                sampler_count,
                registers: vec![[0.0; 4]; MAX_REGISTERS as usize],
                buffer,
                dirty: true,
                samplers: vec![None; sampler_count as usize],
            },
        );
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
        self.bound[stage.index()] = Some(program);
        Ok(())
    }

    fn unbind_program(&mut self, stage: Stage) {
        self.bound[stage.index()] = None;
    }

    fn set_constants(&mut self, program: ProgramId, register: u32, values: &[f32]) {
        let Some(loaded) = self.programs.get_mut(&program) else {
            return;
        };
        for (offset, chunk) in values.chunks(4).enumerate() {
            let index = register as usize + offset;
            if let Some(slot) = loaded.registers.get_mut(index) {
                *slot = [0.0; 4];
                slot[..chunk.len()].copy_from_slice(chunk);
                loaded.dirty = true;
            }
        }
    }

    fn set_sampler(&mut self, program: ProgramId, slot: u32, texture: TextureId) {
        if let Some(target) = self
            .programs
            .get_mut(&program)
            .and_then(|loaded| loaded.samplers.get_mut(slot as usize))
        {
            *target = Some(texture);
        }
    }

    fn render_target(&self) -> Surface {
        self.render_target
    }

    fn set_render_target(&mut self, target: Surface) -> Result<(), DeviceError> {
        self.alive()?;
        surface_texture(target, &self.backbuffer, &self.scratch, &self.textures)?;
        self.render_target = target;
        Ok(())
    }

    fn capture_state(&self) {}

    fn restore_state(&mut self, _state: ()) {}

    fn set_effect_state(&mut self) {}

    fn draw(&mut self, geometry: &Geometry) -> Result<(), DeviceError> {
        self.alive()?;
        let (Some(vertex), Some(fragment)) = (
            self.bound[Stage::Vertex.index()],
            self.bound[Stage::Fragment.index()],
        ) else {
            return Err(DeviceError::InvalidCall(
                "draw needs a bound vertex and fragment program".into(),
            ));
        };
        if geometry.vertices.is_empty() {
            return Ok(());
        }

        let format =
            surface_texture(self.render_target, &self.backbuffer, &self.scratch, &self.textures)?
                .format;

        let key = (vertex, fragment, format);
        if !self.pipelines.contains_key(&key) {
            let (vs, fs) = match (self.programs.get(&vertex), self.programs.get(&fragment)) {
                (Some(vs), Some(fs)) => (
                    (vs.module.clone(), vs.entry.clone(), vs.sampler_count),
                    (fs.module.clone(), fs.entry.clone(), fs.sampler_count),
                ),
                _ => return Err(DeviceError::InvalidCall("bound program was unloaded".into())),
            };
            let label = format!("{} pipeline", fragment_label(&self.programs, fragment));
            let built = self.build_pipeline(
                &label,
                (&vs.0, vs.1.as_str(), vs.2),
                (&fs.0, fs.1.as_str(), fs.2),
                format,
            )?;
            self.pipelines.insert(key, built);
        }

        for id in [vertex, fragment] {
            if let Some(loaded) = self.programs.get_mut(&id) {
                if loaded.dirty {
                    self.context.queue.write_buffer(
                        &loaded.buffer,
                        0,
                        bytemuck::cast_slice(&loaded.registers),
                    );
                    loaded.dirty = false;
                }
            }
        }

        let vertex_samplers = self.samplers_bind_group(pipeline::VERTEX_SAMPLERS_GROUP, vertex)?;
        let fragment_samplers =
            self.samplers_bind_group(pipeline::FRAGMENT_SAMPLERS_GROUP, fragment)?;

        let device = &self.context.device;
        let (Some(vs), Some(fs), Some(pipeline)) = (
            self.programs.get(&vertex),
            self.programs.get(&fragment),
            self.pipelines.get(&key),
        ) else {
            return Err(DeviceError::InvalidCall("bound program was unloaded".into()));
        };
        let constants = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect constants"),
            layout: &self.constants_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: vs.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: fs.buffer.as_entire_binding(),
                },
            ],
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Effect vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = geometry.indices.as_ref().map(|indices| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        let target =
            surface_texture(self.render_target, &self.backbuffer, &self.scratch, &self.textures)?;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Effect draw"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(fs.label.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &constants, &[]);
            pass.set_bind_group(1, &vertex_samplers, &[]);
            pass.set_bind_group(2, &fragment_samplers, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            match (&index_buffer, &geometry.indices) {
                (Some(buffer), Some(indices)) => {
                    pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..indices.len() as u32, 0, 0..1);
                }
                _ => pass.draw(0..geometry.vertices.len() as u32, 0..1),
            }
        }
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn stretch_copy(&mut self, source: Surface, destination: Surface) -> Result<(), DeviceError> {
        self.alive()?;
        if source == destination {
            return Ok(());
        }
        let src = surface_texture(source, &self.backbuffer, &self.scratch, &self.textures)?;
        let dst = surface_texture(destination, &self.backbuffer, &self.scratch, &self.textures)?;

        let device = &self.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Stretch copy"),
        });
        self.blitter
            .blit(device, &mut encoder, &src.view, &dst.view, dst.format);
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.context.is_lost()
    }
}

fn fragment_label(programs: &HashMap<ProgramId, LoadedProgram>, id: ProgramId) -> &str {
    programs.get(&id).map_or("effect", |p| p.label.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ProgramCompiler, ProgramDescription};
    use crate::io::{SearchPathFileSystem, Verbatim};

    fn compile(stage: Stage, source: &str, parameters: &[(String, ParameterType)]) -> CompiledProgram {
        let compiler = ProgramCompiler::new(
            Box::new(SearchPathFileSystem::default()),
            Box::new(Verbatim),
        );
        let description = ProgramDescription {
            profile: "wgsl".into(),
            entry: "main".into(),
            source: Some(source.into()),
            file: None,
        };
        compiler
            .compile("fx/t/p:Fragment", stage, &description, parameters)
            .unwrap()
    }

    #[test]
    fn prelude_declares_referenced_parameters() {
        let parameters = vec![
            ("time".to_string(), ParameterType::Float1),
            ("view".to_string(), ParameterType::Matrix),
            ("scene".to_string(), ParameterType::Sampler2D),
        ];
        let program = compile(
            Stage::Fragment,
            "textureSample(scene, scene_sampler, uv) * constants.time.x * constants.view",
            &parameters,
        );

        let prelude = prelude(&program);
        assert!(prelude.contains("struct FragmentConstants {"));
        assert!(prelude.contains("    time: vec4<f32>,"));
        assert!(prelude.contains("    view: mat4x4<f32>,"));
        assert!(prelude.contains("@group(0) @binding(1) var<uniform> constants: FragmentConstants;"));
        assert!(prelude.contains("@group(2) @binding(0) var scene: texture_2d<f32>;"));
        assert!(prelude.contains("@group(2) @binding(1) var scene_sampler: sampler;"));
    }

    #[test]
    fn prelude_is_empty_without_references() {
        let program = compile(Stage::Vertex, "fn main() {}", &[]);
        assert!(prelude(&program).is_empty());
    }

    #[test]
    #[ignore]
    fn headless_device_creates_staging_targets() {
        let context = pollster::block_on(GpuContext::headless()).unwrap();
        let mut device = WgpuDevice::new(context, 64, 32);
        assert_eq!(device.backbuffer_size(), (64, 32));

        let desc = TextureDesc::render_target(16, 16, crate::texture::TextureFormat::Rgba16F);
        let id = device.create_texture(":lastpass", &desc).unwrap();
        device.stretch_copy(Surface::Backbuffer, Surface::Texture(id)).unwrap();
        assert!(!device.is_lost());
    }
}
