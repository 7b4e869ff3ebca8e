//! Stage programs and the compiler that produces them.
//!
//! Compilation here is front-end only: the profile is checked against the stage, file
//! sources are resolved, and a constant table mapping effect parameters to registers and
//! sampler slots is built. Turning the source into device code is the device's job.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::rc::Rc;

use bitflags::bitflags;

use crate::effect::description::ProgramDescription;
use crate::effect::parameter::{ParameterCategory, ParameterType};
use crate::error::CompileError;
use crate::io::{self, FileSystem, VariableParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Fragment,
    Geometry,
    Domain,
    Hull,
}

impl Stage {
    pub const COUNT: usize = 5;
    pub const ALL: [Stage; Self::COUNT] = [
        Stage::Vertex,
        Stage::Fragment,
        Stage::Geometry,
        Stage::Domain,
        Stage::Hull,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u8 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const GEOMETRY = 1 << 2;
        const DOMAIN = 1 << 3;
        const HULL = 1 << 4;
    }
}

impl From<Stage> for StageMask {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Vertex => StageMask::VERTEX,
            Stage::Fragment => StageMask::FRAGMENT,
            Stage::Geometry => StageMask::GEOMETRY,
            Stage::Domain => StageMask::DOMAIN,
            Stage::Hull => StageMask::HULL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileFamily {
    /// `vs_3_0`, `ps_2_a`... Only the major version is kept.
    ShaderModel { major: u8 },
    Wgsl,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Profile {
    name: String,
    family: ProfileFamily,
    stages: StageMask,
}

impl Profile {
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("wgsl") {
            return Some(Self {
                name: "wgsl".to_string(),
                family: ProfileFamily::Wgsl,
                stages: StageMask::all(),
            });
        }

        let lowered = name.to_ascii_lowercase();
        let (prefix, version) = lowered.split_once('_')?;
        let stages = match prefix {
            "vs" => StageMask::VERTEX,
            "ps" | "fs" => StageMask::FRAGMENT,
            "gs" => StageMask::GEOMETRY,
            "ds" => StageMask::DOMAIN,
            "hs" => StageMask::HULL,
            _ => return None,
        };
        let major = version.split('_').next()?.parse::<u8>().ok()?;

        Some(Self {
            name: lowered,
            family: ProfileFamily::ShaderModel { major },
            stages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> ProfileFamily {
        self.family
    }

    pub fn stages(&self) -> StageMask {
        self.stages
    }

    pub fn targets(&self, stage: Stage) -> bool {
        self.stages.contains(stage.into())
    }
}

/// Stable identity of a compiled program, derived from everything that affects its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramKey(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    Inline,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantSlot {
    pub parameter: String,
    pub ty: ParameterType,
    /// First vec4 register.
    pub register: u32,
    pub registers: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplerSlot {
    pub parameter: String,
    pub ty: ParameterType,
    pub slot: u32,
}

/// Where each referenced effect parameter lives in a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConstantTable {
    pub constants: Vec<ConstantSlot>,
    pub samplers: Vec<SamplerSlot>,
}

impl ConstantTable {
    /// Lay out `parameters` (in declaration order) that `source` mentions by name.
    pub fn build(source: &str, parameters: &[(String, ParameterType)]) -> Self {
        let identifiers = identifiers(source);
        let mut table = Self::default();
        let mut register = 0;

        for (name, ty) in parameters {
            if !identifiers.contains(name.as_str()) {
                continue;
            }
            match ty.category() {
                ParameterCategory::Scalar => {
                    table.constants.push(ConstantSlot {
                        parameter: name.clone(),
                        ty: *ty,
                        register,
                        registers: ty.registers(),
                    });
                    register += ty.registers();
                }
                ParameterCategory::Sampler => {
                    let slot = table.samplers.len() as u32;
                    table.samplers.push(SamplerSlot {
                        parameter: name.clone(),
                        ty: *ty,
                        slot,
                    });
                }
            }
        }
        table
    }

    pub fn register_count(&self) -> u32 {
        self.constants
            .last()
            .map(|slot| slot.register + slot.registers)
            .unwrap_or(0)
    }

    pub fn constant(&self, parameter: &str) -> Option<&ConstantSlot> {
        self.constants.iter().find(|slot| slot.parameter == parameter)
    }

    pub fn sampler(&self, parameter: &str) -> Option<&SamplerSlot> {
        self.samplers.iter().find(|slot| slot.parameter == parameter)
    }

    pub fn references(&self, parameter: &str) -> bool {
        self.constant(parameter).is_some() || self.sampler(parameter).is_some()
    }
}

fn identifiers(source: &str) -> HashSet<&str> {
    source
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_'))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    key: ProgramKey,
    label: String,
    stage: Stage,
    profile: Profile,
    entry: String,
    source: Rc<str>,
    origin: ProgramSource,
    constants: Rc<ConstantTable>,
}

impl CompiledProgram {
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    /// `effect/technique/pass:stage`, for logs and errors.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &ProgramSource {
        &self.origin
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    pub(crate) fn shared_constants(&self) -> Rc<ConstantTable> {
        Rc::clone(&self.constants)
    }
}

/// Front-end compiler shared by every effect of a session. Also owns the collaborators
/// used to turn annotation strings into files.
pub struct ProgramCompiler {
    files: Box<dyn FileSystem>,
    variables: Box<dyn VariableParser>,
}

impl ProgramCompiler {
    pub fn new(files: Box<dyn FileSystem>, variables: Box<dyn VariableParser>) -> Self {
        Self { files, variables }
    }

    /// Expand variables in `name`, then look it up.
    pub fn resolve_file(&self, name: &str) -> Option<PathBuf> {
        let expanded = self.variables.parse(name);
        self.files.find_file(&expanded)
    }

    pub fn compile(
        &self,
        label: &str,
        stage: Stage,
        description: &ProgramDescription,
        parameters: &[(String, ParameterType)],
    ) -> Result<CompiledProgram, CompileError> {
        let profile = Profile::parse(&description.profile)
            .ok_or_else(|| CompileError::UnknownProfile(description.profile.clone()))?;
        if !profile.targets(stage) {
            return Err(CompileError::StageMismatch {
                profile: profile.name().to_string(),
                stage,
            });
        }

        let (source, origin) = match (&description.source, &description.file) {
            (Some(source), _) => (source.clone(), ProgramSource::Inline),
            (None, Some(file)) => {
                let path = self
                    .resolve_file(file)
                    .ok_or_else(|| CompileError::FileNotFound(file.clone()))?;
                let text = io::load_text(&path).map_err(|reason| CompileError::Io {
                    path: path.clone(),
                    reason,
                })?;
                (text, ProgramSource::File(path))
            }
            (None, None) => return Err(CompileError::MissingSource { stage }),
        };

        let constants = ConstantTable::build(&source, parameters);

        let mut hasher = DefaultHasher::new();
        stage.hash(&mut hasher);
        profile.hash(&mut hasher);
        description.entry.hash(&mut hasher);
        source.hash(&mut hasher);
        // Devices bake the layout into the loaded program, so it is part of the identity.
        constants.hash(&mut hasher);
        let key = ProgramKey(hasher.finish());

        log::trace!(
            "Compiled {} ({}, entry '{}', {} registers, {} samplers)",
            label,
            profile.name(),
            description.entry,
            constants.register_count(),
            constants.samplers.len()
        );

        Ok(CompiledProgram {
            key,
            label: label.to_string(),
            stage,
            profile,
            entry: description.entry.clone(),
            source: source.into(),
            origin,
            constants: Rc::new(constants),
        })
    }
}
