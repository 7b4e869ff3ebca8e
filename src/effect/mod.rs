pub mod annotation;
pub mod description;
pub mod linker;
pub mod parameter;
pub mod pass;
pub mod program;
pub mod shader;
pub mod technique;

pub use annotation::{AnnotationValue, Annotations, LinkDirective};
pub use description::{EffectDescription, PassDescription, ProgramDescription, TechniqueDescription};
pub use linker::{LinkReport, Linker};
pub use parameter::{Parameter, ParameterCategory, ParameterRegistry, ParameterType, MAX_COMPONENTS};
pub use pass::{Pass, TargetBinding};
pub use program::{
    CompiledProgram, ConstantTable, Profile, ProfileFamily, ProgramCompiler, ProgramKey, Stage,
    StageMask,
};
pub use shader::Effect;
pub use technique::Technique;
