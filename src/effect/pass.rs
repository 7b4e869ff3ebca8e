use crate::asset::Handle;
use crate::effect::annotation::LinkDirective;
use crate::effect::program::{CompiledProgram, Stage};
use crate::texture::Texture;

/// A resolved output texture. `explicit` is false when the staging default was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBinding {
    pub texture: Handle<Texture>,
    pub explicit: bool,
}

#[derive(Debug)]
pub struct Pass {
    name: String,
    technique: String,
    programs: [Option<CompiledProgram>; Stage::COUNT],
    directives: Vec<LinkDirective>,
    target: Option<TargetBinding>,
    valid: bool,
}

impl Pass {
    pub(crate) fn new(
        name: &str,
        technique: &str,
        programs: [Option<CompiledProgram>; Stage::COUNT],
        directives: Vec<LinkDirective>,
    ) -> Self {
        Self {
            name: name.to_string(),
            technique: technique.to_string(),
            programs,
            directives,
            target: None,
            valid: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning technique.
    pub fn technique_name(&self) -> &str {
        &self.technique
    }

    pub fn program(&self, stage: Stage) -> Option<&CompiledProgram> {
        self.programs[stage.index()].as_ref()
    }

    /// Non-empty stage programs, in stage order.
    pub fn programs(&self) -> impl Iterator<Item = &CompiledProgram> {
        self.programs.iter().flatten()
    }

    pub fn directives(&self) -> &[LinkDirective] {
        &self.directives
    }

    pub fn target(&self) -> Option<TargetBinding> {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: TargetBinding) {
        self.target = Some(target);
    }

    /// Whether the device accepted this pass's programs at link time.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }
}
