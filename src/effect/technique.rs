use std::cell::OnceCell;

use crate::effect::annotation::LinkDirective;
use crate::effect::pass::{Pass, TargetBinding};

#[derive(Debug)]
pub struct Technique {
    name: String,
    passes: Vec<Pass>,
    directives: Vec<LinkDirective>,
    target: Option<TargetBinding>,
    valid: OnceCell<bool>,
}

impl Technique {
    pub(crate) fn new(name: &str, passes: Vec<Pass>, directives: Vec<LinkDirective>) -> Self {
        Self {
            name: name.to_string(),
            passes,
            directives,
            target: None,
            valid: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub(crate) fn passes_mut(&mut self) -> &mut [Pass] {
        &mut self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
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

    /// False until validated, and forever after if validation failed.
    pub fn is_valid(&self) -> bool {
        self.valid.get().copied().unwrap_or(false)
    }

    pub fn is_validated(&self) -> bool {
        self.valid.get().is_some()
    }

    /// Records the validation result. Only the first call has any effect.
    pub(crate) fn mark_validated(&self, valid: bool) -> bool {
        let _ = self.valid.set(valid);
        self.is_valid()
    }
}
