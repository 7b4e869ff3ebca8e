use std::collections::HashSet;

use crate::effect::annotation::LinkDirective;
use crate::effect::description::EffectDescription;
use crate::effect::parameter::{Parameter, ParameterCategory, ParameterType};
use crate::effect::pass::Pass;
use crate::effect::program::{ProgramCompiler, Stage};
use crate::effect::technique::Technique;
use crate::error::EffectError;

/// A compiled effect: techniques, their passes and the effect's own parameters.
///
/// Freshly compiled effects have no default technique and no resolved targets; both are
/// filled in by [`Linker::link`](crate::effect::Linker::link).
#[derive(Debug)]
pub struct Effect {
    name: String,
    parameters: Vec<Parameter>,
    parameter_directives: Vec<Vec<LinkDirective>>,
    techniques: Vec<Technique>,
    default_technique: Option<usize>,
}

impl Effect {
    pub fn compile(
        description: &EffectDescription,
        compiler: &ProgramCompiler,
    ) -> Result<Self, EffectError> {
        let name = description.name.as_str();
        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(description.parameters.len());
        let mut parameter_directives = Vec::with_capacity(description.parameters.len());

        for declared in &description.parameters {
            let ty = ParameterType::parse(&declared.ty).ok_or_else(|| {
                EffectError::UnknownParameterType {
                    parameter: declared.name.clone(),
                    ty: declared.ty.clone(),
                }
            })?;
            if !seen.insert(declared.name.as_str()) {
                log::warn!(
                    "Effect '{}' declares parameter '{}' twice; keeping the first",
                    name,
                    declared.name
                );
                continue;
            }

            let parameter = Parameter::new_effect(&declared.name, ty, name);
            if ty.category() == ParameterCategory::Scalar && !declared.default.is_empty() {
                parameter.set_scalar(&declared.default);
            }
            parameters.push(parameter);
            parameter_directives.push(LinkDirective::parse(&declared.annotations));
        }

        let layout: Vec<(String, ParameterType)> = parameters
            .iter()
            .map(|p| (p.name().to_string(), p.parameter_type()))
            .collect();

        let mut techniques = Vec::with_capacity(description.techniques.len());
        for technique in &description.techniques {
            let mut passes = Vec::with_capacity(technique.passes.len());
            for pass in &technique.passes {
                let mut programs: [Option<_>; Stage::COUNT] = Default::default();
                for stage in Stage::ALL {
                    let Some(program) = pass.program(stage) else {
                        continue;
                    };
                    let label = format!("{}/{}/{}:{:?}", name, technique.name, pass.name, stage);
                    let compiled = compiler
                        .compile(&label, stage, program, &layout)
                        .map_err(|source| EffectError::Compile {
                            effect: name.to_string(),
                            pass: format!("{}/{}", technique.name, pass.name),
                            source,
                        })?;
                    programs[stage.index()] = Some(compiled);
                }
                passes.push(Pass::new(
                    &pass.name,
                    &technique.name,
                    programs,
                    LinkDirective::parse(&pass.annotations),
                ));
            }
            techniques.push(Technique::new(
                &technique.name,
                passes,
                LinkDirective::parse(&technique.annotations),
            ));
        }

        log::debug!(
            "Compiled effect '{}': {} parameters, {} techniques",
            name,
            parameters.len(),
            techniques.len()
        );

        Ok(Self {
            name: name.to_string(),
            parameters,
            parameter_directives,
            techniques,
            default_technique: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn technique_count(&self) -> usize {
        self.techniques.len()
    }

    pub fn technique(&self, index: usize) -> Option<&Technique> {
        self.techniques.get(index)
    }

    pub fn technique_by_name(&self, name: &str) -> Option<&Technique> {
        self.techniques.iter().find(|t| t.name() == name)
    }

    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    pub(crate) fn techniques_mut(&mut self) -> &mut [Technique] {
        &mut self.techniques
    }

    /// The first technique that validated, in declaration order.
    pub fn default_technique(&self) -> Option<&Technique> {
        self.default_technique.and_then(|index| self.techniques.get(index))
    }

    pub fn default_technique_index(&self) -> Option<usize> {
        self.default_technique
    }

    pub(crate) fn set_default_technique(&mut self, index: Option<usize>) {
        self.default_technique = index;
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Parameters paired with the directives parsed from their annotations.
    pub(crate) fn parameter_links(&self) -> impl Iterator<Item = (&Parameter, &[LinkDirective])> {
        self.parameters
            .iter()
            .zip(self.parameter_directives.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Verbatim;
    use std::path::PathBuf;

    struct NoFiles;

    impl crate::io::FileSystem for NoFiles {
        fn find_file(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    fn compile(json: &str) -> Result<Effect, EffectError> {
        let description = EffectDescription::from_json("test", json).unwrap();
        Effect::compile(
            &description,
            &ProgramCompiler::new(Box::new(NoFiles), Box::new(Verbatim)),
        )
    }

    #[test]
    fn builds_containers_in_declaration_order() {
        let effect = compile(
            r#"{ "name": "fx",
                 "parameters": [
                    { "name": "tint", "type": "float4", "default": [1, 0.5, 0.25, 1] },
                    { "name": "scene", "type": "sampler2D" }
                 ],
                 "techniques": [
                    { "name": "hq", "passes": [
                        { "name": "a", "fragment": { "profile": "ps_3_0", "source": "tint scene" } },
                        { "name": "b", "vertex": { "profile": "vs_3_0", "source": "" } }
                    ] },
                    { "name": "lq", "passes": [] }
                 ] }"#,
        )
        .unwrap();

        assert_eq!(effect.technique_count(), 2);
        assert!(effect.default_technique().is_none());
        let hq = effect.technique_by_name("hq").unwrap();
        assert_eq!(hq.passes()[0].technique_name(), "hq");

        let fragment = hq.passes()[0].program(Stage::Fragment).unwrap();
        assert_eq!(fragment.label(), "fx/hq/a:Fragment");
        assert!(fragment.constants().references("tint"));
        assert!(fragment.constants().references("scene"));
        assert!(hq.passes()[0].program(Stage::Vertex).is_none());

        let tint = effect.parameter("tint").unwrap();
        assert_eq!(&tint.scalar()[..5], &[1.0, 0.5, 0.25, 1.0, 0.0]);
        assert_eq!(tint.effect_name(), Some("fx"));
        assert!(!tint.is_virtual());
    }

    #[test]
    fn unknown_parameter_type_is_a_hard_error() {
        let err = compile(r#"{ "name": "fx", "parameters": [{ "name": "n", "type": "int3" }] }"#)
            .unwrap_err();
        assert!(matches!(err, EffectError::UnknownParameterType { .. }));
    }

    #[test]
    fn compile_errors_name_the_pass() {
        let err = compile(
            r#"{ "name": "fx", "techniques": [{ "name": "t", "passes": [
                { "name": "p", "vertex": { "profile": "ps_3_0", "source": "" } } ] }] }"#,
        )
        .unwrap_err();
        match err {
            EffectError::Compile { effect, pass, .. } => {
                assert_eq!(effect, "fx");
                assert_eq!(pass, "t/p");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
