//! Turns a freshly compiled [`Effect`] into a render-ready graph.
//!
//! Linking runs once per effect, in four steps that each fail independently:
//! parameter linking, sampler resolution, technique validation and target resolution.
//! Problems are collected into a [`LinkReport`]; the effect is usable (or inert) either way.

use crate::effect::annotation::LinkDirective;
use crate::effect::parameter::{ParameterCategory, ParameterRegistry};
use crate::effect::pass::TargetBinding;
use crate::effect::program::{CompiledProgram, ProgramCompiler};
use crate::effect::shader::Effect;
use crate::error::LinkError;
use crate::renderer::RenderDevice;
use crate::texture::{staging, TextureRegistry};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkReport {
    pub errors: Vec<LinkError>,
}

impl LinkReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_valid_technique(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|err| matches!(err, LinkError::NoValidTechnique(_)))
    }
}

/// Borrowed view of a session's registries and device for the duration of one link.
pub struct Linker<'a, D: RenderDevice> {
    parameters: &'a ParameterRegistry,
    textures: &'a mut TextureRegistry,
    compiler: &'a ProgramCompiler,
    device: &'a mut D,
}

impl<'a, D: RenderDevice> Linker<'a, D> {
    pub fn new(
        parameters: &'a ParameterRegistry,
        textures: &'a mut TextureRegistry,
        compiler: &'a ProgramCompiler,
        device: &'a mut D,
    ) -> Self {
        Self {
            parameters,
            textures,
            compiler,
            device,
        }
    }

    pub fn link(&mut self, effect: &mut Effect) -> LinkReport {
        let mut report = LinkReport::default();

        self.link_parameters(effect, &mut report);
        self.resolve_samplers(effect, &mut report);
        self.validate_techniques(effect, &mut report);
        self.resolve_targets(effect, &mut report);

        log::info!(
            "Linked effect '{}': default technique {:?}, {} problem(s)",
            effect.name(),
            effect.default_technique().map(|t| t.name()),
            report.errors.len()
        );
        report
    }

    fn link_parameters(&mut self, effect: &Effect, report: &mut LinkReport) {
        for (parameter, directives) in effect.parameter_links() {
            report_malformed(parameter.name(), directives, report);

            let Some(global) = LinkDirective::global_link(directives) else {
                continue;
            };
            let ty = parameter.parameter_type();

            match self.parameters.find(global, ty) {
                Some(virtual_parameter) => {
                    if let Err(err) = virtual_parameter.attach(parameter) {
                        log::warn!("Effect '{}': {}", effect.name(), err);
                        report.errors.push(err);
                    } else {
                        log::debug!(
                            "Attached '{}.{}' to global '{}'",
                            effect.name(),
                            parameter.name(),
                            global
                        );
                    }
                }
                None => {
                    let err = LinkError::UnresolvedGlobalLink {
                        parameter: parameter.name().to_string(),
                        global: global.to_string(),
                        ty,
                    };
                    log::warn!("Effect '{}': {}; keeping the default", effect.name(), err);
                    report.errors.push(err);
                }
            }
        }
    }

    fn resolve_samplers(&mut self, effect: &Effect, report: &mut LinkReport) {
        for (parameter, directives) in effect.parameter_links() {
            if parameter.category() != ParameterCategory::Sampler || parameter.texture().is_some()
            {
                continue;
            }
            let Some((name, blank)) = LinkDirective::texture(directives) else {
                continue;
            };

            if let Some(handle) = self.textures.find(name) {
                parameter.set_texture(Some(handle));
                continue;
            }

            if let Some(path) = self.compiler.resolve_file(name) {
                match self.device.load_texture(name, &path) {
                    Ok((backing, desc)) => match self.textures.register(name, backing, desc) {
                        Ok(handle) => {
                            log::debug!("Loaded texture '{}' from {:?}", name, path);
                            parameter.set_texture(Some(handle));
                            continue;
                        }
                        Err(err) => report.errors.push(err),
                    },
                    Err(err) => {
                        log::warn!("Texture '{}' could not be loaded: {}", name, err);
                    }
                }
            }

            let desc = match blank {
                Ok(desc) => desc,
                Err(reason) => {
                    let err = LinkError::UnresolvedSamplerTexture {
                        parameter: parameter.name().to_string(),
                        reason: format!("'{}' is not registered or loadable and {}", name, reason),
                    };
                    log::warn!("Effect '{}': {}", effect.name(), err);
                    report.errors.push(err);
                    continue;
                }
            };

            let registered = self
                .device
                .create_texture(name, desc)
                .map_err(LinkError::from)
                .and_then(|backing| self.textures.register(name, backing, *desc));
            match registered {
                Ok(handle) => {
                    log::debug!("Synthesized blank target '{}' {:?}", name, desc);
                    parameter.set_texture(Some(handle));
                }
                Err(err) => {
                    log::warn!("Effect '{}': {}", effect.name(), err);
                    report.errors.push(err);
                }
            }
        }
    }

    fn validate_techniques(&mut self, effect: &mut Effect, report: &mut LinkReport) {
        let effect_name = effect.name().to_string();

        for technique in effect.techniques_mut() {
            let technique_name = technique.name().to_string();
            let mut any_valid = false;

            for pass in technique.passes_mut() {
                let programs: Vec<&CompiledProgram> = pass.programs().collect();
                let verdict = self.validate_pass(&programs);
                if let Err(reason) = &verdict {
                    log::warn!(
                        "Pass '{}/{}/{}' is not usable: {}",
                        effect_name,
                        technique_name,
                        pass.name(),
                        reason
                    );
                }
                pass.set_valid(verdict.is_ok());
                any_valid |= verdict.is_ok();
            }

            if !technique.mark_validated(any_valid) {
                log::warn!(
                    "Technique '{}' of effect '{}' failed validation",
                    technique_name,
                    effect_name
                );
            }
        }

        let default = effect.techniques().iter().position(|t| t.is_valid());
        effect.set_default_technique(default);

        if default.is_none() {
            log::warn!(
                "Effect '{}' has no valid technique and will not be rendered",
                effect_name
            );
            report.errors.push(LinkError::NoValidTechnique(effect_name));
        }
    }

    fn validate_pass(&mut self, programs: &[&CompiledProgram]) -> Result<(), String> {
        if programs.is_empty() {
            return Err("no stage programs".to_string());
        }
        if let Some(program) = programs
            .iter()
            .find(|program| !self.device.supports_profile(program.profile()))
        {
            return Err(format!(
                "profile '{}' of {} is not supported by the device",
                program.profile().name(),
                program.label()
            ));
        }
        self.device
            .validate_programs(programs)
            .map_err(|err| err.to_string())
    }

    fn resolve_targets(&mut self, effect: &mut Effect, report: &mut LinkReport) {
        let effect_name = effect.name().to_string();
        let last_pass = self.textures.find(staging::LAST_PASS);
        let last_shader = self.textures.find(staging::LAST_SHADER);

        for technique in effect.techniques_mut() {
            let technique_owner = format!("{}/{}", effect_name, technique.name());
            report_malformed(&technique_owner, technique.directives(), report);

            let explicit = LinkDirective::target(technique.directives())
                .and_then(|name| self.textures.find(name));
            // Technique-scope fallback is silent.
            let binding = match explicit {
                Some(texture) => Some(TargetBinding {
                    texture,
                    explicit: true,
                }),
                None => last_shader.map(|texture| TargetBinding {
                    texture,
                    explicit: false,
                }),
            };
            if let Some(binding) = binding {
                technique.set_target(binding);
            }

            for pass in technique.passes_mut() {
                let owner = format!("{}/{}", technique_owner, pass.name());
                report_malformed(&owner, pass.directives(), report);

                let requested = LinkDirective::target(pass.directives());
                let explicit = requested.and_then(|name| self.textures.find(name));
                let binding = match explicit {
                    Some(texture) => Some(TargetBinding {
                        texture,
                        explicit: true,
                    }),
                    None => {
                        match requested {
                            Some(name) => log::warn!(
                                "Pass '{}' targets unregistered texture '{}'; using '{}'",
                                owner,
                                name,
                                staging::LAST_PASS
                            ),
                            None => log::debug!(
                                "Pass '{}' renders into '{}'",
                                owner,
                                staging::LAST_PASS
                            ),
                        }
                        last_pass.map(|texture| TargetBinding {
                            texture,
                            explicit: false,
                        })
                    }
                };
                if let Some(binding) = binding {
                    pass.set_target(binding);
                }
            }
        }
    }
}

fn report_malformed(owner: &str, directives: &[LinkDirective], report: &mut LinkReport) {
    for directive in directives {
        if let LinkDirective::Malformed { annotation, reason } = directive {
            let err = LinkError::InvalidAnnotation {
                owner: owner.to_string(),
                annotation: annotation.clone(),
                reason: reason.clone(),
            };
            log::warn!("{}", err);
            report.errors.push(err);
        }
    }
}
