// error.rs
use std::path::PathBuf;

use thiserror::Error;

use crate::effect::{ParameterType, Stage};

/// Raised while turning a compiled effect into a render-ready graph.
///
/// Only `DuplicateParameterName`, `DuplicateTextureName`, `NotVirtual` and `AttachCycle`
/// are returned directly to callers; the rest are collected into a
/// [`LinkReport`](crate::effect::LinkReport) because linking never aborts half-way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("a parameter named '{0}' is already registered")]
    DuplicateParameterName(String),

    #[error("a texture named '{0}' is already registered")]
    DuplicateTextureName(String),

    #[error("parameter '{target}' is not virtual and cannot accept '{source_name}'")]
    NotVirtual { target: String, source_name: String },

    #[error("attaching '{source_name}' to '{target}' would create a cycle")]
    AttachCycle { target: String, source_name: String },

    #[error("parameter '{parameter}' links to global '{global}' ({ty:?}), which is not registered")]
    UnresolvedGlobalLink {
        parameter: String,
        global: String,
        ty: ParameterType,
    },

    #[error("sampler '{parameter}' could not be given a texture: {reason}")]
    UnresolvedSamplerTexture { parameter: String, reason: String },

    #[error("annotation '{annotation}' on '{owner}' is malformed: {reason}")]
    InvalidAnnotation {
        owner: String,
        annotation: String,
        reason: String,
    },

    #[error("effect '{0}' has no valid technique")]
    NoValidTechnique(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Raised by the bind step of a pass. Always swallowed at pass level by the renderer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("{stage:?} program '{program}' failed to load: {reason}")]
    ProgramLoadFailed {
        stage: Stage,
        program: String,
        reason: String,
    },

    #[error("{stage:?} program '{program}' failed to bind: {reason}")]
    ProgramBindFailed {
        stage: Stage,
        program: String,
        reason: String,
    },
}

/// Errors reported by the underlying graphics runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("the graphics device was lost")]
    Lost,

    #[error("invalid device call: {0}")]
    InvalidCall(String),

    #[error("failed to create texture '{name}': {reason}")]
    TextureCreation { name: String, reason: String },

    #[error("failed to load texture from {path:?}: {reason}")]
    TextureLoad { path: PathBuf, reason: String },
}

/// Raised by [`ProgramCompiler`](crate::effect::ProgramCompiler).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("profile '{profile}' cannot compile a {stage:?} program")]
    StageMismatch { profile: String, stage: Stage },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("{stage:?} program declares neither inline source nor a file")]
    MissingSource { stage: Stage },

    #[error("program file '{0}' was not found")]
    FileNotFound(String),

    #[error("failed to read program file {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Hard failures while loading an effect. Link problems are never reported here.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("effect {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("failed to parse effect '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("effect '{effect}', pass '{pass}': {source}")]
    Compile {
        effect: String,
        pass: String,
        #[source]
        source: CompileError,
    },

    #[error("unknown parameter type '{ty}' for '{parameter}'")]
    UnknownParameterType { parameter: String, ty: String },
}
