//! Parameters: named value cells shared between effects and the session.
//!
//! A parameter is either *virtual* (created by the session, not tied to any effect) or
//! *effect-bound* (declared by an effect and dropped with it). Virtual parameters carry a
//! list of attached parameters; every write to a virtual parameter is pushed to all of
//! them immediately, so an attached parameter always holds the value of the last write
//! that preceded its use. Attachments are weak: dropping an effect silently removes its
//! parameters from every virtual parameter they were attached to.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::{Mat4, Vec4};

use crate::asset::Handle;
use crate::error::LinkError;
use crate::texture::Texture;

/// Number of floats a parameter can hold; a 4x4 matrix.
pub const MAX_COMPONENTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterCategory {
    Scalar,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Float1,
    Float2,
    Float3,
    Float4,
    Matrix,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

impl ParameterType {
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name.trim() {
            "float" | "float1" | "f32" => Self::Float1,
            "float2" | "vec2" | "vec2f" => Self::Float2,
            "float3" | "vec3" | "vec3f" => Self::Float3,
            "float4" | "vec4" | "vec4f" => Self::Float4,
            "float4x4" | "matrix" | "mat4x4f" => Self::Matrix,
            "sampler1D" | "sampler1d" => Self::Sampler1D,
            "sampler" | "sampler2D" | "sampler2d" | "texture_2d" => Self::Sampler2D,
            "sampler3D" | "sampler3d" | "texture_3d" => Self::Sampler3D,
            "samplerCUBE" | "samplerCube" | "samplercube" | "texture_cube" => Self::SamplerCube,
            _ => return None,
        };
        Some(ty)
    }

    pub fn category(self) -> ParameterCategory {
        match self {
            Self::Float1 | Self::Float2 | Self::Float3 | Self::Float4 | Self::Matrix => {
                ParameterCategory::Scalar
            }
            Self::Sampler1D | Self::Sampler2D | Self::Sampler3D | Self::SamplerCube => {
                ParameterCategory::Sampler
            }
        }
    }

    /// Floats used by the type; 0 for samplers.
    pub fn components(self) -> usize {
        match self {
            Self::Float1 => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
            Self::Matrix => 16,
            _ => 0,
        }
    }

    /// vec4 constant registers occupied by the type; 0 for samplers.
    pub fn registers(self) -> u32 {
        match self {
            Self::Matrix => 4,
            ty if ty.category() == ParameterCategory::Scalar => 1,
            _ => 0,
        }
    }
}

struct ParameterState {
    scalars: [f32; MAX_COMPONENTS],
    texture: Option<Handle<Texture>>,
    written: bool,
    attached: Vec<Weak<ParameterCell>>,
}

struct ParameterCell {
    name: String,
    ty: ParameterType,
    is_virtual: bool,
    effect: Option<String>,
    state: RefCell<ParameterState>,
}

/// A single write, mirrored as-is into every attachment.
#[derive(Clone, Copy)]
enum Update {
    Scalars([f32; MAX_COMPONENTS]),
    Texture(Option<Handle<Texture>>),
}

/// Shared handle to a parameter. Cloning is cheap and yields the same cell.
#[derive(Clone)]
pub struct Parameter(Rc<ParameterCell>);

impl Parameter {
    pub(crate) fn new_virtual(name: &str, ty: ParameterType) -> Self {
        Self::new(name, ty, true, None)
    }

    pub(crate) fn new_effect(name: &str, ty: ParameterType, effect: &str) -> Self {
        Self::new(name, ty, false, Some(effect.to_string()))
    }

    fn new(name: &str, ty: ParameterType, is_virtual: bool, effect: Option<String>) -> Self {
        Self(Rc::new(ParameterCell {
            name: name.to_string(),
            ty,
            is_virtual,
            effect,
            state: RefCell::new(ParameterState {
                scalars: [0.0; MAX_COMPONENTS],
                texture: None,
                written: false,
                attached: Vec::new(),
            }),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.0.ty
    }

    pub fn category(&self) -> ParameterCategory {
        self.0.ty.category()
    }

    pub fn is_virtual(&self) -> bool {
        self.0.is_virtual
    }

    /// Name of the effect that declared this parameter; `None` for virtual parameters.
    pub fn effect_name(&self) -> Option<&str> {
        self.0.effect.as_deref()
    }

    pub fn same_as(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Copy up to 16 floats into the parameter; extra components are dropped and the
    /// unused tail is zeroed. Pushed to every attached parameter before returning.
    pub fn set_scalar(&self, values: &[f32]) {
        {
            let mut state = self.0.state.borrow_mut();
            let count = values.len().min(MAX_COMPONENTS);
            state.scalars = [0.0; MAX_COMPONENTS];
            state.scalars[..count].copy_from_slice(&values[..count]);
            state.written = true;
        }
        self.propagate(Update::Scalars(self.scalar()));
    }

    pub fn scalar(&self) -> [f32; MAX_COMPONENTS] {
        self.0.state.borrow().scalars
    }

    pub fn set_float(&self, value: f32) {
        self.set_scalar(&[value]);
    }

    pub fn set_vec4(&self, value: Vec4) {
        self.set_scalar(&value.to_array());
    }

    /// Column-major, matching `Mat4::to_cols_array`.
    pub fn set_matrix(&self, value: &Mat4) {
        self.set_scalar(&value.to_cols_array());
    }

    /// Accepted for any category. On a scalar parameter the texture is stored but never
    /// reaches a program.
    pub fn set_texture(&self, texture: Option<Handle<Texture>>) {
        {
            let mut state = self.0.state.borrow_mut();
            state.texture = texture;
            state.written = true;
        }
        self.propagate(Update::Texture(texture));
    }

    pub fn texture(&self) -> Option<Handle<Texture>> {
        self.0.state.borrow().texture
    }

    /// Attach `source` so that writes to `self` are mirrored into it.
    ///
    /// Fails, leaving both parameters untouched, when `self` is not virtual or the edge
    /// would make propagation loop. Attaching twice is a no-op.
    pub fn attach(&self, source: &Parameter) -> Result<(), LinkError> {
        if !self.is_virtual() {
            return Err(LinkError::NotVirtual {
                target: self.name().to_string(),
                source_name: source.name().to_string(),
            });
        }
        if self.same_as(source) || source.reaches(self) {
            return Err(LinkError::AttachCycle {
                target: self.name().to_string(),
                source_name: source.name().to_string(),
            });
        }

        {
            let mut state = self.0.state.borrow_mut();
            state.attached.retain(|weak| weak.strong_count() > 0);
            let already = state
                .attached
                .iter()
                .any(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(&source.0)));
            if already {
                return Ok(());
            }
            state.attached.push(Rc::downgrade(&source.0));
        }

        // Bring the new attachment up to date with anything written before the link.
        let (scalars, texture, written) = {
            let state = self.0.state.borrow();
            (state.scalars, state.texture, state.written)
        };
        if written {
            source.receive(Update::Scalars(scalars));
            if texture.is_some() {
                source.receive(Update::Texture(texture));
            }
        }
        Ok(())
    }

    pub fn detach(&self, source: &Parameter) -> bool {
        let mut state = self.0.state.borrow_mut();
        let before = state.attached.len();
        state
            .attached
            .retain(|weak| !std::ptr::eq(weak.as_ptr(), Rc::as_ptr(&source.0)));
        before != state.attached.len()
    }

    /// Live attached parameters; dropped ones are skipped.
    pub fn attachments(&self) -> Vec<Parameter> {
        self.0
            .state
            .borrow()
            .attached
            .iter()
            .filter_map(Weak::upgrade)
            .map(Parameter)
            .collect()
    }

    fn reaches(&self, other: &Parameter) -> bool {
        self.attachments()
            .iter()
            .any(|child| child.same_as(other) || child.reaches(other))
    }

    fn receive(&self, update: Update) {
        {
            let mut state = self.0.state.borrow_mut();
            match update {
                Update::Scalars(scalars) => state.scalars = scalars,
                Update::Texture(texture) => state.texture = texture,
            }
            state.written = true;
        }
        self.propagate(update);
    }

    fn propagate(&self, update: Update) {
        let children = {
            let mut state = self.0.state.borrow_mut();
            if state.attached.is_empty() {
                return;
            }
            state.attached.retain(|weak| weak.strong_count() > 0);
            let children: Vec<Parameter> = state
                .attached
                .iter()
                .filter_map(Weak::upgrade)
                .map(Parameter)
                .collect();
            children
        };

        for child in children {
            child.receive(update);
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Parameter")
            .field("name", &self.0.name)
            .field("type", &self.0.ty)
            .field("virtual", &self.0.is_virtual)
            .field("effect", &self.0.effect)
            .field("attached", &state.attached.len())
            .finish()
    }
}

/// The session's namespace of virtual parameters.
#[derive(Default)]
pub struct ParameterRegistry {
    parameters: HashMap<String, Parameter>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_virtual(&mut self, name: &str, ty: ParameterType) -> Result<Parameter, LinkError> {
        if self.parameters.contains_key(name) {
            return Err(LinkError::DuplicateParameterName(name.to_string()));
        }
        let parameter = Parameter::new_virtual(name, ty);
        self.parameters.insert(name.to_string(), parameter.clone());
        log::debug!("Registered virtual parameter '{}' ({:?})", name, ty);
        Ok(parameter)
    }

    /// Lookup by name *and* type. A name match with another type is "not found".
    pub fn find(&self, name: &str, ty: ParameterType) -> Option<Parameter> {
        self.parameters
            .get(name)
            .filter(|parameter| parameter.parameter_type() == ty)
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).cloned()
    }

    pub fn attach(&self, target: &Parameter, source: &Parameter) -> Result<(), LinkError> {
        target.attach(source)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.parameters.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_scalar_zero_fills_tail() {
        let p = Parameter::new_effect("tint", ParameterType::Float4, "fx");
        p.set_scalar(&[1.0, 2.0, 3.0, 4.0]);

        let mut expected = [0.0; MAX_COMPONENTS];
        expected[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(p.scalar(), expected);
    }

    #[test]
    fn set_scalar_drops_components_past_sixteen() {
        let p = Parameter::new_effect("m", ParameterType::Matrix, "fx");
        let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
        p.set_scalar(&values);
        assert_eq!(p.scalar()[15], 15.0);
        assert_eq!(p.scalar().len(), MAX_COMPONENTS);
    }

    #[test]
    fn writes_push_to_attachments() {
        let time = Parameter::new_virtual("time", ParameterType::Float1);
        let a = Parameter::new_effect("time", ParameterType::Float1, "a");
        let b = Parameter::new_effect("time", ParameterType::Float1, "b");
        time.attach(&a).unwrap();
        time.attach(&b).unwrap();

        time.set_float(2.5);
        time.set_float(3.5);

        assert_eq!(a.scalar()[0], 3.5);
        assert_eq!(b.scalar()[0], 3.5);
    }

    #[test]
    fn attach_on_effect_parameter_fails_without_mutation() {
        let target = Parameter::new_effect("t", ParameterType::Float1, "fx");
        let source = Parameter::new_effect("s", ParameterType::Float1, "fx");
        target.set_float(7.0);
        source.set_float(1.0);

        let err = target.attach(&source).unwrap_err();

        assert!(matches!(err, LinkError::NotVirtual { .. }));
        assert!(target.attachments().is_empty());
        assert_eq!(target.scalar()[0], 7.0);
        assert_eq!(source.scalar()[0], 1.0);
    }

    #[test]
    fn attach_rejects_cycles() {
        let a = Parameter::new_virtual("a", ParameterType::Float1);
        let b = Parameter::new_virtual("b", ParameterType::Float1);
        a.attach(&b).unwrap();

        assert!(matches!(b.attach(&a), Err(LinkError::AttachCycle { .. })));
        assert!(matches!(a.attach(&a), Err(LinkError::AttachCycle { .. })));
    }

    #[test]
    fn virtual_chains_propagate() {
        let camera = Parameter::new_virtual("camera", ParameterType::Matrix);
        let alias = Parameter::new_virtual("view", ParameterType::Matrix);
        let leaf = Parameter::new_effect("view", ParameterType::Matrix, "fx");
        camera.attach(&alias).unwrap();
        alias.attach(&leaf).unwrap();

        camera.set_matrix(&Mat4::from_scale(glam::Vec3::splat(2.0)));

        assert_eq!(leaf.scalar()[0], 2.0);
        assert_eq!(leaf.scalar()[15], 1.0);
    }

    #[test]
    fn dropped_attachments_are_pruned() {
        let time = Parameter::new_virtual("time", ParameterType::Float1);
        {
            let short_lived = Parameter::new_effect("time", ParameterType::Float1, "fx");
            time.attach(&short_lived).unwrap();
            assert_eq!(time.attachments().len(), 1);
        }
        time.set_float(1.0);
        assert!(time.attachments().is_empty());
    }

    #[test]
    fn attach_pushes_previous_write() {
        let time = Parameter::new_virtual("time", ParameterType::Float1);
        let fresh = Parameter::new_effect("time", ParameterType::Float1, "fx");
        fresh.set_float(9.0);

        let unwritten = Parameter::new_virtual("unused", ParameterType::Float1);
        unwritten.attach(&fresh).unwrap();
        assert_eq!(fresh.scalar()[0], 9.0);

        time.set_float(4.0);
        time.attach(&fresh).unwrap();
        assert_eq!(fresh.scalar()[0], 4.0);
    }

    #[test]
    fn clearing_a_texture_reaches_attachments() {
        let env = Parameter::new_virtual("env", ParameterType::Sampler2D);
        let local = Parameter::new_effect("env", ParameterType::Sampler2D, "fx");
        env.attach(&local).unwrap();

        env.set_texture(Some(Handle::new(4)));
        assert_eq!(local.texture(), Some(Handle::new(4)));

        env.set_texture(None);
        assert_eq!(local.texture(), None);
    }

    #[test]
    fn scalar_writes_leave_attached_textures_alone() {
        let env = Parameter::new_virtual("env", ParameterType::Sampler2D);
        let local = Parameter::new_effect("env", ParameterType::Sampler2D, "fx");
        local.set_texture(Some(Handle::new(2)));

        env.set_float(1.0);
        env.attach(&local).unwrap();
        env.set_float(2.0);

        assert_eq!(local.texture(), Some(Handle::new(2)));
        assert_eq!(local.scalar()[0], 2.0);
    }

    #[test]
    fn registry_lookup_is_by_name_and_type() {
        let mut registry = ParameterRegistry::new();
        registry.create_virtual("time", ParameterType::Float1).unwrap();

        assert!(registry.find("time", ParameterType::Float1).is_some());
        assert!(registry.find("time", ParameterType::Float4).is_none());
        assert_eq!(
            registry.create_virtual("time", ParameterType::Float4).unwrap_err(),
            LinkError::DuplicateParameterName("time".into())
        );
    }

    #[test]
    fn type_parse_and_shape() {
        assert_eq!(ParameterType::parse("float4x4"), Some(ParameterType::Matrix));
        assert_eq!(ParameterType::parse("sampler2D"), Some(ParameterType::Sampler2D));
        assert_eq!(ParameterType::parse("int"), None);
        assert_eq!(ParameterType::Matrix.registers(), 4);
        assert_eq!(ParameterType::Float3.registers(), 1);
        assert_eq!(ParameterType::SamplerCube.registers(), 0);
        assert_eq!(ParameterType::Float2.components(), 2);
    }
}
