//! Virtual parameters and attachment propagation through a session.

mod common;

use common::*;
use glam::{Mat4, Vec4};
use serde_json::json;
use wgpu_effects::effect::MAX_COMPONENTS;
use wgpu_effects::{LinkError, ParameterType};

fn effect_with_linked(global: &str, ty: &str) -> serde_json::Value {
    effect(
        "fx",
        vec![json!({ "name": "local", "type": ty, "annotations": { "global": global } })],
        vec![technique("t", vec![pass("p", "float4 main() : COLOR { return local; }")])],
    )
}

#[test]
fn writes_to_a_virtual_parameter_reach_every_attachment() {
    let mut session = session();
    let global = session.create_virtual("camera", ParameterType::Float4).unwrap();
    let a = load(&mut session, &effect_with_linked("camera", "float4")).id;
    let b = load(&mut session, &effect_with_linked("camera", "float4")).id;

    global.set_vec4(Vec4::new(1.0, 2.0, 3.0, 4.0));

    for id in [a, b] {
        let local = session.effect(id).unwrap().parameter("local").unwrap();
        assert_eq!(&local.scalar()[..4], &[1.0, 2.0, 3.0, 4.0]);
    }
    assert_eq!(global.attachments().len(), 2);
}

#[test]
fn last_write_before_the_draw_wins() {
    let mut session = session();
    let speed = session.create_virtual("speed", ParameterType::Float1).unwrap();
    load(&mut session, &effect_with_linked("speed", "float"));

    speed.set_float(1.0);
    speed.set_float(7.0);
    session.render_frame(None).unwrap();

    assert_eq!(
        session.device().constant("fx/t/p:Fragment", 0),
        Some([7.0, 0.0, 0.0, 0.0])
    );
}

#[test]
fn attaching_to_an_effect_parameter_fails_without_side_effects() {
    let mut session = session();
    let id = load(&mut session, &effect_with_linked("nothing", "float4")).id;
    let source = session.create_virtual("source", ParameterType::Float4).unwrap();
    source.set_vec4(Vec4::splat(5.0));

    let target = session.effect(id).unwrap().parameter("local").unwrap().clone();
    target.set_vec4(Vec4::splat(1.0));

    let err = session.attach(&target, &source).unwrap_err();

    assert!(matches!(err, LinkError::NotVirtual { .. }));
    assert!(target.attachments().is_empty());
    assert!(source.attachments().is_empty());
    assert_eq!(&target.scalar()[..4], &[1.0; 4]);
    assert_eq!(&source.scalar()[..4], &[5.0; 4]);
}

#[test]
fn attachment_cycles_are_rejected() {
    let mut session = session();
    let a = session.create_virtual("a", ParameterType::Float1).unwrap();
    let b = session.create_virtual("b", ParameterType::Float1).unwrap();
    let c = session.create_virtual("c", ParameterType::Float1).unwrap();

    session.attach(&a, &b).unwrap();
    session.attach(&b, &c).unwrap();
    assert!(matches!(session.attach(&c, &a), Err(LinkError::AttachCycle { .. })));
    assert!(matches!(session.attach(&a, &a), Err(LinkError::AttachCycle { .. })));
    assert!(c.attachments().is_empty());

    a.set_float(9.0);
    assert_eq!(c.scalar()[0], 9.0);
}

#[test]
fn duplicate_virtual_names_are_rejected() {
    let mut session = session();
    session.create_virtual("exposure", ParameterType::Float1).unwrap();
    assert_eq!(
        session
            .create_virtual("exposure", ParameterType::Float4)
            .unwrap_err(),
        LinkError::DuplicateParameterName("exposure".into())
    );
    assert_eq!(
        session
            .parameters()
            .get("exposure")
            .unwrap()
            .parameter_type(),
        ParameterType::Float1
    );
}

#[test]
fn scalar_writes_zero_fill_and_truncate() {
    let mut session = session();
    let p = session.create_virtual("p", ParameterType::Matrix).unwrap();

    p.set_scalar(&(0..MAX_COMPONENTS).map(|v| v as f32 + 10.0).collect::<Vec<_>>());
    p.set_scalar(&[1.0, 2.0, 3.0, 4.0]);
    let mut expected = [0.0; MAX_COMPONENTS];
    expected[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(p.scalar(), expected);

    let long: Vec<f32> = (0..20).map(|v| v as f32).collect();
    p.set_scalar(&long);
    assert_eq!(p.scalar().as_slice(), &long[..MAX_COMPONENTS]);

    p.set_matrix(&Mat4::IDENTITY);
    assert_eq!(p.scalar(), Mat4::IDENTITY.to_cols_array());
}

#[test]
fn unloaded_effects_drop_out_of_the_attachment_list() {
    let mut session = session();
    let global = session.create_virtual("camera", ParameterType::Float4).unwrap();
    let a = load(&mut session, &effect_with_linked("camera", "float4")).id;
    load(&mut session, &effect_with_linked("camera", "float4"));
    assert_eq!(global.attachments().len(), 2);

    session.unload_effect(a);
    global.set_vec4(Vec4::ONE);

    assert_eq!(global.attachments().len(), 1);
}

#[test]
fn textures_propagate_like_scalars() {
    let mut session = session();
    let global = session.create_virtual("env", ParameterType::Sampler2D).unwrap();
    let id = load(&mut session, &effect_with_linked("env", "sampler2D")).id;

    let frame = session.textures().find(":thisframe");
    global.set_texture(frame);

    let local = session.effect(id).unwrap().parameter("local").unwrap();
    assert_eq!(local.texture(), frame);

    global.set_texture(None);
    assert_eq!(local.texture(), None);
}
