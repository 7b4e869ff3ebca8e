//! Link-time behaviour: global links, sampler resolution, technique selection and target
//! fallbacks.

mod common;

use common::*;
use serde_json::json;
use wgpu_effects::texture::{staging, TextureDesc, TextureFormat};
use wgpu_effects::{EffectError, EffectSettings, LinkError, ParameterType, RenderSession};

fn single_pass(parameters: Vec<serde_json::Value>) -> serde_json::Value {
    effect(
        "fx",
        parameters,
        vec![technique("t", vec![pass("p", "float4 main() : COLOR { return 0; }")])],
    )
}

#[test]
fn default_technique_is_the_first_that_validates() {
    let profiles = ["ps_2_0", "ps_2_0", "ps_3_0", "ps_2_0", "ps_2_0", "ps_3_0"];
    let techniques: Vec<_> = profiles
        .iter()
        .enumerate()
        .map(|(i, profile)| technique(&format!("t{}", i), vec![fragment_pass("p", profile)]))
        .collect();
    let document = effect("fx", vec![], techniques);

    for _ in 0..3 {
        let mut session = session_with(device().without_profile("ps_2_0"));
        let id = load(&mut session, &document).id;
        let effect = session.effect(id).unwrap();

        assert_eq!(effect.technique_count(), 6);
        assert_eq!(effect.default_technique_index(), Some(2));
        assert!(effect.technique(5).unwrap().is_valid());
        assert!(!effect.technique(3).unwrap().is_valid());
    }
}

#[test]
fn unsupported_profile_technique_stays_retrievable_but_never_default() {
    let document = effect(
        "fx",
        vec![],
        vec![
            technique("fancy", vec![fragment_pass("p", "ps_4_0")]),
            technique("basic", vec![fragment_pass("p", "ps_3_0")]),
        ],
    );
    let mut session = session_with(device().without_profile("ps_4_0"));
    let loaded = load(&mut session, &document);
    let effect = session.effect(loaded.id).unwrap();

    assert_eq!(effect.technique_count(), 2);
    assert_eq!(effect.default_technique().unwrap().name(), "basic");
    let fancy = effect.technique(0).unwrap();
    assert_eq!(fancy.name(), "fancy");
    assert!(fancy.is_validated());
    assert!(!fancy.is_valid());
    assert!(!loaded
        .errors
        .iter()
        .any(|err| matches!(err, LinkError::NoValidTechnique(_))));
}

#[test]
fn no_valid_technique_is_reported_once() {
    let mut session = session_with(device().without_profile("ps_3_0"));
    let loaded = load(&mut session, &single_pass(vec![]));

    let reported = loaded
        .errors
        .iter()
        .filter(|err| matches!(err, LinkError::NoValidTechnique(name) if name == "fx"))
        .count();
    assert_eq!(reported, 1);
    assert!(session.effect(loaded.id).unwrap().default_technique().is_none());
}

#[test]
fn pass_with_no_programs_is_invalid() {
    let document = effect("fx", vec![], vec![technique("t", vec![json!({ "name": "empty" })])]);
    let mut session = session();
    let loaded = load(&mut session, &document);

    let effect = session.effect(loaded.id).unwrap();
    assert!(!effect.technique(0).unwrap().passes()[0].is_valid());
    assert!(effect.default_technique().is_none());
}

#[test]
fn unresolved_targets_fall_back_to_their_own_staging_texture() {
    let mut first = pass("p", "x");
    first["annotations"] = json!({ "target": "nowhere" });
    let mut tech = technique("t", vec![first]);
    tech["annotations"] = json!({ "target": "nowhere" });

    let mut session = session();
    let id = load(&mut session, &effect("fx", vec![], vec![tech])).id;

    let last_pass = session.textures().find(staging::LAST_PASS).unwrap();
    let last_shader = session.textures().find(staging::LAST_SHADER).unwrap();
    let technique = session.effect(id).unwrap().technique(0).unwrap();

    let technique_target = technique.target().unwrap();
    assert_eq!(technique_target.texture, last_shader);
    assert!(!technique_target.explicit);

    let pass_target = technique.passes()[0].target().unwrap();
    assert_eq!(pass_target.texture, last_pass);
    assert!(!pass_target.explicit);
    assert_ne!(pass_target.texture, technique_target.texture);
}

#[test]
fn registered_targets_are_explicit() {
    let mut session = session();
    let glow = session
        .create_texture("glow", TextureDesc::render_target(32, 32, TextureFormat::Rgba8))
        .unwrap();
    let mut first = pass("p", "x");
    first["annotations"] = json!({ "target": "glow" });

    let id = load(&mut session, &effect("fx", vec![], vec![technique("t", vec![first])])).id;

    let target = session.effect(id).unwrap().technique(0).unwrap().passes()[0]
        .target()
        .unwrap();
    assert_eq!(target.texture, glow);
    assert!(target.explicit);
}

#[test]
fn global_link_attaches_to_the_virtual_parameter() {
    let mut session = session();
    let exposure = session.create_virtual("exposure", ParameterType::Float1).unwrap();
    exposure.set_float(0.5);

    let id = load(
        &mut session,
        &single_pass(vec![json!({
            "name": "gain",
            "type": "float",
            "default": [1.0],
            "annotations": { "parameter": "exposure" }
        })]),
    )
    .id;

    let gain = session.effect(id).unwrap().parameter("gain").unwrap().clone();
    assert_eq!(gain.scalar()[0], 0.5);
    exposure.set_float(3.0);
    assert_eq!(gain.scalar()[0], 3.0);
}

#[test]
fn global_link_with_mismatched_type_is_unresolved() {
    let mut session = session();
    session.create_virtual("exposure", ParameterType::Float4).unwrap();

    let loaded = load(
        &mut session,
        &single_pass(vec![json!({
            "name": "exposure",
            "type": "float",
            "default": [2.0],
            "annotations": { "global": "exposure" }
        })]),
    );

    assert!(loaded.errors.iter().any(|err| matches!(
        err,
        LinkError::UnresolvedGlobalLink { parameter, global, ty: ParameterType::Float1 }
            if parameter == "exposure" && global == "exposure"
    )));
    let parameter = session.effect(loaded.id).unwrap().parameter("exposure").unwrap();
    assert_eq!(parameter.scalar()[0], 2.0);
}

#[test]
fn missing_sampler_texture_is_synthesized_from_size_and_format() {
    let mut session = session();
    let loaded = load(
        &mut session,
        &single_pass(vec![json!({
            "name": "blurred",
            "type": "sampler2D",
            "annotations": { "texture": "blur", "size": [64, 32], "format": "A16B16G16R16F" }
        })]),
    );
    assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);

    let expected = TextureDesc {
        width: 64,
        height: 32,
        depth: 1,
        mipmaps: false,
        format: TextureFormat::Rgba16F,
    };
    let blur = session.textures().by_name("blur").unwrap();
    assert_eq!(blur.desc, expected);
    assert_eq!(session.device().texture_desc("blur"), Some(expected));

    let parameter = session.effect(loaded.id).unwrap().parameter("blurred").unwrap();
    assert_eq!(parameter.texture(), session.textures().find("blur"));
}

#[test]
fn synthesis_without_a_size_leaves_the_sampler_textureless() {
    let mut session = session();
    let loaded = load(
        &mut session,
        &single_pass(vec![json!({
            "name": "blurred",
            "type": "sampler2D",
            "annotations": { "texture": "blur", "format": "rgba8" }
        })]),
    );

    assert!(loaded.errors.iter().any(|err| matches!(
        err,
        LinkError::UnresolvedSamplerTexture { parameter, .. } if parameter == "blurred"
    )));
    assert!(!session.textures().contains("blur"));
    let parameter = session.effect(loaded.id).unwrap().parameter("blurred").unwrap();
    assert!(parameter.texture().is_none());
}

#[test]
fn sampler_texture_is_loaded_from_the_search_paths() {
    let dir = std::env::temp_dir().join(format!("wgpu-effects-linker-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    image::RgbaImage::new(4, 2).save(dir.join("checker.png")).unwrap();

    let settings = EffectSettings {
        search_paths: vec![dir.clone()],
        ..EffectSettings::default()
    };
    let mut session = RenderSession::new(device(), settings).unwrap();
    let loaded = load(
        &mut session,
        &single_pass(vec![json!({
            "name": "checker",
            "type": "sampler2D",
            "annotations": { "texture": "checker.png" }
        })]),
    );
    assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);

    let texture = session.textures().by_name("checker.png").unwrap();
    assert_eq!((texture.desc.width, texture.desc.height), (4, 2));
    let content = session.device().texture_content("checker.png").unwrap();
    assert!(content.starts_with("file:"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn two_effects_share_a_synthesized_texture() {
    let mut session = session();
    let sampler = json!({
        "name": "shared",
        "type": "sampler2D",
        "annotations": { "texture": "history", "size": [16, 16], "format": "r32f" }
    });
    let first = load(&mut session, &single_pass(vec![sampler.clone()]));
    let second = load(&mut session, &single_pass(vec![sampler]));

    assert!(second.errors.is_empty(), "{:?}", second.errors);
    let a = session.effect(first.id).unwrap().parameter("shared").unwrap().texture();
    let b = session.effect(second.id).unwrap().parameter("shared").unwrap().texture();
    assert_eq!(a, b);
}

#[test]
fn malformed_annotations_are_reported() {
    let mut first = pass("p", "x");
    first["annotations"] = json!({ "target": 7 });
    let mut session = session();
    let loaded = load(&mut session, &effect("fx", vec![], vec![technique("t", vec![first])]));

    assert!(loaded.errors.iter().any(|err| matches!(
        err,
        LinkError::InvalidAnnotation { owner, annotation, .. }
            if owner == "fx/t/p" && annotation == "target"
    )));
}

#[test]
fn duplicate_texture_names_keep_the_first_descriptor() {
    let mut session = session();
    let first = TextureDesc::render_target(64, 64, TextureFormat::Rgba8);
    let second = TextureDesc::render_target(8, 8, TextureFormat::R32F);

    session.create_texture("history", first).unwrap();
    let err = session.create_texture("history", second).unwrap_err();

    assert_eq!(err, LinkError::DuplicateTextureName("history".into()));
    assert_eq!(session.textures().by_name("history").unwrap().desc, first);
    assert_eq!(session.device().texture_desc("history"), Some(first));
}

#[test]
fn compile_errors_reject_the_effect() {
    let document = effect(
        "fx",
        vec![],
        vec![technique(
            "t",
            vec![json!({ "name": "p", "fragment": program("vs_3_0", "float4 main() {}") })],
        )],
    );
    let mut session = session();
    let err = session
        .load_effect_from_str("doc", &document.to_string())
        .unwrap_err();

    assert!(matches!(err, EffectError::Compile { ref pass, .. } if pass == "t/p"));
    assert_eq!(session.effects().count(), 0);
}

#[test]
fn unknown_parameter_types_reject_the_effect() {
    let mut session = session();
    let err = session
        .load_effect_from_str(
            "doc",
            &single_pass(vec![json!({ "name": "q", "type": "quaternion" })]).to_string(),
        )
        .unwrap_err();
    assert!(matches!(err, EffectError::UnknownParameterType { .. }));
}

#[test]
fn unparsable_documents_reject_the_effect() {
    let mut session = session();
    let err = session.load_effect_from_str("doc", "{ not json").unwrap_err();
    assert!(matches!(err, EffectError::Parse { ref name, .. } if name == "doc"));
}

#[test]
fn missing_effect_file_is_an_io_error() {
    let mut session = session();
    let err = session.load_effect("no/such/effect.json").unwrap_err();
    assert!(matches!(
        err,
        EffectError::Io { ref path, ref reason }
            if path.ends_with("no/such/effect.json") && reason.starts_with("Failed to read")
    ));
}
