//! End-to-end runs on a real adapter. Ignored by default; run with `--ignored` on a
//! machine with a GPU.

use serde_json::json;
use wgpu_effects::renderer::{GpuContext, WgpuDevice};
use wgpu_effects::{EffectSettings, LinkError, RenderSession};

const VERTEX: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn main(@location(0) position: vec4<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.position = position;
    out.uv = uv;
    return out;
}
"#;

const FRAGMENT: &str = r#"
@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(scene, scene_sampler, uv) * constants.tint;
}
"#;

fn session(width: u32, height: u32) -> RenderSession<WgpuDevice> {
    let context = pollster::block_on(GpuContext::headless()).expect("adapter");
    let device = WgpuDevice::new(context, width, height);
    RenderSession::new(device, EffectSettings::default()).expect("session")
}

fn document(fragment_profile: &str) -> String {
    json!({
        "name": "tinted",
        "parameters": [
            { "name": "tint", "type": "float4", "default": [1.0, 0.5, 0.5, 1.0] },
            { "name": "scene", "type": "sampler2D", "annotations": { "texture": ":thisframe" } }
        ],
        "techniques": [{
            "name": "wgsl",
            "passes": [{
                "name": "tint",
                "vertex": { "profile": "wgsl", "source": VERTEX },
                "fragment": { "profile": fragment_profile, "source": FRAGMENT }
            }]
        }]
    })
    .to_string()
}

#[test]
#[ignore]
fn wgsl_effect_renders_every_frame() {
    let mut session = session(128, 64);
    let loaded = session
        .load_effect_from_str("tinted", &document("wgsl"))
        .unwrap();
    assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);

    session.device_mut().clear_backbuffer(wgpu::Color::WHITE);
    for _ in 0..3 {
        let reports = session.render_frame(None).unwrap();
        assert_eq!(reports[0].passes_drawn, 1);
        assert!(reports[0].bind_errors.is_empty());
    }
}

#[test]
#[ignore]
fn shader_model_profiles_are_not_supported() {
    let mut session = session(32, 32);
    let loaded = session
        .load_effect_from_str("tinted", &document("ps_3_0"))
        .unwrap();

    assert!(loaded
        .errors
        .iter()
        .any(|err| matches!(err, LinkError::NoValidTechnique(_))));
}
