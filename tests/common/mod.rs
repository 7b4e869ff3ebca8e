//! Effect documents and sessions shared by the integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use wgpu_effects::renderer::HeadlessDevice;
use wgpu_effects::{EffectSettings, LoadedEffect, RenderSession};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

pub fn device() -> HeadlessDevice {
    HeadlessDevice::new(WIDTH, HEIGHT)
}

pub fn session_with(device: HeadlessDevice) -> RenderSession<HeadlessDevice> {
    RenderSession::new(device, EffectSettings::default()).expect("session")
}

pub fn session() -> RenderSession<HeadlessDevice> {
    session_with(device())
}

pub fn program(profile: &str, source: &str) -> Value {
    json!({ "profile": profile, "source": source })
}

/// A vertex + fragment pass whose fragment program reads `fragment_source`.
///
/// Both sources start with a comment naming the pass, so every pass gets its own program
/// keys (and the headless device its own labels) even when the bodies are identical.
pub fn pass(name: &str, fragment_source: &str) -> Value {
    let vertex = format!("// {}\nfloat4 main(float4 pos : POSITION) : POSITION {{ return pos; }}", name);
    let fragment = format!("// {}\n{}", name, fragment_source);
    json!({
        "name": name,
        "vertex": program("vs_3_0", &vertex),
        "fragment": program("ps_3_0", &fragment),
    })
}

/// A fragment-only pass compiled for `profile`.
pub fn fragment_pass(name: &str, profile: &str) -> Value {
    json!({ "name": name, "fragment": program(profile, "float4 main() : COLOR { return 0; }") })
}

pub fn technique(name: &str, passes: Vec<Value>) -> Value {
    json!({ "name": name, "passes": passes })
}

pub fn effect(name: &str, parameters: Vec<Value>, techniques: Vec<Value>) -> Value {
    json!({ "name": name, "parameters": parameters, "techniques": techniques })
}

pub fn load(session: &mut RenderSession<HeadlessDevice>, document: &Value) -> LoadedEffect {
    session
        .load_effect_from_str("test", &document.to_string())
        .expect("effect loads")
}
