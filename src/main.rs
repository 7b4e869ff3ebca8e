use std::path::PathBuf;

const DEFAULT_EFFECT: &str = "demos/wave.json";

fn main() {
    let mut paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        paths.push(PathBuf::from(DEFAULT_EFFECT));
    }

    if let Err(err) = wgpu_effects::run(paths) {
        eprintln!("Application error: {err}");
    }
}
