use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::texture::TextureFormat;

/// Session configuration, read from `settings.json` next to the host by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSettings {
    /// Directories searched, in order, for effect, program and texture files.
    #[serde(default = "EffectSettings::default_search_paths")]
    pub search_paths: Vec<PathBuf>,
    /// Format of the staging textures (`:lastpass`, `:lastshader`, ...).
    #[serde(default)]
    pub staging_format: TextureFormat,
    /// Shift the full-screen quad by half a texel so texels map 1:1 onto pixels.
    #[serde(default = "EffectSettings::default_half_pixel_offset")]
    pub half_pixel_offset: bool,
    /// Register the `time`, `frame` and `resolution` virtual parameters.
    #[serde(default = "EffectSettings::default_builtin_parameters")]
    pub builtin_parameters: bool,
    /// `env_logger` filter used by [`init_logging`](crate::init_logging).
    #[serde(default = "EffectSettings::default_log_filter")]
    pub log_filter: String,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
            staging_format: TextureFormat::default(),
            half_pixel_offset: Self::default_half_pixel_offset(),
            builtin_parameters: Self::default_builtin_parameters(),
            log_filter: Self::default_log_filter(),
        }
    }
}

impl EffectSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(settings) => {
                    info!("Loaded effect settings from {:?}", path);
                    settings
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default effect settings.",
                        path, err
                    );
                    EffectSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Effect settings file {:?} not found. Using default settings.",
                    path
                );
                EffectSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default effect settings.",
                    path, err
                );
                EffectSettings::default()
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<EffectSettings>(contents).map(Self::validate)
    }

    fn validate(mut self) -> Self {
        if self.search_paths.is_empty() {
            warn!("At least one search path is required. Using the working directory.");
            self.search_paths = Self::default_search_paths();
        }

        if !self.staging_format.is_color_renderable() {
            warn!(
                "Staging format {:?} cannot be rendered to. Using {:?} instead.",
                self.staging_format,
                TextureFormat::default()
            );
            self.staging_format = TextureFormat::default();
        }

        if self.log_filter.trim().is_empty() {
            warn!("Log filter must not be empty. Using default value.");
            self.log_filter = Self::default_log_filter();
        }

        self
    }

    fn default_search_paths() -> Vec<PathBuf> {
        vec![PathBuf::from(".")]
    }

    const fn default_half_pixel_offset() -> bool {
        true
    }

    const fn default_builtin_parameters() -> bool {
        true
    }

    fn default_log_filter() -> String {
        "info".to_string()
    }
}
