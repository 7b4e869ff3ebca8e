//! On-disk form of an effect: a JSON document listing parameters and techniques.
//!
//! ```json
//! {
//!   "name": "bloom",
//!   "parameters": [
//!     { "name": "time", "type": "float", "annotations": { "global": "time" } },
//!     { "name": "source", "type": "sampler2D", "annotations": { "texture": ":lastpass" } }
//!   ],
//!   "techniques": [{
//!     "name": "main",
//!     "passes": [{
//!       "name": "threshold",
//!       "vertex":   { "profile": "wgsl", "entry": "vs_main", "file": "bloom.wgsl" },
//!       "fragment": { "profile": "wgsl", "entry": "fs_threshold", "file": "bloom.wgsl" }
//!     }]
//!   }]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::effect::annotation::Annotations;
use crate::effect::program::Stage;
use crate::error::EffectError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDescription {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescription>,
    #[serde(default)]
    pub techniques: Vec<TechniqueDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: Vec<f32>,
    #[serde(default)]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueDescription {
    pub name: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub passes: Vec<PassDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassDescription {
    pub name: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub vertex: Option<ProgramDescription>,
    #[serde(default)]
    pub fragment: Option<ProgramDescription>,
    #[serde(default)]
    pub geometry: Option<ProgramDescription>,
    #[serde(default)]
    pub domain: Option<ProgramDescription>,
    #[serde(default)]
    pub hull: Option<ProgramDescription>,
}

impl PassDescription {
    pub fn program(&self, stage: Stage) -> Option<&ProgramDescription> {
        match stage {
            Stage::Vertex => self.vertex.as_ref(),
            Stage::Fragment => self.fragment.as_ref(),
            Stage::Geometry => self.geometry.as_ref(),
            Stage::Domain => self.domain.as_ref(),
            Stage::Hull => self.hull.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDescription {
    pub profile: String,
    #[serde(default = "ProgramDescription::default_entry")]
    pub entry: String,
    /// Inline source. Takes precedence over `file`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

impl ProgramDescription {
    fn default_entry() -> String {
        "main".to_string()
    }
}

impl EffectDescription {
    /// `name` identifies the document in errors; the effect's own name comes from the JSON.
    pub fn from_json(name: &str, contents: &str) -> Result<Self, EffectError> {
        serde_json::from_str(contents).map_err(|source| EffectError::Parse {
            name: name.to_string(),
            source,
        })
    }
}
