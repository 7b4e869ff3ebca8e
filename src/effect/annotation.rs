//! Annotation values and the link directives derived from them.
//!
//! The linker never reads raw annotations; each parameter, pass and technique is parsed
//! once into a list of [`LinkDirective`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::texture::{TextureDesc, TextureFormat};

pub const GLOBAL_KEYS: [&str; 2] = ["global", "parameter"];
pub const TEXTURE_KEY: &str = "texture";
pub const SIZE_KEY: &str = "size";
pub const FORMAT_KEY: &str = "format";
pub const TARGET_KEY: &str = "target";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Non-negative integer components; a single integer counts as one component.
    pub fn as_dimensions(&self) -> Option<Vec<u32>> {
        match self {
            Self::Int(value) => u32::try_from(*value).ok().map(|v| vec![v]),
            Self::Ints(values) => values.iter().map(|v| u32::try_from(*v).ok()).collect(),
            _ => None,
        }
    }
}

pub type Annotations = BTreeMap<String, AnnotationValue>;

/// What a blank render target for an unresolved sampler would look like.
/// Kept as a `Result` because a bad `size`/`format` only matters if the fallback is reached.
pub type BlankTarget = Result<TextureDesc, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkDirective {
    /// Mirror the virtual parameter of the same type with this name.
    GlobalLink(String),
    /// Bind the named texture, loading or synthesizing it when it isn't registered.
    Texture { name: String, blank: BlankTarget },
    /// Render into the named texture instead of the staging default.
    Target(String),
    /// A recognised key whose value has the wrong shape.
    Malformed { annotation: String, reason: String },
}

impl LinkDirective {
    pub fn parse(annotations: &Annotations) -> Vec<LinkDirective> {
        let mut directives = Vec::new();

        for key in GLOBAL_KEYS {
            if let Some(value) = annotations.get(key) {
                directives.push(match value.as_str() {
                    Some(name) => LinkDirective::GlobalLink(name.to_string()),
                    None => Self::malformed(key, "expected a parameter name"),
                });
                break;
            }
        }

        if let Some(value) = annotations.get(TEXTURE_KEY) {
            directives.push(match value.as_str() {
                Some(name) => LinkDirective::Texture {
                    name: name.to_string(),
                    blank: Self::blank_target(annotations),
                },
                None => Self::malformed(TEXTURE_KEY, "expected a texture name"),
            });
        }

        if let Some(value) = annotations.get(TARGET_KEY) {
            directives.push(match value.as_str() {
                Some(name) => LinkDirective::Target(name.to_string()),
                None => Self::malformed(TARGET_KEY, "expected a texture name"),
            });
        }

        directives
    }

    pub fn global_link(directives: &[LinkDirective]) -> Option<&str> {
        directives.iter().find_map(|directive| match directive {
            LinkDirective::GlobalLink(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn texture(directives: &[LinkDirective]) -> Option<(&str, &BlankTarget)> {
        directives.iter().find_map(|directive| match directive {
            LinkDirective::Texture { name, blank } => Some((name.as_str(), blank)),
            _ => None,
        })
    }

    pub fn target(directives: &[LinkDirective]) -> Option<&str> {
        directives.iter().find_map(|directive| match directive {
            LinkDirective::Target(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn blank_target(annotations: &Annotations) -> BlankTarget {
        let size = annotations
            .get(SIZE_KEY)
            .ok_or_else(|| "missing 'size' annotation".to_string())?
            .as_dimensions()
            .ok_or_else(|| "'size' must be 1 to 3 non-negative integers".to_string())?;

        let format_name = annotations
            .get(FORMAT_KEY)
            .ok_or_else(|| "missing 'format' annotation".to_string())?
            .as_str()
            .ok_or_else(|| "'format' must be a string".to_string())?;
        let format = TextureFormat::parse(format_name)
            .ok_or_else(|| format!("unknown format '{}'", format_name))?;

        TextureDesc::from_size(&size, format)
            .ok_or_else(|| format!("invalid size {:?}", size))
    }

    fn malformed(annotation: &str, reason: &str) -> LinkDirective {
        LinkDirective::Malformed {
            annotation: annotation.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(json: &str) -> Annotations {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_sampler_directive_with_blank_fallback() {
        let directives = LinkDirective::parse(&annotations(
            r#"{ "texture": "bloom", "size": [256, 128], "format": "rgba16f" }"#,
        ));

        let (name, blank) = LinkDirective::texture(&directives).unwrap();
        assert_eq!(name, "bloom");
        let desc = blank.as_ref().unwrap();
        assert_eq!((desc.width, desc.height, desc.depth), (256, 128, 1));
        assert_eq!(desc.format, TextureFormat::Rgba16F);
        assert!(!desc.mipmaps);
    }

    #[test]
    fn bad_fallback_metadata_is_deferred() {
        let directives =
            LinkDirective::parse(&annotations(r#"{ "texture": "noise", "size": "big" }"#));

        let (_, blank) = LinkDirective::texture(&directives).unwrap();
        assert!(blank.is_err());
        assert!(!directives
            .iter()
            .any(|d| matches!(d, LinkDirective::Malformed { .. })));
    }

    #[test]
    fn global_accepts_either_key() {
        let a = LinkDirective::parse(&annotations(r#"{ "global": "time" }"#));
        let b = LinkDirective::parse(&annotations(r#"{ "parameter": "time" }"#));
        assert_eq!(LinkDirective::global_link(&a), Some("time"));
        assert_eq!(LinkDirective::global_link(&b), Some("time"));
    }

    #[test]
    fn wrong_value_shape_is_malformed() {
        let directives = LinkDirective::parse(&annotations(r#"{ "target": 3 }"#));
        assert_eq!(LinkDirective::target(&directives), None);
        assert!(matches!(
            directives.as_slice(),
            [LinkDirective::Malformed { annotation, .. }] if annotation == "target"
        ));
    }

    #[test]
    fn untagged_values() {
        let parsed = annotations(r#"{ "a": 1, "b": 1.5, "c": [1, 2], "d": "x", "e": true }"#);
        assert_eq!(parsed["a"], AnnotationValue::Int(1));
        assert_eq!(parsed["b"], AnnotationValue::Float(1.5));
        assert_eq!(parsed["c"].as_dimensions(), Some(vec![1, 2]));
        assert_eq!(parsed["d"].as_str(), Some("x"));
        assert_eq!(parsed["e"], AnnotationValue::Bool(true));
    }
}
