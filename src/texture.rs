// texture.rs (named texture registry)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::asset::{AssetCache, Handle};
use crate::error::LinkError;

/// Names of the well-known textures every session registers at start-up.
pub mod staging {
    /// Default target of a pass; holds the running result of the current technique.
    pub const LAST_PASS: &str = ":lastpass";
    /// Default target of a technique; composited onto the backbuffer when the technique ends.
    pub const LAST_SHADER: &str = ":lastshader";
    /// Copy of the backbuffer taken before the first effect of the frame.
    pub const THIS_FRAME: &str = ":thisframe";
    /// Copy of the backbuffer taken after the last effect of the previous frame.
    pub const LAST_FRAME: &str = ":lastframe";

    pub const ALL: [&str; 4] = [LAST_PASS, LAST_SHADER, THIS_FRAME, LAST_FRAME];
}

/// Device-side backing of a registered texture. Only meaningful to the device that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Bgra8,
    Rgba16F,
    Rgba32F,
    Rg16F,
    R32F,
    R8,
    D24S8,
    D32F,
}

impl TextureFormat {
    /// Parse a format annotation. Accepts the short names used in effect files as well as
    /// the legacy `A8R8G8B8`-style spellings, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let name = name.strip_prefix("d3dfmt_").unwrap_or(&name);
        let format = match name {
            "rgba8" | "a8r8g8b8" | "x8r8g8b8" | "rgba8unorm" => Self::Rgba8,
            "bgra8" | "a8b8g8r8" | "bgra8unorm" => Self::Bgra8,
            "rgba16f" | "a16b16g16r16f" => Self::Rgba16F,
            "rgba32f" | "a32b32g32r32f" => Self::Rgba32F,
            "rg16f" | "g16r16f" => Self::Rg16F,
            "r32f" => Self::R32F,
            "r8" | "l8" => Self::R8,
            "d24s8" => Self::D24S8,
            "d32f" | "d32f_lockable" => Self::D32F,
            _ => return None,
        };
        Some(format)
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Rgba8 | Self::Bgra8 | Self::R32F | Self::Rg16F | Self::D24S8 | Self::D32F => 4,
            Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }

    pub fn is_color_renderable(self) -> bool {
        !matches!(self, Self::D24S8 | Self::D32F)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mipmaps: bool,
    pub format: TextureFormat,
}

impl TextureDesc {
    /// A single-level 2D render target.
    pub fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            depth: 1,
            mipmaps: false,
            format,
        }
    }

    /// Build a descriptor from a 1, 2 or 3 component `size` annotation.
    /// Mipmaps are always disabled; synthesized targets are rendered into, never sampled with LOD.
    pub fn from_size(size: &[u32], format: TextureFormat) -> Option<Self> {
        let (width, height, depth) = match *size {
            [w] => (w, 1, 1),
            [w, h] => (w, h, 1),
            [w, h, d] => (w, h, d),
            _ => return None,
        };
        if width == 0 || height == 0 || depth == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            depth,
            mipmaps: false,
            format,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub backing: TextureId,
    pub desc: TextureDesc,
}

/// Session-owned name → texture map. Names are unique and a name is never re-bound.
#[derive(Default)]
pub struct TextureRegistry {
    textures: AssetCache<Texture>,
    by_name: HashMap<String, Handle<Texture>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already created device texture under `name`.
    /// A duplicate name is rejected and the existing entry is left untouched.
    pub fn register(
        &mut self,
        name: &str,
        backing: TextureId,
        desc: TextureDesc,
    ) -> Result<Handle<Texture>, LinkError> {
        if self.by_name.contains_key(name) {
            return Err(LinkError::DuplicateTextureName(name.to_string()));
        }

        let handle = self.textures.insert(Texture {
            name: name.to_string(),
            backing,
            desc,
        });
        self.by_name.insert(name.to_string(), handle);
        log::debug!("Registered texture '{}' ({:?})", name, desc);
        Ok(handle)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn find(&self, name: &str) -> Option<Handle<Texture>> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, handle: Handle<Texture>) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn by_name(&self, name: &str) -> Option<&Texture> {
        self.find(name).and_then(|handle| self.get(handle))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<Texture>, &Texture)> {
        self.textures.iter()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
