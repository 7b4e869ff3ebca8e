// renderer/gpu/texture.rs

use std::path::Path;

use crate::error::DeviceError;
use crate::io;
use crate::texture::{TextureDesc, TextureFormat};

pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Rg16F => wgpu::TextureFormat::Rg16Float,
        TextureFormat::R32F => wgpu::TextureFormat::R32Float,
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TextureFormat::D24S8 => wgpu::TextureFormat::Depth24PlusStencil8,
        TextureFormat::D32F => wgpu::TextureFormat::Depth32Float,
    }
}

/// A sampleable, renderable, copyable 2D texture.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    const USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
        .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
        .union(wgpu::TextureUsages::COPY_SRC)
        .union(wgpu::TextureUsages::COPY_DST);

    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: Self::USAGE,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            format,
        }
    }

    /// Blank render target described by `desc`. Only single-layer colour targets can take
    /// part in an effect chain.
    pub fn render_target(
        device: &wgpu::Device,
        name: &str,
        desc: &TextureDesc,
    ) -> Result<Self, DeviceError> {
        let fail = |reason: &str| DeviceError::TextureCreation {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if !desc.format.is_color_renderable() {
            return Err(fail("depth formats cannot be effect targets"));
        }
        if desc.depth > 1 {
            return Err(fail("volume textures are not supported"));
        }
        let limit = device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(fail(&format!("larger than the device limit of {}", limit)));
        }
        Ok(Self::new(
            device,
            name,
            desc.width,
            desc.height,
            wgpu_format(desc.format),
        ))
    }

    /// Decode an image file into an RGBA8 texture.
    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        path: &Path,
    ) -> Result<(Self, TextureDesc), DeviceError> {
        log::info!("Loading texture: {:?}", path);
        let fail = |reason: String| DeviceError::TextureLoad {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = io::load_binary(path).map_err(fail)?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| fail(format!("Failed to decode image: {}", e)))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let desc = TextureDesc::render_target(width, height, TextureFormat::Rgba8);
        let texture = Self::new(device, name, width, height, wgpu_format(desc.format));

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Ok((texture, desc))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}
