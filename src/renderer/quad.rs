use bytemuck::{Pod, Zeroable};
use std::mem;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    /// Clip-space position; `w` is always 1 for the quad.
    pub position: [f32; 4],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x4,
        1 => Float32x2
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[inline]
pub fn v(position: [f32; 4], uv: [f32; 2]) -> Vertex {
    Vertex { position, uv }
}

/// Caller-supplied triangle list drawn instead of the full-screen quad.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Option<Vec<u32>>) -> Self {
        Self { vertices, indices }
    }

    pub fn index_count(&self) -> usize {
        self.indices
            .as_ref()
            .map_or(self.vertices.len(), Vec::len)
    }
}

/// Two-triangle quad covering the render target, UV (0,0) at the top-left.
///
/// With `half_pixel` the positions are shifted by half a texel up and left, so texel
/// centres line up with pixel centres on runtimes that sample at pixel corners.
#[derive(Debug, Clone, PartialEq)]
pub struct FullscreenQuad {
    size: (u32, u32),
    half_pixel: bool,
    geometry: Geometry,
}

impl FullscreenQuad {
    pub const INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

    pub fn new(width: u32, height: u32, half_pixel: bool) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let (dx, dy) = if half_pixel {
            (1.0 / width as f32, 1.0 / height as f32)
        } else {
            (0.0, 0.0)
        };

        let vertices = vec![
            v([-1.0 - dx, 1.0 + dy, 0.0, 1.0], [0.0, 0.0]),
            v([1.0 - dx, 1.0 + dy, 0.0, 1.0], [1.0, 0.0]),
            v([-1.0 - dx, -1.0 + dy, 0.0, 1.0], [0.0, 1.0]),
            v([1.0 - dx, -1.0 + dy, 0.0, 1.0], [1.0, 1.0]),
        ];

        Self {
            size: (width, height),
            half_pixel,
            geometry: Geometry::new(vertices, Some(Self::INDICES.to_vec())),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn half_pixel(&self) -> bool {
        self.half_pixel
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Rebuild if the backbuffer changed size. Returns true when rebuilt.
    pub fn fit(&mut self, width: u32, height: u32) -> bool {
        if self.size == (width.max(1), height.max(1)) {
            return false;
        }
        *self = Self::new(width, height, self.half_pixel);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_struct_size() {
        assert_eq!(
            Vertex::layout().array_stride,
            std::mem::size_of::<Vertex>() as wgpu::BufferAddress
        );
    }

    #[test]
    fn half_pixel_offset_shifts_by_one_texel_in_clip_space() {
        let quad = FullscreenQuad::new(200, 100, true);
        let top_left = quad.geometry().vertices[0];
        assert_eq!(top_left.position[0], -1.0 - 1.0 / 200.0);
        assert_eq!(top_left.position[1], 1.0 + 1.0 / 100.0);
        assert_eq!(top_left.uv, [0.0, 0.0]);

        let plain = FullscreenQuad::new(200, 100, false);
        assert_eq!(plain.geometry().vertices[3].position, [1.0, -1.0, 0.0, 1.0]);
        assert_eq!(plain.geometry().index_count(), 6);
    }

    #[test]
    fn fit_rebuilds_only_on_resize() {
        let mut quad = FullscreenQuad::new(64, 64, true);
        assert!(!quad.fit(64, 64));
        assert!(quad.fit(128, 64));
        assert_eq!(quad.size(), (128, 64));
        assert!(quad.half_pixel());
    }
}
