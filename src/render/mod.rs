//! Quad geometry shared by every render surface.
//!
//! Scenes fill a [`GeometryBuffer`] each draw and hand it to a [`Surface`].
//! Vertices are in world space; surfaces apply the camera.

#[cfg(target_arch = "wasm32")]
pub mod canvas;

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::Camera2d;

/// Axis-aligned rectangle with its top-left corner at `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub position: Vec2,
    pub size: Vec2,
    pub color: Vec4,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
}

impl Quad {
    pub fn new(position: Vec2, size: Vec2, color: Vec4) -> Self {
        Self {
            position,
            size,
            color,
            texture: None,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.size * 0.5
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Contiguous index range drawn with one texture binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub texture: Option<String>,
    pub first_index: u32,
    pub index_count: u32,
}

const VERTICES_PER_QUAD: usize = 4;
const INDICES_PER_QUAD: u32 = 6;
pub const MAX_QUADS: usize = (u16::MAX as usize + 1) / VERTICES_PER_QUAD;

/// Vertex and index data for one frame, rebuilt every draw.
#[derive(Debug, Default)]
pub struct GeometryBuffer {
    vertices: Vec<QuadVertex>,
    indices: Vec<u16>,
    batches: Vec<Batch>,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.batches.clear();
    }

    pub fn push_quad(&mut self, quad: &Quad) -> Result<()> {
        if self.quad_count() >= MAX_QUADS {
            bail!("geometry buffer is full ({MAX_QUADS} quads)");
        }

        let base = self.vertices.len() as u16;
        let min = quad.position;
        let max = quad.position + quad.size;
        let color = quad.color.to_array();
        let corners = [
            ([min.x, min.y], [0.0, 0.0]),
            ([max.x, min.y], [1.0, 0.0]),
            ([max.x, max.y], [1.0, 1.0]),
            ([min.x, max.y], [0.0, 1.0]),
        ];
        self.vertices
            .extend(corners.into_iter().map(|(position, uv)| QuadVertex {
                position,
                uv,
                color,
            }));

        let first_index = self.indices.len() as u32;
        self.indices
            .extend([0, 1, 2, 0, 2, 3].map(|offset| base + offset));

        match self.batches.last_mut() {
            Some(batch) if batch.texture == quad.texture => batch.index_count += INDICES_PER_QUAD,
            _ => self.batches.push(Batch {
                texture: quad.texture.clone(),
                first_index,
                index_count: INDICES_PER_QUAD,
            }),
        }
        Ok(())
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Vertex data as uploaded to a GPU buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// World-space `(min, max, color)` of each quad, for surfaces that fill
    /// rectangles instead of uploading vertices.
    pub fn rects(&self) -> impl Iterator<Item = (Vec2, Vec2, Vec4)> + '_ {
        self.vertices.chunks_exact(VERTICES_PER_QUAD).map(|quad| {
            (
                Vec2::from(quad[0].position),
                Vec2::from(quad[2].position),
                Vec4::from(quad[0].color),
            )
        })
    }
}

/// Presentation target for a frame's geometry.
pub trait Surface {
    /// Drawable size in pixels.
    fn size(&self) -> Vec2;

    fn resize(&mut self, size: Vec2);

    fn present(&mut self, camera: &Camera2d, geometry: &GeometryBuffer, clear: Vec4) -> Result<()>;
}

/// Surface without a display, used by the native binary and tests.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: Vec2,
    frames: u64,
    last_view_proj: Mat4,
    last_quads: usize,
    last_upload_bytes: usize,
}

impl HeadlessSurface {
    pub fn new(size: Vec2) -> Self {
        Self {
            size,
            frames: 0,
            last_view_proj: Mat4::IDENTITY,
            last_quads: 0,
            last_upload_bytes: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_quads(&self) -> usize {
        self.last_quads
    }

    pub fn last_upload_bytes(&self) -> usize {
        self.last_upload_bytes
    }

    pub fn last_view_proj(&self) -> Mat4 {
        self.last_view_proj
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> Vec2 {
        self.size
    }

    fn resize(&mut self, size: Vec2) {
        if size.x > 0.0 && size.y > 0.0 {
            self.size = size;
        }
    }

    fn present(&mut self, camera: &Camera2d, geometry: &GeometryBuffer, _clear: Vec4) -> Result<()> {
        self.frames += 1;
        self.last_view_proj = camera.view_proj();
        self.last_quads = geometry.quad_count();
        self.last_upload_bytes = geometry.vertex_bytes().len() + geometry.index_bytes().len();
        Ok(())
    }
}
