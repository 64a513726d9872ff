use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};

/// Orthographic camera over a y-down world, matching canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera2d {
    /// World point at the centre of the viewport.
    pub position: Vec2,
    /// Viewport size in pixels.
    pub viewport: Vec2,
    pub zoom: f32,
}

impl Default for Camera2d {
    fn default() -> Self {
        Self::new(Vec2::new(800.0, 600.0))
    }
}

impl Camera2d {
    /// Camera whose view starts at the world origin, one world unit per pixel.
    pub fn new(viewport: Vec2) -> Self {
        Self {
            position: viewport * 0.5,
            viewport,
            zoom: 1.0,
        }
    }

    /// Ignores zero-sized viewports, which browsers report while a canvas
    /// is hidden.
    pub fn resize(&mut self, viewport: Vec2) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        self.viewport = viewport;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom > 0.0 && zoom.is_finite() {
            self.zoom = zoom;
        }
    }

    /// Half the visible world extent.
    fn half_extent(&self) -> Vec2 {
        self.viewport * 0.5 / self.zoom
    }

    /// Top-left world point visible on screen.
    pub fn min(&self) -> Vec2 {
        self.position - self.half_extent()
    }

    pub fn view_proj(&self) -> Mat4 {
        let min = self.min();
        let max = self.position + self.half_extent();
        // bottom/top swapped so +y points down the screen
        Mat4::orthographic_rh(min.x, max.x, max.y, min.y, -1.0, 1.0)
    }

    pub fn world_to_clip(&self, point: Vec2) -> Vec2 {
        self.view_proj().project_point3(point.extend(0.0)).truncate()
    }

    /// World point to viewport pixels.
    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        (point - self.min()) * self.zoom
    }
}
