use anyhow::{anyhow, Result};
use glam::{Vec2, Vec4};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::{GeometryBuffer, Surface};
use crate::camera::Camera2d;

/// Surface backed by a 2D canvas context. Each quad becomes a `fill_rect`.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;
        Ok(Self { canvas, context })
    }
}

fn css_color(color: Vec4) -> String {
    let rgb = (color.truncate().clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * 255.0).round();
    format!(
        "rgba({}, {}, {}, {})",
        rgb.x as u8,
        rgb.y as u8,
        rgb.z as u8,
        color.w.clamp(0.0, 1.0)
    )
}

impl Surface for CanvasSurface {
    fn size(&self) -> Vec2 {
        Vec2::new(self.canvas.width() as f32, self.canvas.height() as f32)
    }

    fn resize(&mut self, size: Vec2) {
        if size.x <= 0.0 || size.y <= 0.0 {
            return;
        }
        self.canvas.set_width(size.x as u32);
        self.canvas.set_height(size.y as u32);
    }

    fn present(&mut self, camera: &Camera2d, geometry: &GeometryBuffer, clear: Vec4) -> Result<()> {
        let size = self.size();
        self.context.set_fill_style(&css_color(clear).into());
        self.context
            .fill_rect(0.0, 0.0, size.x as f64, size.y as f64);

        for (min, max, color) in geometry.rects() {
            let top_left = camera.world_to_screen(min);
            let extent = camera.world_to_screen(max) - top_left;
            self.context.set_fill_style(&css_color(color).into());
            self.context.fill_rect(
                top_left.x as f64,
                top_left.y as f64,
                extent.x as f64,
                extent.y as f64,
            );
        }
        Ok(())
    }
}
