use anyhow::{Context, Result};
use glam::{Vec2, Vec4};
use log::info;

use crate::camera::Camera2d;
use crate::input::{KeyCode, NamedKey};
use crate::render::{GeometryBuffer, Surface};
use crate::resource::Resources;
use crate::scene::{FrameContext, Scene};
use crate::scene_file::{ObjectKind, SceneDescriptor, SceneObject};

/// Name of the object steered with the arrow keys.
pub const PLAYER: &str = "player";

const CLEAR_COLOR: Vec4 = Vec4::new(0.024, 0.024, 0.04, 1.0);

/// Scene built from an XML descriptor: draws every quad and moves the
/// player with the arrow keys. Escape stops the loop.
pub struct DemoScene<R: Surface> {
    scene_path: String,
    surface: R,
    camera: Camera2d,
    objects: Vec<SceneObject>,
    geometry: GeometryBuffer,
    /// Player speed in world units per second.
    speed: f32,
}

impl<R: Surface> DemoScene<R> {
    pub fn new(scene_path: impl Into<String>, surface: R) -> Self {
        let camera = Camera2d::new(surface.size());
        Self {
            scene_path: scene_path.into(),
            surface,
            camera,
            objects: Vec::new(),
            geometry: GeometryBuffer::new(),
            speed: 120.0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn player_position(&self) -> Option<Vec2> {
        self.objects
            .iter()
            .find(|object| object.name == PLAYER)
            .map(|object| object.position)
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn camera(&self) -> &Camera2d {
        &self.camera
    }
}

fn steering(ctx: &FrameContext<'_>) -> Vec2 {
    let input = ctx.input();
    let axis = |negative: NamedKey, positive: NamedKey| {
        let mut value = 0.0;
        if input.is_key_down(KeyCode::Named(negative)) {
            value -= 1.0;
        }
        if input.is_key_down(KeyCode::Named(positive)) {
            value += 1.0;
        }
        value
    };
    Vec2::new(
        axis(NamedKey::Left, NamedKey::Right),
        axis(NamedKey::Up, NamedKey::Down),
    )
    .normalize_or_zero()
}

impl<R: Surface> Scene for DemoScene<R> {
    fn load(&mut self, resources: &Resources) -> Result<()> {
        resources.load_xml(&self.scene_path);
        Ok(())
    }

    fn init(&mut self, resources: &Resources) -> Result<()> {
        let xml = resources.get_xml(&self.scene_path)?;
        let descriptor = SceneDescriptor::from_xml(&xml)
            .with_context(|| format!("invalid scene {}", self.scene_path))?;
        self.camera = descriptor.camera(self.surface.size());
        self.objects = descriptor.objects;
        info!(
            "scene {} ready with {} object(s)",
            self.scene_path,
            self.objects.len()
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        if ctx
            .input()
            .was_key_pressed(KeyCode::Named(NamedKey::Escape))
        {
            ctx.request_stop();
            return Ok(());
        }

        let delta = steering(ctx) * self.speed * (ctx.fixed_step_ms() / 1000.0) as f32;
        if let Some(player) = self.objects.iter_mut().find(|object| object.name == PLAYER) {
            player.position += delta;
        }
        Ok(())
    }

    fn draw(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        self.geometry.clear();
        for object in self
            .objects
            .iter()
            .filter(|object| object.kind == ObjectKind::Quad)
        {
            self.geometry.push_quad(&object.to_quad())?;
        }
        self.surface
            .present(&self.camera, &self.geometry, CLEAR_COLOR)
    }

    fn unload(&mut self, resources: &Resources) -> Result<()> {
        resources.unload_xml(&self.scene_path)?;
        self.objects.clear();
        self.geometry.clear();
        Ok(())
    }
}
