//! Scene lifecycle contract driven by [`crate::game_loop::GameLoop`].
//!
//! A scene moves through `load → init → (draw, update*)* → unload`. `load`
//! only *requests* resources; the loop waits on the request barrier before
//! calling `init`, so `init` may read everything `load` asked for.

use anyhow::Result;

use crate::input::InputState;
use crate::resource::Resources;

/// Unit of application logic. All five callbacks are required.
pub trait Scene {
    /// Requests the resources the scene needs. Must not read them.
    fn load(&mut self, resources: &Resources) -> Result<()>;

    /// Called once every request made in `load` has settled.
    fn init(&mut self, resources: &Resources) -> Result<()>;

    /// Advances logical state by one fixed step.
    fn update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;

    /// Renders the current logical state. Called once per host frame.
    fn draw(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;

    /// Releases what `load` acquired: one unload per load.
    fn unload(&mut self, resources: &Resources) -> Result<()>;
}

impl<S: Scene + ?Sized> Scene for Box<S> {
    fn load(&mut self, resources: &Resources) -> Result<()> {
        (**self).load(resources)
    }

    fn init(&mut self, resources: &Resources) -> Result<()> {
        (**self).init(resources)
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        (**self).update(ctx)
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        (**self).draw(ctx)
    }

    fn unload(&mut self, resources: &Resources) -> Result<()> {
        (**self).unload(resources)
    }
}

/// Per-callback view of the loop handed to `update` and `draw`.
pub struct FrameContext<'a> {
    input: &'a InputState,
    resources: &'a Resources,
    fixed_step_ms: f64,
    tick: u64,
    stop_requested: bool,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        input: &'a InputState,
        resources: &'a Resources,
        fixed_step_ms: f64,
        tick: u64,
    ) -> Self {
        Self {
            input,
            resources,
            fixed_step_ms,
            tick,
            stop_requested: false,
        }
    }

    pub fn input(&self) -> &InputState {
        self.input
    }

    pub fn resources(&self) -> &Resources {
        self.resources
    }

    /// Logical time advanced by one update, in milliseconds.
    pub fn fixed_step_ms(&self) -> f64 {
        self.fixed_step_ms
    }

    /// Number of updates completed before this callback.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Stops the loop once the current callback returns. Remaining updates of
    /// the current frame are skipped.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}
