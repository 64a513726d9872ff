//! Fixed-timestep scene loop.
//!
//! The host calls [`GameLoop::frame`] from its display callback. Every frame
//! draws exactly once, then runs as many fixed-size logical updates as the
//! wall time since the scene started now covers. Steps are counted from the
//! start rather than accumulated per frame, so the number of updates tracks
//! elapsed wall time regardless of how irregularly frames arrive.
//!
//! ```text
//!   Idle ──begin()──> Loading ──finish_loading()──> Running ──stop()──> Stopped
//!    ^                   │ (load/barrier/init error)    │                  │
//!    └───────────────────┴──────────── shutdown() ──────┴──────────────────┘
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::{LoopError, ResourceError, SceneStage};
use crate::input::InputState;
use crate::resource::{Barrier, Resources};
use crate::scene::{FrameContext, Scene};

/// Monotonic time source in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Token for a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host display-sync mechanism. The loop keeps at most one handle
/// outstanding.
pub trait FrameScheduler {
    fn schedule_frame(&mut self) -> Result<FrameHandle, LoopError>;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Loop timing configuration.
///
/// # Default Values
///
/// - **update_rate_hz**: 60.0
/// - **max_updates_per_frame**: unbounded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub update_rate_hz: f64,
    /// Caps catch-up after a stall. When a frame hits the cap the remaining
    /// whole steps of backlog are dropped.
    pub max_updates_per_frame: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: 60.0,
            max_updates_per_frame: None,
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `hz` is not a positive, finite number.
    pub fn with_update_rate(mut self, hz: f64) -> Self {
        assert!(hz.is_finite() && hz > 0.0, "update rate must be positive, got {hz}");
        self.update_rate_hz = hz;
        self
    }

    /// # Panics
    ///
    /// Panics if `max == 0`.
    pub fn with_max_updates_per_frame(mut self, max: u32) -> Self {
        assert!(max > 0, "max updates per frame must be positive");
        self.max_updates_per_frame = Some(max);
        self
    }

    pub fn fixed_step_ms(&self) -> f64 {
        1000.0 / self.update_rate_hz
    }

    /// Whole steps contained in `elapsed_ms`.
    ///
    /// Counted from the rate rather than by subtracting the rounded step, so
    /// an elapsed time that is an exact multiple of the step yields exactly
    /// that many steps.
    pub fn steps_in(&self, elapsed_ms: f64) -> u64 {
        let steps = elapsed_ms.max(0.0) * self.update_rate_hz / 1000.0;
        (steps + STEP_TOLERANCE).floor() as u64
    }
}

/// Fraction of a step absorbed as timer rounding.
const STEP_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Loading,
    Running,
    Stopped,
}

/// What a single [`GameLoop::frame`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameReport {
    pub drew: bool,
    pub updates: u32,
    /// Wall time past the last whole step run or dropped.
    pub lag_ms: f64,
}

/// Drives one scene at a time through its lifecycle.
pub struct GameLoop<S: Scene> {
    config: LoopConfig,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
    resources: Resources,
    input: Arc<InputState>,
    scene: Option<S>,
    state: LoopState,
    /// Clock reading when the scene entered the running state.
    started_ms: f64,
    /// Steps run or dropped since `started_ms`.
    steps_consumed: u64,
    lag_ms: f64,
    scheduled: Option<FrameHandle>,
    frames: u64,
    ticks: u64,
}

impl<S: Scene> GameLoop<S> {
    pub fn new(
        config: LoopConfig,
        resources: Resources,
        input: Arc<InputState>,
        clock: impl Clock + 'static,
        scheduler: impl FrameScheduler + 'static,
    ) -> Self {
        Self {
            config,
            clock: Box::new(clock),
            scheduler: Box::new(scheduler),
            resources,
            input,
            scene: None,
            state: LoopState::Idle,
            started_ms: 0.0,
            steps_consumed: 0,
            lag_ms: 0.0,
            scheduled: None,
            frames: 0,
            ticks: 0,
        }
    }

    /// Loads `scene`, waits for its resources, initializes it and schedules
    /// the first frame.
    pub async fn start(&mut self, scene: S) -> Result<(), LoopError> {
        let barrier = self.begin(scene)?;
        let loaded = barrier.await;
        self.finish_loading(loaded)
    }

    /// First half of [`GameLoop::start`]: attaches the scene, runs its `load`
    /// and returns the barrier over everything it requested.
    ///
    /// Hosts that cannot hold `&mut self` across an await (e.g. a loop shared
    /// with an animation-frame closure) await the barrier themselves and
    /// hand the outcome to [`GameLoop::finish_loading`].
    pub fn begin(&mut self, mut scene: S) -> Result<Barrier, LoopError> {
        match self.state {
            LoopState::Loading | LoopState::Running => return Err(LoopError::AlreadyRunning),
            LoopState::Stopped => {
                self.shutdown()?;
            }
            LoopState::Idle => {}
        }

        info!("loading scene");
        if let Err(err) = scene.load(&self.resources) {
            // Outstanding chains stay registered for the next barrier.
            self.abort_startup(scene);
            return Err(LoopError::scene(SceneStage::Load, err));
        }

        self.scene = Some(scene);
        self.state = LoopState::Loading;
        debug!(
            "waiting on {} resource request(s)",
            self.resources.requests().outstanding()
        );
        Ok(self.resources.wait_on_requests())
    }

    /// Second half of [`GameLoop::start`]: takes the barrier outcome, runs
    /// `init` and enters the running state.
    pub fn finish_loading(&mut self, loaded: Result<(), ResourceError>) -> Result<(), LoopError> {
        if self.state != LoopState::Loading {
            return Err(LoopError::NotLoading);
        }
        let Some(mut scene) = self.scene.take() else {
            self.state = LoopState::Idle;
            return Err(LoopError::NoScene);
        };

        if let Err(err) = loaded {
            self.abort_startup(scene);
            return Err(err.into());
        }
        if let Err(err) = scene.init(&self.resources) {
            self.abort_startup(scene);
            return Err(LoopError::scene(SceneStage::Init, err));
        }

        self.scene = Some(scene);
        self.started_ms = self.clock.now_ms();
        self.steps_consumed = 0;
        self.lag_ms = 0.0;
        self.state = LoopState::Running;
        match self.scheduler.schedule_frame() {
            Ok(handle) => self.scheduled = Some(handle),
            Err(err) => {
                self.state = LoopState::Stopped;
                return Err(err);
            }
        }
        info!(
            "scene running at {} updates/s",
            self.config.update_rate_hz
        );
        Ok(())
    }

    fn abort_startup(&mut self, mut scene: S) {
        if let Err(err) = scene.unload(&self.resources) {
            warn!("unload after failed startup: {err:#}");
        }
        self.state = LoopState::Idle;
    }

    /// One host frame: reschedule, draw once, then run every fixed step the
    /// wall time since start now covers. Each step polls input before
    /// calling `update`.
    ///
    /// A frame dispatched after [`GameLoop::stop`] is ignored. Errors from
    /// the scene abort the rest of this frame only; the next frame has
    /// already been scheduled.
    pub fn frame(&mut self) -> Result<FrameReport, LoopError> {
        if self.state != LoopState::Running {
            if self.scene.is_none() {
                return Err(LoopError::NoScene);
            }
            debug!("ignoring frame while {:?}", self.state);
            return Ok(FrameReport::default());
        }

        self.scheduled = Some(self.scheduler.schedule_frame()?);

        let config = self.config;
        let step = config.fixed_step_ms();
        let Self {
            clock,
            resources,
            input,
            scene,
            started_ms,
            steps_consumed,
            lag_ms,
            frames,
            ticks,
            ..
        } = self;
        let scene = scene.as_mut().ok_or(LoopError::NoScene)?;
        let (input, resources): (&InputState, &Resources) = (input, resources);

        let mut ctx = FrameContext::new(input, resources, step, *ticks);
        scene
            .draw(&mut ctx)
            .map_err(|err| LoopError::scene(SceneStage::Draw, err))?;
        *frames += 1;
        let mut stop = ctx.stop_requested();

        let elapsed = (clock.now_ms() - *started_ms).max(0.0);
        let due = config.steps_in(elapsed);

        let mut updates = 0u32;
        while !stop && *steps_consumed < due {
            if config.max_updates_per_frame.is_some_and(|max| updates >= max) {
                warn!(
                    "update backlog of {} step(s) exceeds {updates} updates per frame; dropping it",
                    due - *steps_consumed
                );
                *steps_consumed = due;
                break;
            }
            input.poll();
            let mut ctx = FrameContext::new(input, resources, step, *ticks);
            scene
                .update(&mut ctx)
                .map_err(|err| LoopError::scene(SceneStage::Update, err))?;
            *ticks += 1;
            *steps_consumed += 1;
            updates += 1;
            stop = ctx.stop_requested();
        }
        *lag_ms = (elapsed - *steps_consumed as f64 * step).max(0.0);

        let report = FrameReport {
            drew: true,
            updates,
            lag_ms: *lag_ms,
        };
        if stop {
            self.stop();
        }
        Ok(report)
    }

    /// Stops scheduling frames. The scene stays attached; see
    /// [`GameLoop::shutdown`] to also unload it.
    pub fn stop(&mut self) {
        if let Some(handle) = self.scheduled.take() {
            self.scheduler.cancel_frame(handle);
        }
        if self.state == LoopState::Running {
            self.state = LoopState::Stopped;
            info!("loop stopped after {} frame(s), {} update(s)", self.frames, self.ticks);
        }
    }

    /// Stops the loop, unloads the scene and detaches it.
    pub fn shutdown(&mut self) -> Result<Option<S>, LoopError> {
        self.stop();
        self.state = LoopState::Idle;
        let Some(mut scene) = self.scene.take() else {
            return Ok(None);
        };
        scene
            .unload(&self.resources)
            .map_err(|err| LoopError::scene(SceneStage::Unload, err))?;
        info!("scene unloaded");
        Ok(Some(scene))
    }

    /// Shuts the current scene down and starts `next`, returning the previous
    /// scene.
    pub async fn switch_scene(&mut self, next: S) -> Result<Option<S>, LoopError> {
        let previous = self.shutdown()?;
        self.start(next).await?;
        Ok(previous)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn scene(&self) -> Option<&S> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut S> {
        self.scene.as_mut()
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn scheduled_frame(&self) -> Option<FrameHandle> {
        self.scheduled
    }

    /// Frames drawn since construction.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Logical updates since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn lag_ms(&self) -> f64 {
        self.lag_ms
    }
}
