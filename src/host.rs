//! Native host: wall clock, a sleeping frame scheduler and the frame driver
//! that stands in for a display callback.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use log::trace;

use crate::error::LoopError;
use crate::game_loop::{Clock, FrameHandle, FrameScheduler, GameLoop};
use crate::scene::Scene;

/// Milliseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for InstantClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Schedules frames at a fixed interval, like a display with a constant
/// refresh rate. Scheduling arms a one-shot deadline that [`FramePacer`]
/// waits on; cancelling disarms it.
#[derive(Debug)]
pub struct PacedScheduler {
    interval: Duration,
    next_id: u64,
    last_due: Option<Instant>,
    deadline: Rc<Cell<Option<Instant>>>,
}

impl PacedScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: 0,
            last_due: None,
            deadline: Rc::new(Cell::new(None)),
        }
    }

    pub fn from_rate(frames_per_second: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / frames_per_second))
    }

    pub fn pacer(&self) -> FramePacer {
        FramePacer {
            deadline: Rc::clone(&self.deadline),
        }
    }
}

impl FrameScheduler for PacedScheduler {
    fn schedule_frame(&mut self) -> Result<FrameHandle, LoopError> {
        let now = Instant::now();
        let due = self
            .last_due
            .map_or(now, |previous| (previous + self.interval).max(now));
        self.last_due = Some(due);
        self.deadline.set(Some(due));
        self.next_id += 1;
        trace!("frame {} due in {:?}", self.next_id, due - now);
        Ok(FrameHandle(self.next_id))
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        trace!("frame {} cancelled", handle.0);
        self.deadline.set(None);
    }
}

/// Driver side of a [`PacedScheduler`].
#[derive(Debug, Clone)]
pub struct FramePacer {
    deadline: Rc<Cell<Option<Instant>>>,
}

impl FramePacer {
    /// Sleeps until the armed frame is due and consumes it. Returns `false`
    /// when no frame is scheduled.
    pub fn wait(&self) -> bool {
        let Some(due) = self.deadline.take() else {
            return false;
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        true
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.get().is_some()
    }
}

/// Dispatches scheduled frames until the loop stops or `max_frames` have
/// run. Returns the number of frames dispatched.
pub fn run_frames<S: Scene>(
    game: &mut GameLoop<S>,
    pacer: &FramePacer,
    max_frames: u64,
) -> Result<u64, LoopError> {
    let mut frames = 0;
    while frames < max_frames && pacer.wait() {
        game.frame()?;
        frames += 1;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoScene;
    use crate::game_loop::LoopConfig;
    use crate::input::{InputState, KeyCode, NamedKey};
    use crate::render::HeadlessSurface;
    use crate::resource::{MemoryFetcher, Resources};
    use glam::Vec2;
    use std::sync::Arc;

    const SCENE: &str = "<scene><object><name>player</name></object></scene>";

    fn paced_demo() -> (GameLoop<DemoScene<HeadlessSurface>>, FramePacer) {
        let scheduler = PacedScheduler::new(Duration::ZERO);
        let pacer = scheduler.pacer();
        let mut game = GameLoop::new(
            LoopConfig::default(),
            Resources::new(MemoryFetcher::new().with_file("scene.xml", SCENE)),
            Arc::new(InputState::new()),
            InstantClock::new(),
            scheduler,
        );
        let scene = DemoScene::new("scene.xml", HeadlessSurface::new(Vec2::new(64.0, 64.0)));
        pollster::block_on(game.start(scene)).unwrap();
        (game, pacer)
    }

    #[test]
    fn instant_clock_is_monotonic() {
        let clock = InstantClock::new();
        let first = clock.now_ms();
        thread::sleep(Duration::from_millis(2));
        assert!(clock.now_ms() >= first + 1.0);
    }

    #[test]
    fn cancel_disarms_pacer() {
        let mut scheduler = PacedScheduler::from_rate(1000.0);
        let pacer = scheduler.pacer();
        let handle = scheduler.schedule_frame().unwrap();
        assert!(pacer.is_armed());
        scheduler.cancel_frame(handle);
        assert!(!pacer.wait());
    }

    #[test]
    fn paced_frames_are_spaced_by_interval() {
        let mut scheduler = PacedScheduler::new(Duration::from_millis(5));
        let pacer = scheduler.pacer();
        let started = Instant::now();
        for _ in 0..3 {
            scheduler.schedule_frame().unwrap();
            assert!(pacer.wait());
        }
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn run_frames_honours_frame_limit() {
        let (mut game, pacer) = paced_demo();
        assert_eq!(run_frames(&mut game, &pacer, 5).unwrap(), 5);
        assert_eq!(game.frames(), 5);
        assert!(game.is_running());
    }

    #[test]
    fn run_frames_ends_when_scene_stops() {
        let (mut game, pacer) = paced_demo();
        game.input().set_key_down(KeyCode::Named(NamedKey::Escape));
        thread::sleep(Duration::from_millis(20));
        let frames = run_frames(&mut game, &pacer, 1_000).unwrap();
        assert_eq!(frames, 1);
        assert!(!game.is_running());
    }
}
