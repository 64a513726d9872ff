#![cfg(target_arch = "wasm32")]
//! Browser host: `window.fetch` assets, `performance.now()` time and
//! `requestAnimationFrame` frames.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use js_sys::Uint8Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, HtmlCanvasElement, Performance, Response, Window};

use crate::demo::DemoScene;
use crate::error::LoopError;
use crate::game_loop::{Clock, FrameHandle, FrameScheduler, GameLoop, LoopConfig};
use crate::input::wasm::KeyboardListener;
use crate::input::InputState;
use crate::render::CanvasSurface;
use crate::resource::{Fetcher, LocalBoxFuture, Resources};

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

fn js_error(context: &str, err: JsValue) -> anyhow::Error {
    anyhow!("{context}: {err:?}")
}

/// Fetches assets relative to `base_url` with `window.fetch`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url(&self, key: &str) -> String {
        if self.base_url.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), key)
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, key: &str) -> LocalBoxFuture<Result<Vec<u8>>> {
        let url = self.url(key);
        Box::pin(async move {
            let window = window().ok_or_else(|| anyhow!("window not available"))?;
            let response: Response = JsFuture::from(window.fetch_with_str(&url))
                .await
                .map_err(|err| js_error(&format!("fetch {url}"), err))?
                .dyn_into()
                .map_err(|_| anyhow!("fetch {url} did not return a Response"))?;
            if !response.ok() {
                bail!("fetch {url}: HTTP {}", response.status());
            }
            let buffer = response
                .array_buffer()
                .map_err(|err| js_error(&format!("read {url}"), err))?;
            let buffer = JsFuture::from(buffer)
                .await
                .map_err(|err| js_error(&format!("read {url}"), err))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        })
    }
}

pub struct PerformanceClock {
    performance: Performance,
}

impl PerformanceClock {
    pub fn new(window: &Window) -> Result<Self> {
        let performance = window
            .performance()
            .ok_or_else(|| anyhow!("performance timer not available"))?;
        Ok(Self { performance })
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        self.performance.now()
    }
}

type FrameCallback = Closure<dyn FnMut(f64)>;

/// Schedules frames with `requestAnimationFrame`. The callback is installed
/// through [`AnimationFrameScheduler::callback_slot`] once the loop it
/// drives exists.
pub struct AnimationFrameScheduler {
    window: Window,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl AnimationFrameScheduler {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            callback: Rc::new(RefCell::new(None)),
        }
    }

    pub fn callback_slot(&self) -> Rc<RefCell<Option<FrameCallback>>> {
        Rc::clone(&self.callback)
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn schedule_frame(&mut self) -> Result<FrameHandle, LoopError> {
        let callback = self.callback.borrow();
        let callback = callback
            .as_ref()
            .ok_or_else(|| LoopError::Schedule("no frame callback installed".to_string()))?;
        let id = self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .map_err(|err| LoopError::Schedule(format!("requestAnimationFrame failed: {err:?}")))?;
        Ok(FrameHandle(id as u64))
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            log::warn!("cancelAnimationFrame failed: {err:?}");
        }
    }
}

/// Loads the scene descriptor at `scene_path` and runs it on the canvas with
/// id `canvas_id` until Escape is pressed.
#[wasm_bindgen]
pub async fn run(canvas_id: String, scene_path: String) -> Result<(), JsValue> {
    start_scene(&canvas_id, &scene_path)
        .await
        .map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

async fn start_scene(canvas_id: &str, scene_path: &str) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| anyhow!("document not available"))?;
    let canvas = document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| anyhow!("canvas element `{canvas_id}` not found"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| anyhow!("element `{canvas_id}` is not a canvas"))?;

    let surface = CanvasSurface::new(canvas)?;
    let input = Arc::new(InputState::new());
    let keyboard = KeyboardListener::attach(Arc::clone(&input))?;
    let clock = PerformanceClock::new(&window)?;
    let scheduler = AnimationFrameScheduler::new(window);
    let slot = scheduler.callback_slot();

    let game = Rc::new(RefCell::new(GameLoop::new(
        LoopConfig::default(),
        Resources::new(HttpFetcher::new("")),
        input,
        clock,
        scheduler,
    )));

    // The loop owns the callback and the callback owns the loop, so the pair
    // stays alive for the lifetime of the page.
    let frame_game = Rc::clone(&game);
    let mut keyboard = Some(keyboard);
    *slot.borrow_mut() = Some(Closure::new(move |_timestamp: f64| {
        let mut game = frame_game.borrow_mut();
        if let Err(err) = game.frame() {
            log::error!("frame failed: {err:#}");
        }
        if !game.is_running() && keyboard.take().is_some() {
            if let Err(err) = game.shutdown() {
                log::error!("shutdown failed: {err:#}");
            }
        }
    }));

    let barrier = game
        .borrow_mut()
        .begin(DemoScene::new(scene_path, surface))?;
    let loaded = barrier.await;
    game.borrow_mut()
        .finish_loading(loaded)
        .with_context(|| format!("failed to start scene {scene_path}"))?;
    Ok(())
}
