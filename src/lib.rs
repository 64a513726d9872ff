//! Core of a minimal 2D engine: a fixed-timestep scene loop and a
//! reference-counted, asynchronously populated resource cache.
//!
//! Everything a scene touches is owned by an explicit context. The
//! [`GameLoop`] owns the [`Resources`] and the [`InputState`] and hands them
//! to the [`Scene`] callbacks. Hosts plug in a [`game_loop::Clock`] and a
//! [`game_loop::FrameScheduler`]: [`host`] provides the native pair, `web`
//! the browser one.

pub mod camera;
pub mod demo;
pub mod error;
pub mod game_loop;
#[cfg(not(target_arch = "wasm32"))]
pub mod host;
pub mod input;
pub mod render;
pub mod resource;
pub mod scene;
pub mod scene_file;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use camera::Camera2d;
pub use demo::DemoScene;
pub use error::{LoopError, ResourceError, SceneStage};
pub use game_loop::{FrameReport, GameLoop, LoopConfig, LoopState};
pub use input::{InputState, KeyCode, NamedKey};
pub use render::{GeometryBuffer, HeadlessSurface, Quad, Surface};
pub use resource::{Barrier, LoadStatus, PendingLoad, ResourceCache, Resources};
pub use scene::{FrameContext, Scene};
pub use scene_file::SceneDescriptor;
