//! Typed errors surfaced by the resource cache and the scene loop.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed cause carried by load and scene failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failures raised by [`crate::resource::ResourceCache`] and the load chains
/// feeding it.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No entry exists for the key; the asset was never requested or has
    /// already been fully unloaded.
    #[error("resource not found: {key}")]
    NotFound { key: String },

    /// The entry exists but its payload is still being fetched.
    #[error("resource not ready: {key}")]
    NotReady { key: String },

    #[error("failed to load resource {key}")]
    Load {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl ResourceError {
    pub(crate) fn not_found(key: &str) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn not_ready(key: &str) -> Self {
        Self::NotReady {
            key: key.to_string(),
        }
    }

    pub(crate) fn load(key: &str, cause: anyhow::Error) -> Self {
        Self::Load {
            key: key.to_string(),
            source: cause.into(),
        }
    }

    /// Key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key } | Self::NotReady { key } | Self::Load { key, .. } => key,
        }
    }
}

/// Lifecycle stage a scene callback failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStage {
    Load,
    Init,
    Update,
    Draw,
    Unload,
}

impl std::fmt::Display for SceneStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SceneStage::Load => "load",
            SceneStage::Init => "init",
            SceneStage::Update => "update",
            SceneStage::Draw => "draw",
            SceneStage::Unload => "unload",
        };
        f.write_str(name)
    }
}

/// Precondition violations and wrapped failures of [`crate::game_loop::GameLoop`].
#[derive(Debug, Error)]
pub enum LoopError {
    /// A scene is already loading or running; only one may be active.
    #[error("loop is already running a scene")]
    AlreadyRunning,

    #[error("no scene is attached to the loop")]
    NoScene,

    #[error("loop is not waiting on a scene load")]
    NotLoading,

    #[error("failed to schedule frame: {0}")]
    Schedule(String),

    #[error("scene {stage} failed")]
    Scene {
        stage: SceneStage,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl LoopError {
    pub(crate) fn scene(stage: SceneStage, cause: anyhow::Error) -> Self {
        Self::Scene {
            stage,
            source: cause.into(),
        }
    }
}
