use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use log::error;

use super::fetch::LocalBoxFuture;
use crate::error::ResourceError;

/// Progress of a single fetch/decode/parse chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed,
    /// The chain finished after every holder had already unloaded the key.
    Discarded,
}

/// Handle to a load chain registered on a cache miss.
#[derive(Debug, Clone)]
pub struct PendingLoad {
    key: String,
    status: Rc<Cell<LoadStatus>>,
}

impl PendingLoad {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            status: Rc::new(Cell::new(LoadStatus::Pending)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> LoadStatus {
        self.status.get()
    }

    pub fn is_settled(&self) -> bool {
        self.status() != LoadStatus::Pending
    }

    pub(crate) fn set_status(&self, status: LoadStatus) {
        self.status.set(status);
    }
}

struct TrackedLoad {
    key: String,
    chain: LocalBoxFuture<Result<(), ResourceError>>,
}

/// Set of load chains still in flight since the last barrier.
#[derive(Clone, Default)]
pub struct RequestTracker {
    pending: Rc<RefCell<Vec<TrackedLoad>>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        &self,
        key: &str,
        chain: impl Future<Output = Result<(), ResourceError>> + 'static,
    ) {
        self.pending.borrow_mut().push(TrackedLoad {
            key: key.to_string(),
            chain: Box::pin(chain),
        });
    }

    /// Number of chains registered since the last barrier.
    pub fn outstanding(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Empties the set and returns a future that settles once every chain
    /// taken from it has settled. Chains registered afterwards belong to the
    /// next barrier.
    pub fn barrier(&self) -> Barrier {
        let taken = std::mem::take(&mut *self.pending.borrow_mut());
        Barrier {
            loads: taken.into_iter().map(Some).collect(),
            first_error: None,
        }
    }
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .pending
            .borrow()
            .iter()
            .map(|load| load.key.clone())
            .collect();
        f.debug_struct("RequestTracker")
            .field("pending", &keys)
            .finish()
    }
}

/// Joins a batch of load chains, driving all of them on every wake.
///
/// Resolves with the first failure once everything has settled; failures
/// after the first are logged.
#[must_use = "a barrier does nothing unless awaited"]
pub struct Barrier {
    loads: Vec<Option<TrackedLoad>>,
    first_error: Option<ResourceError>,
}

impl Barrier {
    /// Number of chains that have not settled yet.
    pub fn remaining(&self) -> usize {
        self.loads.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Future for Barrier {
    type Output = Result<(), ResourceError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for slot in this.loads.iter_mut() {
            let Some(load) = slot.as_mut() else {
                continue;
            };
            if let Poll::Ready(result) = load.chain.as_mut().poll(cx) {
                if let Err(err) = result {
                    if this.first_error.is_none() {
                        this.first_error = Some(err);
                    } else {
                        error!("additional load failure for {}: {err}", load.key);
                    }
                }
                *slot = None;
            }
        }

        if this.loads.iter().any(Option::is_some) {
            return Poll::Pending;
        }
        this.loads.clear();
        match this.first_error.take() {
            Some(err) => Poll::Ready(Err(err)),
            None => Poll::Ready(Ok(())),
        }
    }
}
