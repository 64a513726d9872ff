use std::cell::Cell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::{anyhow, Result};

/// Boxed single-threaded future, the unit of work the cache tracks.
pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// Asynchronous source of raw asset bytes, supplied by the host.
pub trait Fetcher {
    fn fetch(&self, key: &str) -> LocalBoxFuture<Result<Vec<u8>>>;
}

/// Reads assets from a directory on disk.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsFetcher {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Fetcher for FsFetcher {
    fn fetch(&self, key: &str) -> LocalBoxFuture<Result<Vec<u8>>> {
        use anyhow::Context;

        let path = self.root.join(key);
        Box::pin(async move {
            std::fs::read(&path).with_context(|| format!("unable to read {}", path.display()))
        })
    }
}

/// Serves assets from memory. Useful for bundled data and deterministic tests.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    fetches: Cell<usize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(key, bytes);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(key.into(), bytes.into());
    }

    /// Number of fetches issued so far, including ones for missing keys.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, key: &str) -> LocalBoxFuture<Result<Vec<u8>>> {
        self.fetches.set(self.fetches.get() + 1);
        let result = self
            .files
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no such asset: {key}"));
        Box::pin(async move { result })
    }
}
