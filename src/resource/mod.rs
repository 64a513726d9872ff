//! Reference-counted asset cache with asynchronous load chains.
//!
//! A load is split into a synchronous *request* (bookkeeping on the cache
//! entry) and an asynchronous *resolve* (fetch, decode, parse). Requests for
//! a key that is already present only bump its reference count, so several
//! consumers can ask for the same asset before its bytes arrive without
//! issuing duplicate fetches. Chains are collected by a [`RequestTracker`]
//! and joined by [`Resources::wait_on_requests`], the barrier a scene waits
//! on between `load` and `init`.

pub mod audio;
pub mod fetch;
pub mod requests;
pub mod text;
pub mod texture;
pub mod xml;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::error::ResourceError;

pub use audio::AudioClip;
#[cfg(not(target_arch = "wasm32"))]
pub use fetch::FsFetcher;
pub use fetch::{Fetcher, LocalBoxFuture, MemoryFetcher};
pub use requests::{Barrier, LoadStatus, PendingLoad, RequestTracker};
pub use texture::TextureData;
pub use xml::XmlNode;

/// One cached asset and the number of live holders requesting it.
#[derive(Debug)]
pub struct CacheEntry<T> {
    data: Option<Arc<T>>,
    ref_count: u32,
    /// Identifies the `request_load` that created the entry.
    generation: u64,
}

impl<T> CacheEntry<T> {
    fn requested(generation: u64) -> Self {
        Self {
            data: None,
            ref_count: 1,
            generation,
        }
    }

    pub fn data(&self) -> Option<&Arc<T>> {
        self.data.as_ref()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Keyed store of one asset type. Cloning yields another handle to the same
/// store.
#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    generations: Arc<AtomicU64>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if an entry exists, even one whose payload is still loading.
    pub fn has_resource(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn get_resource(&self, key: &str) -> Result<Arc<T>, ResourceError> {
        let entries = self.entries.read();
        let entry = entries
            .get(key)
            .ok_or_else(|| ResourceError::not_found(key))?;
        entry
            .data
            .clone()
            .ok_or_else(|| ResourceError::not_ready(key))
    }

    /// Creates a fresh entry with no payload and a single holder, returning
    /// the entry's generation.
    ///
    /// Callers must only do this on a miss: an existing entry is replaced
    /// and its reference count lost.
    pub fn request_load(&self, key: &str) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries
            .write()
            .insert(key.to_string(), CacheEntry::requested(generation));
        generation
    }

    pub fn increment_ref_count(&self, key: &str) -> Result<(), ResourceError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| ResourceError::not_found(key))?;
        entry.ref_count += 1;
        Ok(())
    }

    pub fn set_resource(&self, key: &str, data: T) -> Result<(), ResourceError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| ResourceError::not_found(key))?;
        entry.data = Some(Arc::new(data));
        Ok(())
    }

    /// Releases one holder. Returns `true` once the last holder is gone and
    /// the entry has been removed.
    pub fn unload_resource(&self, key: &str) -> Result<bool, ResourceError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| ResourceError::not_found(key))?;
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            entries.remove(key);
            debug!("unloaded {key}");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn ref_count(&self, key: &str) -> Option<u32> {
        self.entries.read().get(key).map(CacheEntry::ref_count)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stores `data` if `key` still holds the entry of `generation`.
    fn fulfil(&self, key: &str, generation: u64, data: T) -> bool {
        match self.entries.write().get_mut(key) {
            Some(entry) if entry.generation == generation => {
                entry.data = Some(Arc::new(data));
                true
            }
            _ => false,
        }
    }

    /// Removes `key` if it still holds the entry of `generation`.
    fn discard(&self, key: &str, generation: u64) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.generation == generation => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// Explicit resource context: the fetch primitive, the outstanding request
/// set, and one typed cache per asset kind.
pub struct Resources {
    fetcher: Rc<dyn Fetcher>,
    requests: RequestTracker,
    pub text: ResourceCache<String>,
    pub xml: ResourceCache<XmlNode>,
    pub audio: ResourceCache<AudioClip>,
    pub textures: ResourceCache<TextureData>,
}

impl Resources {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::with_shared_fetcher(Rc::new(fetcher))
    }

    pub fn with_shared_fetcher(fetcher: Rc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            requests: RequestTracker::new(),
            text: ResourceCache::new(),
            xml: ResourceCache::new(),
            audio: ResourceCache::new(),
            textures: ResourceCache::new(),
        }
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    /// Requests `key` from `cache`, starting a fetch/decode/parse chain on a
    /// miss. Returns the pending chain on a miss and `None` when the key was
    /// already cached (its reference count is bumped instead).
    ///
    /// The chain is registered with the request tracker and only makes
    /// progress while a barrier from [`Resources::wait_on_requests`] is
    /// being awaited.
    pub fn load_decode_parse<T, I, D, P>(
        &self,
        cache: &ResourceCache<T>,
        key: &str,
        decode: D,
        parse: P,
    ) -> Option<PendingLoad>
    where
        T: 'static,
        I: 'static,
        D: FnOnce(Vec<u8>) -> anyhow::Result<I> + 'static,
        P: FnOnce(I) -> anyhow::Result<T> + 'static,
    {
        if cache.increment_ref_count(key).is_ok() {
            debug!("cache hit for {key}");
            return None;
        }

        let generation = cache.request_load(key);
        debug!("requested {key} (generation {generation})");

        let pending = PendingLoad::new(key);
        let handle = pending.clone();
        let cache = cache.clone();
        let owned_key = key.to_string();
        let fetch = self.fetcher.fetch(key);

        self.requests.register(key, async move {
            match fetch.await.and_then(decode).and_then(parse) {
                Ok(asset) => {
                    if cache.fulfil(&owned_key, generation, asset) {
                        handle.set_status(LoadStatus::Loaded);
                        debug!("loaded {owned_key}");
                    } else {
                        handle.set_status(LoadStatus::Discarded);
                        warn!("discarding {owned_key}: unloaded before it finished loading");
                    }
                    Ok(())
                }
                Err(err) => {
                    if cache.discard(&owned_key, generation) {
                        handle.set_status(LoadStatus::Failed);
                        Err(ResourceError::load(&owned_key, err))
                    } else {
                        handle.set_status(LoadStatus::Discarded);
                        warn!("ignoring failed load of {owned_key}, its entry was replaced: {err:#}");
                        Ok(())
                    }
                }
            }
        });

        Some(pending)
    }

    /// Barrier over every chain requested since the previous barrier.
    pub fn wait_on_requests(&self) -> Barrier {
        self.requests.barrier()
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources")
            .field("requests", &self.requests)
            .field("text", &self.text.len())
            .field("xml", &self.xml.len())
            .field("audio", &self.audio.len())
            .field("textures", &self.textures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn identity(raw: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        Ok(raw)
    }

    fn bytes_len(raw: Vec<u8>) -> anyhow::Result<usize> {
        Ok(raw.len())
    }

    #[test]
    fn request_then_get_is_not_ready() {
        let cache: ResourceCache<String> = ResourceCache::new();
        cache.request_load("x");
        assert!(cache.has_resource("x"));
        assert!(matches!(
            cache.get_resource("x"),
            Err(ResourceError::NotReady { .. })
        ));
    }

    #[test]
    fn operations_on_missing_key_fail_with_not_found() {
        let cache: ResourceCache<String> = ResourceCache::new();
        assert!(!cache.has_resource("x"));
        assert!(matches!(
            cache.get_resource("x"),
            Err(ResourceError::NotFound { .. })
        ));
        assert!(cache.increment_ref_count("x").is_err());
        assert!(cache.set_resource("x", "data".into()).is_err());
        assert!(cache.unload_resource("x").is_err());
    }

    #[test]
    fn ref_counts_are_symmetric() {
        let resources = Resources::new(MemoryFetcher::new().with_file("k", "data"));
        for _ in 0..4 {
            resources.load_decode_parse(&resources.text, "k", identity, |raw| {
                Ok(String::from_utf8(raw)?)
            });
        }
        assert_eq!(resources.text.ref_count("k"), Some(4));

        for _ in 0..3 {
            assert!(!resources.text.unload_resource("k").unwrap());
        }
        assert_eq!(resources.text.ref_count("k"), Some(1));
        assert!(resources.text.unload_resource("k").unwrap());
        assert!(!resources.text.has_resource("k"));
        assert!(matches!(
            resources.text.unload_resource("k"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn miss_issues_a_single_fetch() {
        let fetcher = Rc::new(MemoryFetcher::new().with_file("blob.bin", vec![1, 2, 3]));
        let resources = Resources::with_shared_fetcher(fetcher.clone());
        let cache: ResourceCache<usize> = ResourceCache::new();

        let first = resources.load_decode_parse(&cache, "blob.bin", identity, bytes_len);
        let second = resources.load_decode_parse(&cache, "blob.bin", identity, bytes_len);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(cache.ref_count("blob.bin"), Some(2));

        pollster::block_on(resources.wait_on_requests()).unwrap();
        assert_eq!(*cache.get_resource("blob.bin").unwrap(), 3);
        assert_eq!(first.unwrap().status(), LoadStatus::Loaded);
    }

    #[test]
    fn barrier_leaves_every_requested_key_loaded() {
        let fetcher = MemoryFetcher::new()
            .with_file("a", "1")
            .with_file("b", "22")
            .with_file("c", "333");
        let resources = Resources::new(fetcher);
        let cache: ResourceCache<usize> = ResourceCache::new();
        for key in ["a", "b", "c"] {
            resources.load_decode_parse(&cache, key, identity, bytes_len);
        }
        assert_eq!(resources.requests().outstanding(), 3);

        pollster::block_on(resources.wait_on_requests()).unwrap();
        assert_eq!(resources.requests().outstanding(), 0);
        for (key, len) in [("a", 1), ("b", 2), ("c", 3)] {
            assert_eq!(*cache.get_resource(key).unwrap(), len);
        }
    }

    #[test]
    fn failed_chain_removes_entry_and_names_key() {
        let resources = Resources::new(MemoryFetcher::new().with_file("bad", "x"));
        let cache: ResourceCache<usize> = ResourceCache::new();
        let pending = resources
            .load_decode_parse(&cache, "bad", identity, |_| -> anyhow::Result<usize> {
                Err(anyhow!("corrupt"))
            })
            .unwrap();

        let err = pollster::block_on(resources.wait_on_requests()).unwrap_err();
        assert_eq!(err.key(), "bad");
        assert_eq!(pending.status(), LoadStatus::Failed);
        assert!(!cache.has_resource("bad"));

        // A retry is a fresh miss.
        assert!(resources
            .load_decode_parse(&cache, "bad", identity, bytes_len)
            .is_some());
        pollster::block_on(resources.wait_on_requests()).unwrap();
        assert_eq!(*cache.get_resource("bad").unwrap(), 1);
    }

    #[test]
    fn missing_asset_fails_the_barrier() {
        let resources = Resources::new(MemoryFetcher::new());
        let cache: ResourceCache<usize> = ResourceCache::new();
        resources.load_decode_parse(&cache, "ghost", identity, bytes_len);
        let err = pollster::block_on(resources.wait_on_requests()).unwrap_err();
        assert!(matches!(err, ResourceError::Load { ref key, .. } if key == "ghost"));
    }

    #[test]
    fn unload_before_completion_discards_payload() {
        let resources = Resources::new(MemoryFetcher::new().with_file("late", "abc"));
        let cache: ResourceCache<usize> = ResourceCache::new();
        let pending = resources
            .load_decode_parse(&cache, "late", identity, bytes_len)
            .unwrap();
        assert!(cache.unload_resource("late").unwrap());

        pollster::block_on(resources.wait_on_requests()).unwrap();
        assert_eq!(pending.status(), LoadStatus::Discarded);
        assert!(!cache.has_resource("late"));
    }

    /// Fails the first fetch of every key, then serves `payload`.
    struct FlakyFetcher {
        payload: &'static str,
        calls: std::cell::Cell<usize>,
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, key: &str) -> LocalBoxFuture<anyhow::Result<Vec<u8>>> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            let result = if call == 0 {
                Err(anyhow!("connection reset fetching {key}"))
            } else {
                Ok(self.payload.as_bytes().to_vec())
            };
            Box::pin(async move { result })
        }
    }

    #[test]
    fn stale_failure_leaves_newer_entry_alone() {
        let resources = Resources::new(FlakyFetcher {
            payload: "fresh",
            calls: Default::default(),
        });
        let stale = resources.load_text("k").unwrap();
        assert!(resources.unload_text("k").unwrap());
        let fresh = resources.load_text("k").unwrap();
        assert!(resources.load_text("k").is_none());

        pollster::block_on(resources.wait_on_requests()).unwrap();
        assert_eq!(stale.status(), LoadStatus::Discarded);
        assert_eq!(fresh.status(), LoadStatus::Loaded);
        assert_eq!(resources.text.ref_count("k"), Some(2));
        assert_eq!(resources.get_text("k").unwrap().as_str(), "fresh");
        assert!(!resources.unload_text("k").unwrap());
        assert!(resources.unload_text("k").unwrap());
    }

    #[test]
    fn stale_success_does_not_fill_newer_entry() {
        let cache: ResourceCache<usize> = ResourceCache::new();
        let old = cache.request_load("k");
        assert!(cache.unload_resource("k").unwrap());
        let new = cache.request_load("k");
        assert_ne!(old, new);

        assert!(!cache.fulfil("k", old, 1));
        assert!(matches!(
            cache.get_resource("k"),
            Err(ResourceError::NotReady { .. })
        ));
        assert!(!cache.discard("k", old));
        assert!(cache.fulfil("k", new, 2));
        assert_eq!(*cache.get_resource("k").unwrap(), 2);
    }

    #[test]
    fn cloned_cache_shares_entries() {
        let cache: ResourceCache<String> = ResourceCache::new();
        let other = cache.clone();
        cache.request_load("shared");
        other.set_resource("shared", "value".into()).unwrap();
        assert_eq!(cache.get_resource("shared").unwrap().as_str(), "value");
        assert_eq!(other.len(), 1);
    }
}
