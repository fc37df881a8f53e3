use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::config::DEFAULT_MAX_RETAINED_BODIES;
use crate::script::ScriptDigest;

struct CacheInner {
    loaded: HashSet<ScriptDigest>,
    // Least recently used bodies are evicted first.
    bodies: LruCache<ScriptDigest, Arc<[u8]>>,
}

/// The set of script digests believed to be loaded on the server behind one
/// connection, together with the bodies seen for them.
///
/// Clones share state, so all handles derived from one connection agree on
/// what has been loaded. The loaded set is only a hint: a digest in it may
/// have been flushed by another client, which is why `EVALSHA` failures fall
/// back to `EVAL`. Bodies are kept across [`ScriptCache::clear`]; they are
/// what makes that fallback possible. At most `max_bodies` of them are held,
/// the least recently used one is evicted to make room.
#[derive(Clone)]
pub struct ScriptCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl ScriptCache {
    /// Creates an empty cache holding up to 10_000 bodies.
    pub fn new() -> ScriptCache {
        ScriptCache::with_max_bodies(DEFAULT_MAX_RETAINED_BODIES)
    }

    /// Creates an empty cache holding up to `max_bodies` bodies.
    pub fn with_max_bodies(max_bodies: NonZeroUsize) -> ScriptCache {
        ScriptCache {
            inner: Arc::new(Mutex::new(CacheInner {
                loaded: HashSet::new(),
                bodies: LruCache::new(max_bodies),
            })),
        }
    }

    /// If the lock is poisoned it'll be recovered, the sets stay consistent
    /// across every single operation below.
    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records that the server knows `digest`.
    pub fn mark_loaded(&self, digest: &ScriptDigest) {
        let mut inner = self.lock();
        if !inner.loaded.contains(digest) {
            inner.loaded.insert(digest.clone());
        }
    }

    /// Returns whether `digest` is believed to be loaded.
    pub fn is_loaded(&self, digest: &ScriptDigest) -> bool {
        self.lock().loaded.contains(digest)
    }

    /// Drops the loaded flag of a single digest.
    pub fn forget(&self, digest: &ScriptDigest) {
        self.lock().loaded.remove(digest);
    }

    /// Forgets every loaded digest. Remembered bodies are kept.
    pub fn clear(&self) {
        self.lock().loaded.clear();
    }

    /// Remembers the body for `digest`, evicting the least recently used
    /// body when full. A body that is already known is only marked as used.
    pub fn remember(&self, digest: &ScriptDigest, body: Arc<[u8]>) {
        let mut inner = self.lock();
        if inner.bodies.get(digest).is_none() {
            inner.bodies.put(digest.clone(), body);
        }
    }

    /// Returns the remembered body for `digest`, if any.
    pub fn body(&self, digest: &ScriptDigest) -> Option<Arc<[u8]>> {
        self.lock().bodies.get(digest).cloned()
    }

    /// Number of remembered bodies.
    pub fn retained_bodies(&self) -> usize {
        self.lock().bodies.len()
    }

    /// Number of digests believed to be loaded.
    pub fn len(&self) -> usize {
        self.lock().loaded.len()
    }

    /// Returns true if no digest is believed to be loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        ScriptCache::new()
    }
}

impl std::fmt::Debug for ScriptCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScriptCache")
            .field("loaded", &inner.loaded.len())
            .field("bodies", &inner.bodies.len())
            .finish()
    }
}
