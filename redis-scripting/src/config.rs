use std::num::NonZeroUsize;

pub(crate) const DEFAULT_MAX_RETAINED_BODIES: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(size) => size,
    None => panic!("retained body limit must be non zero"),
};

/// Options for a [`crate::ScriptingConnection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ScriptingConfig {
    pub(crate) use_evalsha_on_cache_hit: bool,
    pub(crate) retain_script_bodies: bool,
    pub(crate) max_retained_bodies: NonZeroUsize,
}

impl ScriptingConfig {
    /// Creates new ScriptingConfig with default values (`EVALSHA` on cache hits, up to 10_000 bodies retained)
    pub fn new() -> Self {
        Self {
            use_evalsha_on_cache_hit: true,
            retain_script_bodies: true,
            max_retained_bodies: DEFAULT_MAX_RETAINED_BODIES,
        }
    }

    /// Sets whether a script whose digest is known to be loaded is sent as
    /// `EVALSHA`. When disabled every call ships the full body with `EVAL`.
    pub fn set_use_evalsha_on_cache_hit(mut self, enabled: bool) -> Self {
        self.use_evalsha_on_cache_hit = enabled;
        self
    }

    /// Sets whether script bodies are remembered by digest.
    ///
    /// A remembered body lets `evalsha` recover from `NOSCRIPT` by resending
    /// the body with `EVAL`. Without it such calls fail with
    /// [`crate::ErrorKind::ScriptNotCached`].
    pub fn set_retain_script_bodies(mut self, enabled: bool) -> Self {
        self.retain_script_bodies = enabled;
        self
    }

    /// Sets the maximum number of script bodies remembered. When full, the
    /// least recently used body is dropped and `evalsha` on its digest can
    /// no longer recover from `NOSCRIPT`.
    pub fn set_max_retained_bodies(mut self, size: NonZeroUsize) -> Self {
        self.max_retained_bodies = size;
        self
    }

    /// Returns whether cache hits are sent as `EVALSHA`.
    pub fn use_evalsha_on_cache_hit(&self) -> bool {
        self.use_evalsha_on_cache_hit
    }

    /// Returns whether script bodies are remembered by digest.
    pub fn retain_script_bodies(&self) -> bool {
        self.retain_script_bodies
    }

    /// Returns the maximum number of script bodies remembered.
    pub fn max_retained_bodies(&self) -> NonZeroUsize {
        self.max_retained_bodies
    }
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        ScriptingConfig::new()
    }
}
