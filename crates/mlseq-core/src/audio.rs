//! Converted audio storage and playback sinks.
//!
//! Converted audio is kept in an [`AudioCache`] and referenced by a
//! `blob:` URI, the same way a browser object URL dereferences an in-memory
//! blob. Releasing a chunk revokes its URI. Playback goes through an
//! [`AudioSink`] created per chunk by an [`AudioOutput`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// URI prefix of cached audio resources.
pub const AUDIO_URI_SCHEME: &str = "blob:mlseq/";

/// Shared table of converted audio, keyed by resource URI.
#[derive(Debug, Clone, Default)]
pub struct AudioCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
    revoked: AtomicU64,
}

impl AudioCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores audio bytes and returns a fresh resource URI.
    ///
    /// URIs are unique per call, so identical bytes stored twice can be
    /// revoked independently.
    pub fn create(&self, bytes: Vec<u8>) -> String {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let digest = blake3::hash(&bytes).to_hex();
        let uri = format!("{}{}-{}", AUDIO_URI_SCHEME, id, &digest.as_str()[..16]);
        self.entries().insert(uri.clone(), Arc::from(bytes));
        uri
    }

    /// Looks up the bytes behind a URI.
    pub fn resolve(&self, uri: &str) -> Option<Arc<[u8]>> {
        self.entries().get(uri).cloned()
    }

    /// Releases a URI. Returns false if it was not live.
    pub fn revoke(&self, uri: &str) -> bool {
        let removed = self.entries().remove(uri).is_some();
        if removed {
            self.inner.revoked.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if no resource is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful revocations since creation.
    pub fn revocations(&self) -> u64 {
        self.inner.revoked.load(Ordering::Relaxed)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A playable audio element bound to one chunk.
pub trait AudioSink: Send + Sync {
    /// Sets the source to play.
    fn load(&self, uri: &str, bytes: Arc<[u8]>);

    /// Starts playback at `seconds` into the source.
    fn play_from(&self, seconds: f64);

    /// Pauses playback.
    fn pause(&self);

    /// Sets the gain in `[0, 1]`.
    fn set_volume(&self, volume: f32);
}

/// Factory for chunk sinks.
pub trait AudioOutput: Send + Sync {
    /// Creates a sink for a new chunk.
    fn create_sink(&self) -> Arc<dyn AudioSink>;
}

/// Output whose sinks discard everything. Used for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

struct NullSink;

impl AudioSink for NullSink {
    fn load(&self, _uri: &str, _bytes: Arc<[u8]>) {}
    fn play_from(&self, _seconds: f64) {}
    fn pause(&self) {}
    fn set_volume(&self, _volume: f32) {}
}

impl AudioOutput for NullOutput {
    fn create_sink(&self) -> Arc<dyn AudioSink> {
        Arc::new(NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let cache = AudioCache::new();
        let uri = cache.create(vec![1, 2, 3]);

        assert!(uri.starts_with(AUDIO_URI_SCHEME));
        assert_eq!(cache.resolve(&uri).as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(cache.len(), 1);

        assert!(cache.revoke(&uri));
        assert!(!cache.revoke(&uri));
        assert!(cache.is_empty());
        assert_eq!(cache.revocations(), 1);
    }

    #[test]
    fn test_identical_bytes_get_distinct_uris() {
        let cache = AudioCache::new();
        let a = cache.create(vec![9; 8]);
        let b = cache.create(vec![9; 8]);

        assert_ne!(a, b);
        cache.revoke(&a);
        assert!(cache.resolve(&b).is_some());
    }
}
