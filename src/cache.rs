use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

/// Capability for persisting the serialized token cache between runs.
///
/// The identity layer calls `load` before every silent lookup and `store`
/// after every successful credential exchange. Implementations treat the
/// contents as opaque bytes; the layout is owned by the identity layer.
pub trait TokenCacheAccessor: Send + Sync {
    /// Returns the serialized cache contents, or an empty buffer when
    /// nothing has been persisted yet.
    fn load(&self) -> Result<Vec<u8>>;

    /// Replaces the persisted cache contents.
    fn store(&self, contents: &[u8]) -> Result<()>;
}

/// Token cache persisted to a local file, e.g. `token.json`.
///
/// A missing file is not an error: it loads as an empty cache.
///
/// # Examples
///
/// ```
/// use azure_sdk_tables::FileTokenCache;
/// let cache = FileTokenCache::new("token.json");
/// ```
#[derive(Debug)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenCacheAccessor for FileTokenCache {
    fn load(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read token cache {}", self.path.display()))
            }
        }
    }

    fn store(&self, contents: &[u8]) -> Result<()> {
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token cache {}", self.path.display()))
    }
}

/// Token cache held in process memory. Useful for tests and for callers
/// that do not want tokens persisted across runs.
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    contents: Mutex<Vec<u8>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCacheAccessor for InMemoryTokenCache {
    fn load(&self) -> Result<Vec<u8>> {
        Ok(self.contents.lock().unwrap().clone())
    }

    fn store(&self, contents: &[u8]) -> Result<()> {
        *self.contents.lock().unwrap() = contents.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_cache_loads_empty_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path().join("token.json"));
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn file_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path().join("token.json"));
        cache.store(b"{\"entries\":{}}").unwrap();
        assert_eq!(cache.load().unwrap(), b"{\"entries\":{}}");
    }

    #[test]
    fn in_memory_cache_round_trips() {
        let cache = InMemoryTokenCache::new();
        assert!(cache.load().unwrap().is_empty());
        cache.store(b"cached").unwrap();
        assert_eq!(cache.load().unwrap(), b"cached");
    }
}
