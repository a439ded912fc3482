use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Resource kinds with their own cache file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    CoinMarkets,
    GlobalSnapshot,
}

impl CacheKey {
    pub fn file_name(&self) -> &'static str {
        match self {
            CacheKey::CoinMarkets => "coin_markets.json",
            CacheKey::GlobalSnapshot => "global_snapshot.json",
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::CoinMarkets => write!(f, "coin_markets"),
            CacheKey::GlobalSnapshot => write!(f, "global_snapshot"),
        }
    }
}

/// Last-good copy of each resource as a JSON file. No expiry: whoever
/// reads decides whether stale data is acceptable.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Replaces the whole file: data goes to a temporary sibling first and is
    /// renamed over the target, so readers see either the old or the new value.
    pub async fn save<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        let target = self.path_for(key);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let tmp = self.tmp_path(key);
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            return Err(StoreError::io(&tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&target, e));
        }

        debug!("Cached {} ({} bytes) at {}", key, bytes.len(), target.display());
        Ok(())
    }

    /// `None` when the file is missing or unreadable.
    pub async fn load<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file for {} at {}", key, path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring corrupt cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn tmp_path(&self, key: CacheKey) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}.{}.tmp",
            key.file_name(),
            std::process::id(),
            seq
        ))
    }
}
