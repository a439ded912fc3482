use std::path::PathBuf;

const DEFAULT_CACHE_DIR: &str = ".coinwatch/cache";
const DEFAULT_FAVORITES_PATH: &str = ".coinwatch/favorites.json";

/// Configuration for the local persistence layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding one cache file per resource kind
    pub cache_dir: PathBuf,
    /// Key-value file holding the favorite coin identifiers
    pub favorites_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            favorites_path: PathBuf::from(DEFAULT_FAVORITES_PATH),
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cache_dir: lookup("COINWATCH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            favorites_path: lookup("COINWATCH_FAVORITES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.favorites_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_what_is_set() {
        let config = StoreConfig::from_lookup(|key| {
            (key == "COINWATCH_CACHE_DIR").then(|| "/var/cache/coinwatch".to_string())
        });
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/coinwatch"));
        assert_eq!(config.favorites_path, PathBuf::from(DEFAULT_FAVORITES_PATH));
    }
}
