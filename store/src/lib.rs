mod config;
mod disk_cache;
mod error;
mod favorites;
mod kv_store;

pub use config::StoreConfig;
pub use disk_cache::{CacheKey, DiskCache};
pub use error::StoreError;
pub use favorites::{FavoritesStore, FAVORITES_KEY};
pub use kv_store::KeyValueStore;
