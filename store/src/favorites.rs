use crate::{KeyValueStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

/// Key under which the favorite identifiers are persisted
pub const FAVORITES_KEY: &str = "favoriteCoinIDs";

/// Persisted set of favorite coin identifiers. Sole writer of that set;
/// everyone else reads it or subscribes to changes.
pub struct FavoritesStore {
    kv: KeyValueStore,
    tx: watch::Sender<BTreeSet<String>>,
    write_lock: Mutex<()>,
}

impl FavoritesStore {
    pub fn open(kv: KeyValueStore) -> Self {
        let ids: BTreeSet<String> = kv
            .get::<Vec<String>>(FAVORITES_KEY)
            .unwrap_or_default()
            .into_iter()
            .collect();
        info!("Loaded {} favorite coins from {}", ids.len(), kv.path().display());

        let (tx, _) = watch::channel(ids);
        Self {
            kv,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.tx.borrow().contains(id)
    }

    pub fn get_all(&self) -> BTreeSet<String> {
        self.tx.borrow().clone()
    }

    /// Receiver marked changed on every mutation
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tx.subscribe()
    }

    /// Returns `true` if the id was not a favorite before.
    pub fn add(&self, id: &str) -> Result<bool, StoreError> {
        self.update(|ids| ids.insert(id.to_string()))
    }

    /// Returns `true` if the id was a favorite before.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.update(|ids| ids.remove(id))
    }

    /// Flips membership; returns whether the id is a favorite afterwards.
    pub fn toggle(&self, id: &str) -> Result<bool, StoreError> {
        let mut now_favorite = false;
        self.update(|ids| {
            now_favorite = if ids.remove(id) {
                false
            } else {
                ids.insert(id.to_string())
            };
            true
        })?;
        Ok(now_favorite)
    }

    /// Applies `change` to a copy, persists it, then publishes it.
    /// Nothing is persisted or published when `change` reports no effect.
    fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut BTreeSet<String>) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = self.tx.borrow().clone();
        if !change(&mut next) {
            return Ok(false);
        }

        let as_list: Vec<&String> = next.iter().collect();
        self.kv.set(FAVORITES_KEY, &as_list)?;
        debug!("Favorites now hold {} coins", next.len());

        self.tx.send_replace(next);
        Ok(true)
    }
}
