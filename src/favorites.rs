use crate::model::{Track, TrackKey};
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use std::collections::HashSet;

pub const FAVORITES_KEY: &str = "favorites";

/// Ordered set of favorited `(title, artist)` keys.
///
/// The store never caches a queue: callers rebuild the favorites queue after
/// every [`FavoritesStore::toggle`].
#[derive(Debug, Clone, Default)]
pub struct FavoritesStore {
    order: Vec<TrackKey>,
    members: HashSet<TrackKey>,
}

impl FavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = TrackKey>) -> Self {
        let mut store = Self::new();
        for key in keys {
            if store.members.insert(key.clone()) {
                store.order.push(key);
            }
        }
        store
    }

    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = store.get(FAVORITES_KEY)? else {
            return Ok(Self::new());
        };
        let keys: Vec<TrackKey> =
            serde_json::from_str(&raw).context("failed to parse persisted favorites")?;
        Ok(Self::from_keys(keys))
    }

    pub fn persist(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.order)?;
        store.set(FAVORITES_KEY, &raw)
    }

    pub fn is_favorite(&self, track: &Track) -> bool {
        self.contains(&track.key())
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.members.contains(key)
    }

    /// Flips membership of `track` and returns the new state.
    pub fn toggle(&mut self, track: &Track) -> bool {
        let key = track.key();
        if self.members.remove(&key) {
            self.order.retain(|existing| existing != &key);
            false
        } else {
            self.members.insert(key.clone());
            self.order.push(key);
            true
        }
    }

    pub fn keys(&self) -> &[TrackKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
