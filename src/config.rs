use crate::favorites::FavoritesStore;
use crate::model::{Preferences, SortMode, SortOrder, default_volume};
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const APP_DIR: &str = "tunewidget";
const STATE_FILE: &str = "state.json";
const LOG_DIR: &str = "logs";
const ARTWORK_DIR: &str = "artwork";

pub const SORT_MODE_KEY: &str = "sort_mode";
pub const SORT_ORDER_KEY: &str = "sort_order";
pub const VOLUME_KEY: &str = "volume";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("TUNEWIDGET_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_root()?.join(STATE_FILE))
}

pub fn log_dir() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_DIR))
}

pub fn artwork_cache_dir() -> Result<PathBuf> {
    Ok(config_root()?.join(ARTWORK_DIR))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

/// Reads every persisted preference once. Unknown or unparsable values fall
/// back to their defaults instead of failing startup.
pub fn load_preferences(store: &dyn KeyValueStore) -> Result<Preferences> {
    let sort_mode = store
        .get(SORT_MODE_KEY)?
        .and_then(|raw| SortMode::parse(&raw))
        .unwrap_or_default();
    let sort_order = store
        .get(SORT_ORDER_KEY)?
        .and_then(|raw| SortOrder::parse(&raw))
        .unwrap_or_default();
    let volume = store
        .get(VOLUME_KEY)?
        .and_then(|raw| raw.trim().parse::<f32>().ok())
        .filter(|volume| volume.is_finite())
        .map(|volume| volume.clamp(0.0, 1.0))
        .unwrap_or_else(default_volume);
    let favorites = match FavoritesStore::load(store) {
        Ok(favorites) => favorites.keys().to_vec(),
        Err(err) => {
            warn!("ignoring persisted favorites: {err:#}");
            Vec::new()
        }
    };

    Ok(Preferences {
        sort_mode,
        sort_order,
        favorites,
        volume,
    })
}

pub fn save_sort(store: &mut dyn KeyValueStore, mode: SortMode, order: SortOrder) -> Result<()> {
    store.set(SORT_MODE_KEY, mode.as_str())?;
    store.set(SORT_ORDER_KEY, order.as_str())?;
    Ok(())
}

pub fn save_volume(store: &mut dyn KeyValueStore, volume: f32) -> Result<()> {
    store.set(VOLUME_KEY, &format!("{volume:.2}"))
}
