use crate::model::{SortMode, SortOrder, Track, TrackKey};
use crate::queue::compare_tracks;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Ordered tracks for the session. Only sorting reorders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    album: Option<String>,
}

impl Catalog {
    /// Wraps already-validated tracks.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position_of(&self, key: &TrackKey) -> Option<usize> {
        self.tracks.iter().position(|track| track.has_key(key))
    }

    /// Stable, key-preserving reorder. Callers holding a catalog index must
    /// re-locate their track through [`Catalog::position_of`] afterwards.
    pub fn sort(&mut self, mode: SortMode, order: SortOrder) {
        self.tracks.sort_by(|a, b| compare_tracks(a, b, mode, order));
    }
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read playlist {}", path.display()))?;
    let catalog = parse_catalog(&raw, path.parent())
        .with_context(|| format!("invalid playlist {}", path.display()))?;
    info!("loaded {} tracks from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Parses and validates a JSON track list. Any bad record rejects the whole
/// list; no partial catalog is ever returned.
pub fn parse_catalog(raw: &str, base_dir: Option<&Path>) -> Result<Catalog> {
    let value: Value = serde_json::from_str(raw).context("playlist is not valid JSON")?;
    let Value::Array(records) = value else {
        bail!("playlist must be an array");
    };

    let mut ids = HashSet::with_capacity(records.len());
    let mut tracks = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        let raw: RawTrack = serde_json::from_value(record)
            .with_context(|| format!("track #{} is malformed", position + 1))?;

        let Some(id) = raw.id.as_ref().and_then(Value::as_u64) else {
            bail!("track #{} missing id", position + 1);
        };
        if !ids.insert(id) {
            bail!("duplicate id {id}");
        }

        let title = non_empty(raw.title);
        let artist = non_empty(raw.artist);
        let src = non_empty(raw.src);
        let cover = non_empty(raw.cover);
        let missing: Vec<&str> = [
            ("title", title.is_none()),
            ("artist", artist.is_none()),
            ("src", src.is_none()),
            ("cover", cover.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(title), Some(artist), Some(src), Some(cover)) = (title, artist, src, cover)
        else {
            bail!("track id {id} missing fields: {}", missing.join(", "));
        };

        tracks.push(Track {
            id,
            title,
            artist,
            src: resolve_locator(&src, base_dir),
            cover: resolve_locator(&cover, base_dir),
            album: non_empty(raw.album),
        });
    }

    Ok(Catalog::from_tracks(tracks))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_locator(locator: &str, base_dir: Option<&Path>) -> String {
    if locator.contains("://") {
        return locator.to_string();
    }
    match base_dir {
        Some(base) if Path::new(locator).is_relative() && !base.as_os_str().is_empty() => {
            base.join(locator).to_string_lossy().to_string()
        }
        _ => locator.to_string(),
    }
}
