use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Title,
    Artist,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "title" => Some(Self::Title),
            "artist" => Some(Self::Artist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Asc => "A-Z",
            Self::Desc => "Z-A",
        }
    }
}

/// Which queue the selector is navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorMode {
    #[default]
    Normal,
    Favorites,
}

/// `(title, artist)` identity of a track. Numeric ids are not trusted across
/// sessions, so favorites and current-track restoration go through this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub title: String,
    pub artist: String,
}

impl TrackKey {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub src: String,
    pub cover: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl Track {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.title.clone(), self.artist.clone())
    }

    pub fn has_key(&self, key: &TrackKey) -> bool {
        self.title == key.title && self.artist == key.artist
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub sort_mode: SortMode,
    pub sort_order: SortOrder,
    pub favorites: Vec<TrackKey>,
    pub volume: f32,
}

pub fn default_volume() -> f32 {
    0.7
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sort_mode: SortMode::default(),
            sort_order: SortOrder::default(),
            favorites: Vec::new(),
            volume: default_volume(),
        }
    }
}
