use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bearer token valid for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

/// A track currently in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    /// None for local files.
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
}

/// A song reported by a radio source or supplied by the caller, not yet
/// matched to a catalog track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSong {
    pub name: String,
    pub artist: String,
}

impl CandidateSong {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRef {
    pub id: String,
}

/// A candidate matched to exactly one catalog track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSong {
    pub uri: String,
    pub id: String,
    pub album: Option<AlbumRef>,
}

/// Album metadata as far as release filtering needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub release_date: Option<chrono::NaiveDate>,
}

/// One entry of a playlist page. `track` is None for items the provider
/// cannot describe at all.
#[derive(Debug, Clone)]
pub struct PlaylistItem {
    pub added_at: Option<DateTime<Utc>>,
    pub track: Option<PlaylistTrack>,
}

#[derive(Debug, Clone)]
pub struct PlaylistTrack {
    /// None for local files, which have a URI but no catalog id.
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct PlaylistPage {
    pub total: usize,
    pub items: Vec<PlaylistItem>,
}

/// Result of reading the whole playlist.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSnapshot {
    pub kept: Vec<TrackRef>,
    pub expired: Vec<TrackRef>,
    pub pages: usize,
}

impl PlaylistSnapshot {
    pub fn expired_uris(&self) -> Vec<String> {
        self.expired.iter().map(|t| t.uri.clone()).collect()
    }
}

/// Track ids already in the playlist or resolved during this run.
#[derive(Debug, Clone, Default)]
pub struct TrackIdSet(HashSet<String>);

impl TrackIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns true if the id was not present before.
    pub fn insert(&mut self, id: &str) -> bool {
        self.0.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lowercased track names already in the playlist or already taken from a
/// source during this run.
#[derive(Debug, Clone, Default)]
pub struct TrackNameSet(HashSet<String>);

impl TrackNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_lowercase())
    }

    /// Returns true if the name was not present before.
    pub fn insert(&mut self, name: &str) -> bool {
        self.0.insert(name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
