use super::Provider;
use crate::error::SyncError;
use crate::models::{
    AccessToken, Album, AlbumRef, PlaylistItem, PlaylistPage, PlaylistTrack, ResolvedSong,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A request the mock received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Token,
    Page { offset: usize, limit: usize },
    Remove(usize),
    Add(usize),
    Search { name: String, artist: String },
    Album(String),
}

#[derive(Default)]
struct MockState {
    playlist: Vec<PlaylistItem>,
    catalog: HashMap<(String, String), ResolvedSong>,
    albums: HashMap<String, Album>,
    failing_albums: HashSet<String>,
    failing_add_batches: HashSet<usize>,
    failing_remove_batches: HashSet<usize>,
    fail_auth: bool,
    fail_pages: bool,
    add_batches_seen: usize,
    remove_batches_seen: usize,
    calls: Vec<MockCall>,
}

/// An in-memory playlist and catalog used in tests.
/// It records every request and answers deterministically.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_track(self, id: &str, name: &str, added_at: DateTime<Utc>) -> Self {
        self.state().playlist.push(PlaylistItem {
            added_at: Some(added_at),
            track: Some(PlaylistTrack {
                id: Some(id.to_string()),
                name: name.to_string(),
                uri: format!("mock:track:{}", id),
            }),
        });
        self
    }

    /// A local file: it has a URI and a name but no catalog id.
    pub fn with_local_track(self, name: &str, added_at: DateTime<Utc>) -> Self {
        self.state().playlist.push(PlaylistItem {
            added_at: Some(added_at),
            track: Some(PlaylistTrack {
                id: None,
                name: name.to_string(),
                uri: format!("mock:local:{}", name.replace(' ', "+")),
            }),
        });
        self
    }

    /// Register a search hit for the exact (already sanitized) name and artist.
    pub fn with_catalog_entry(
        self,
        name: &str,
        artist: &str,
        id: &str,
        album_id: Option<&str>,
    ) -> Self {
        self.state().catalog.insert(
            (name.to_string(), artist.to_string()),
            ResolvedSong {
                uri: format!("mock:track:{}", id),
                id: id.to_string(),
                album: album_id.map(|a| AlbumRef { id: a.to_string() }),
            },
        );
        self
    }

    pub fn with_album(self, id: &str, release_date: Option<NaiveDate>) -> Self {
        self.state().albums.insert(
            id.to_string(),
            Album {
                id: id.to_string(),
                release_date,
            },
        );
        self
    }

    pub fn failing_album(self, id: &str) -> Self {
        self.state().failing_albums.insert(id.to_string());
        self
    }

    /// Fail the n-th (0-based) add request.
    pub fn failing_add_batch(self, index: usize) -> Self {
        self.state().failing_add_batches.insert(index);
        self
    }

    /// Fail the n-th (0-based) remove request.
    pub fn failing_remove_batch(self, index: usize) -> Self {
        self.state().failing_remove_batches.insert(index);
        self
    }

    pub fn failing_auth(self) -> Self {
        self.state().fail_auth = true;
        self
    }

    pub fn failing_pages(self) -> Self {
        self.state().fail_pages = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// URIs currently in the in-memory playlist, in order.
    pub fn playlist_uris(&self) -> Vec<String> {
        self.state()
            .playlist
            .iter()
            .filter_map(|it| it.track.as_ref().map(|t| t.uri.clone()))
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn request_access_token(&self) -> Result<AccessToken, SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Token);
        if st.fail_auth {
            return Err(SyncError::Auth("mock auth failure".into()));
        }
        Ok(AccessToken("mock-token".into()))
    }

    async fn fetch_playlist_page(
        &self,
        _token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> Result<PlaylistPage, SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Page { offset, limit });
        if st.fail_pages {
            return Err(SyncError::Fetch("mock page failure".into()));
        }
        let total = st.playlist.len();
        let items = st.playlist.iter().skip(offset).take(limit).cloned().collect();
        Ok(PlaylistPage { total, items })
    }

    async fn remove_tracks(&self, _token: &AccessToken, uris: &[String]) -> Result<(), SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Remove(uris.len()));
        let batch = st.remove_batches_seen;
        st.remove_batches_seen += 1;
        if st.failing_remove_batches.contains(&batch) {
            return Err(SyncError::BatchWrite(format!("mock remove batch {} failed", batch)));
        }
        st.playlist
            .retain(|it| it.track.as_ref().map_or(true, |t| !uris.contains(&t.uri)));
        info!("MockProvider: removed {} tracks", uris.len());
        Ok(())
    }

    async fn add_tracks(&self, _token: &AccessToken, uris: &[String]) -> Result<(), SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Add(uris.len()));
        let batch = st.add_batches_seen;
        st.add_batches_seen += 1;
        if st.failing_add_batches.contains(&batch) {
            return Err(SyncError::BatchWrite(format!("mock add batch {} failed", batch)));
        }
        let now = Utc::now();
        for uri in uris {
            st.playlist.push(PlaylistItem {
                added_at: Some(now),
                track: Some(PlaylistTrack {
                    id: uri.strip_prefix("mock:track:").map(String::from),
                    name: String::new(),
                    uri: uri.clone(),
                }),
            });
        }
        info!("MockProvider: added {} tracks", uris.len());
        Ok(())
    }

    async fn search_track(
        &self,
        _token: &AccessToken,
        name: &str,
        artist: &str,
    ) -> Result<Option<ResolvedSong>, SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Search {
            name: name.to_string(),
            artist: artist.to_string(),
        });
        Ok(st.catalog.get(&(name.to_string(), artist.to_string())).cloned())
    }

    async fn fetch_album(&self, _token: &AccessToken, album_id: &str) -> Result<Album, SyncError> {
        let mut st = self.state();
        st.calls.push(MockCall::Album(album_id.to_string()));
        if st.failing_albums.contains(album_id) {
            return Err(SyncError::AlbumFetch(format!("mock album {} failed", album_id)));
        }
        st.albums
            .get(album_id)
            .cloned()
            .ok_or_else(|| SyncError::AlbumFetch(format!("404 for album {}", album_id)))
    }
}
