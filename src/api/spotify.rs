use super::{spotify_auth, Provider};
use crate::config::Config;
use crate::error::SyncError;
use crate::models::{
    AccessToken, Album, AlbumRef, PlaylistItem, PlaylistPage, PlaylistTrack, ResolvedSong,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct PageBody {
    total: usize,
    #[serde(default)]
    items: Vec<ItemBody>,
}

#[derive(Deserialize)]
struct ItemBody {
    added_at: Option<DateTime<Utc>>,
    track: Option<TrackBody>,
}

#[derive(Deserialize)]
struct TrackBody {
    id: Option<String>,
    name: Option<String>,
    uri: Option<String>,
    album: Option<AlbumBody>,
}

#[derive(Deserialize)]
struct AlbumBody {
    id: Option<String>,
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct SearchBody {
    tracks: SearchTracks,
}

#[derive(Deserialize)]
struct SearchTracks {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    items: Vec<TrackBody>,
}

/// Spotify provider backed by the Spotify Web API.
/// Endpoints and the target playlist come from the `Config` passed in, which
/// lets tests point the provider at a mock server.
pub struct SpotifyProvider {
    client: Client,
    cfg: Config,
}

impl SpotifyProvider {
    pub fn new(cfg: Config) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn tracks_url(&self) -> String {
        format!(
            "{}/users/{}/playlists/{}/tracks",
            self.cfg.api_base(),
            urlencoding::encode(&self.cfg.user_id),
            urlencoding::encode(&self.cfg.playlist_id)
        )
    }
}

/// Parse a release date of `day`, `month` or `year` precision, padding the
/// missing parts with the first day or month.
pub fn parse_release_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01-01", s), "%Y-%m-%d"))
        .ok()
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn request_access_token(&self) -> Result<AccessToken, SyncError> {
        spotify_auth::request_access_token(&self.client, &self.cfg).await
    }

    async fn fetch_playlist_page(
        &self,
        token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> Result<PlaylistPage, SyncError> {
        let url = format!("{}?offset={}&limit={}", self.tracks_url(), offset, limit);
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SyncError::Fetch(format!("{} => {}", status, txt)));
        }
        let body: PageBody = resp
            .json()
            .await
            .map_err(|e| SyncError::Fetch(format!("parse playlist page: {}", e)))?;

        let items = body
            .items
            .into_iter()
            .map(|it| PlaylistItem {
                added_at: it.added_at,
                track: it.track.and_then(|t| {
                    t.uri.map(|uri| PlaylistTrack {
                        id: t.id,
                        name: t.name.unwrap_or_default(),
                        uri,
                    })
                }),
            })
            .collect();
        Ok(PlaylistPage {
            total: body.total,
            items,
        })
    }

    async fn remove_tracks(&self, token: &AccessToken, uris: &[String]) -> Result<(), SyncError> {
        let tracks: Vec<serde_json::Value> = uris.iter().map(|u| json!({ "uri": u })).collect();
        let body = json!({ "tracks": tracks });
        let resp = self
            .client
            .delete(self.tracks_url())
            .header(AUTHORIZATION, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::BatchWrite(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SyncError::BatchWrite(format!(
                "remove tracks failed: {} => {}",
                status, txt
            )));
        }
        Ok(())
    }

    async fn add_tracks(&self, token: &AccessToken, uris: &[String]) -> Result<(), SyncError> {
        let body = json!({ "uris": uris });
        let resp = self
            .client
            .post(self.tracks_url())
            .header(AUTHORIZATION, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::BatchWrite(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SyncError::BatchWrite(format!(
                "add tracks failed: {} => {}",
                status, txt
            )));
        }
        Ok(())
    }

    async fn search_track(
        &self,
        token: &AccessToken,
        name: &str,
        artist: &str,
    ) -> Result<Option<ResolvedSong>, SyncError> {
        let q = format!("artist:{} track:{}", artist, name);
        let url = format!(
            "{}/search?q={}&type=track&market={}&limit=1",
            self.cfg.api_base(),
            urlencoding::encode(&q),
            urlencoding::encode(&self.cfg.market)
        );
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Search(format!("{} for query {:?}", status, q)));
        }
        let body: SearchBody = resp
            .json()
            .await
            .map_err(|e| SyncError::Search(format!("parse search result: {}", e)))?;
        if body.tracks.total == 0 {
            debug!("No match for query {:?}", q);
            return Ok(None);
        }
        let first = match body.tracks.items.into_iter().next() {
            Some(t) => t,
            None => return Ok(None),
        };
        match (first.id, first.uri) {
            (Some(id), Some(uri)) => Ok(Some(ResolvedSong {
                uri,
                id,
                album: first
                    .album
                    .and_then(|a| a.id)
                    .map(|id| AlbumRef { id }),
            })),
            _ => Ok(None),
        }
    }

    async fn fetch_album(&self, token: &AccessToken, album_id: &str) -> Result<Album, SyncError> {
        let url = format!(
            "{}/albums/{}",
            self.cfg.api_base(),
            urlencoding::encode(album_id)
        );
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::AlbumFetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::AlbumFetch(format!("{} for album {}", status, album_id)));
        }
        let body: AlbumBody = resp
            .json()
            .await
            .map_err(|e| SyncError::AlbumFetch(format!("parse album: {}", e)))?;
        let release_date = match body.release_date.as_deref() {
            Some(raw) => {
                let parsed = parse_release_date(raw);
                if parsed.is_none() {
                    debug!("Unparseable release date {:?} on album {}", raw, album_id);
                }
                parsed
            }
            None => None,
        };
        Ok(Album {
            id: body.id.unwrap_or_else(|| album_id.to_string()),
            release_date,
        })
    }
}
