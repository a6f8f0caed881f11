use super::SongSource;
use crate::error::SyncError;
use crate::models::CandidateSong;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

pub const SOURCE_ID: &str = "now_playing";

/// Hours of play history requested from the feed, ending now.
pub const WINDOW_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
struct FeedEntry {
    song: String,
    artist: String,
}

/// A JSON "now playing" API returning `[{"song": .., "artist": ..}, ..]`
/// for a `since`/`until` window.
pub struct NowPlayingFeed {
    url: String,
}

impl NowPlayingFeed {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// Feed URL for the window of `WINDOW_HOURS` ending at `until`.
    pub fn window_url(&self, until: DateTime<Utc>) -> Result<Url, SyncError> {
        let since = until - Duration::hours(WINDOW_HOURS);
        let mut url = Url::parse(&self.url).map_err(|e| SyncError::source_failed(SOURCE_ID, e))?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("until", &until.to_rfc3339_opts(SecondsFormat::Secs, true));
        Ok(url)
    }
}

pub fn parse_feed(body: &str) -> Result<Vec<CandidateSong>, SyncError> {
    let entries: Vec<FeedEntry> = serde_json::from_str(body)
        .map_err(|e| SyncError::source_failed(SOURCE_ID, format!("parse feed: {}", e)))?;
    Ok(entries
        .into_iter()
        .map(|e| CandidateSong::new(e.song.trim(), e.artist.trim()))
        .filter(|s| !s.name.is_empty())
        .collect())
}

#[async_trait]
impl SongSource for NowPlayingFeed {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch_songs(&self, client: &Client) -> Result<Vec<CandidateSong>, SyncError> {
        let url = self.window_url(Utc::now())?;
        let resp = client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::source_failed(SOURCE_ID, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::source_failed(SOURCE_ID, status));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| SyncError::source_failed(SOURCE_ID, e))?;
        parse_feed(&body)
    }
}
