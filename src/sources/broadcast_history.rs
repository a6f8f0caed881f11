use super::SongSource;
use crate::error::SyncError;
use crate::models::CandidateSong;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use scraper::{Html, Selector};

pub const SOURCE_ID: &str = "broadcast_history";

/// A station's HTML broadcast-history page. Each `.broadcast span` holds one
/// entry of the form `"Artist - Title"`.
pub struct BroadcastHistory {
    url: String,
}

impl BroadcastHistory {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

/// Split one broadcast entry on the first `" - "` into artist and title.
/// Quotes are dropped and both sides trimmed; entries missing either side
/// yield None.
pub fn parse_entry(text: &str) -> Option<CandidateSong> {
    let text = text.replace('"', "");
    let (artist, title) = text.trim().split_once(" - ")?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(CandidateSong::new(title, artist))
}

/// Extract every parseable broadcast entry from the page, in page order.
pub fn parse_page(html: &str) -> Result<Vec<CandidateSong>, SyncError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".broadcast span")
        .map_err(|e| SyncError::source_failed(SOURCE_ID, format!("selector: {:?}", e)))?;
    let mut songs = Vec::new();
    for element in document.select(&selector) {
        let text: String = element.text().collect();
        match parse_entry(&text) {
            Some(song) => songs.push(song),
            None => debug!("Skipping broadcast entry {:?}", text),
        }
    }
    Ok(songs)
}

#[async_trait]
impl SongSource for BroadcastHistory {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch_songs(&self, client: &Client) -> Result<Vec<CandidateSong>, SyncError> {
        let resp = client
            .get(&self.url)
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
        parse_page(&body)
    }
}
