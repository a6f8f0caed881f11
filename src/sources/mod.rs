pub mod broadcast_history;
pub mod now_playing;

use crate::config::Config;
use crate::error::SyncError;
use crate::models::{CandidateSong, TrackNameSet};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;

pub use broadcast_history::BroadcastHistory;
pub use now_playing::NowPlayingFeed;

/// Something that can report recently played songs.
#[async_trait]
pub trait SongSource: Send + Sync {
    /// Identifier used in configuration and logs.
    fn id(&self) -> &str;

    async fn fetch_songs(&self, client: &Client) -> Result<Vec<CandidateSong>, SyncError>;
}

/// The source kinds a configuration can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    BroadcastHistory,
    NowPlaying,
    Unrecognized(String),
}

impl SourceKind {
    pub fn parse(id: &str) -> Self {
        match id.trim() {
            broadcast_history::SOURCE_ID => SourceKind::BroadcastHistory,
            now_playing::SOURCE_ID => SourceKind::NowPlaying,
            other => SourceKind::Unrecognized(other.to_string()),
        }
    }
}

/// A configured source, ready to fetch.
pub enum Source {
    BroadcastHistory(BroadcastHistory),
    NowPlaying(NowPlayingFeed),
    /// Unknown identifier: contributes no songs.
    Noop(String),
}

impl Source {
    pub fn from_kind(kind: SourceKind, cfg: &Config) -> Self {
        match kind {
            SourceKind::BroadcastHistory => {
                Source::BroadcastHistory(BroadcastHistory::new(cfg.broadcast_history_url.clone()))
            }
            SourceKind::NowPlaying => match &cfg.now_playing_url {
                Some(url) => Source::NowPlaying(NowPlayingFeed::new(url.clone())),
                None => {
                    warn!(
                        "Source {} is enabled but now_playing_url is not set",
                        now_playing::SOURCE_ID
                    );
                    Source::Noop(now_playing::SOURCE_ID.to_string())
                }
            },
            SourceKind::Unrecognized(id) => {
                warn!("Unrecognized source {:?}; it will contribute no songs", id);
                Source::Noop(id)
            }
        }
    }

    /// Build the configured sources in configured order.
    pub fn all_from_config(cfg: &Config) -> Vec<Source> {
        cfg.sources
            .iter()
            .map(|id| Source::from_kind(SourceKind::parse(id), cfg))
            .collect()
    }
}

#[async_trait]
impl SongSource for Source {
    fn id(&self) -> &str {
        match self {
            Source::BroadcastHistory(s) => s.id(),
            Source::NowPlaying(s) => s.id(),
            Source::Noop(id) => id,
        }
    }

    async fn fetch_songs(&self, client: &Client) -> Result<Vec<CandidateSong>, SyncError> {
        match self {
            Source::BroadcastHistory(s) => s.fetch_songs(client).await,
            Source::NowPlaying(s) => s.fetch_songs(client).await,
            Source::Noop(_) => Ok(Vec::new()),
        }
    }
}

/// Query every source in order and keep songs whose lowercased name has not
/// been seen yet, either in the playlist or from an earlier source entry.
///
/// A failing source is logged and contributes nothing.
pub async fn collect_candidates<S: SongSource>(
    sources: &[S],
    client: &Client,
    seen_names: &mut TrackNameSet,
) -> Vec<CandidateSong> {
    let mut out = Vec::new();
    for source in sources {
        let songs = match source.fetch_songs(client).await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let before = out.len();
        let reported = songs.len();
        for song in songs {
            if seen_names.insert(&song.name) {
                out.push(song);
            }
        }
        info!(
            "Source {}: {} songs reported, {} new",
            source.id(),
            reported,
            out.len() - before
        );
    }
    out
}
