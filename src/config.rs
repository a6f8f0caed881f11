use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;

/// Upper bound on items per playlist page, add request and remove request.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Provider endpoints
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,

    // Credentials
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,

    // Target playlist
    pub user_id: String,
    pub playlist_id: String,
    #[serde(default = "default_market")]
    pub market: String,

    /// Source identifiers queried in order, e.g. ["broadcast_history", "now_playing"].
    /// Unknown identifiers are kept and skipped at run time.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_broadcast_history_url")]
    pub broadcast_history_url: String,
    #[serde(default)]
    pub now_playing_url: Option<String>,

    /// Tracks added to the playlist longer ago than this are removed.
    #[serde(default)]
    pub retention_ms: Option<u64>,
    /// Tracks whose album was released on or before this date are not added.
    #[serde(default)]
    pub release_cutoff: Option<NaiveDate>,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_auth_url() -> String { "https://accounts.spotify.com/api/token".into() }
fn default_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_market() -> String { "US".into() }
fn default_sources() -> Vec<String> { vec!["broadcast_history".into()] }
fn default_broadcast_history_url() -> String {
    "http://www.thepeak.fm/BroadcastHistory.aspx".into()
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Base URL of the provider API without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}
