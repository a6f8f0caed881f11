pub mod spotify;
pub mod spotify_auth;
pub mod mock;

use crate::error::SyncError;
use crate::models::{AccessToken, Album, PlaylistPage, ResolvedSong};

/// Provider trait: the REST operations the pipeline needs.
/// Implementations: spotify::SpotifyProvider and mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Exchange the stored refresh credential for a short-lived access token.
    async fn request_access_token(&self) -> Result<AccessToken, SyncError>;

    /// Read one page of the target playlist.
    async fn fetch_playlist_page(
        &self,
        token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> Result<PlaylistPage, SyncError>;

    /// Remove tracks (URIs) from the target playlist (batching done by caller)
    async fn remove_tracks(&self, token: &AccessToken, uris: &[String]) -> Result<(), SyncError>;

    /// Append tracks (URIs) to the target playlist (batching done by caller)
    async fn add_tracks(&self, token: &AccessToken, uris: &[String]) -> Result<(), SyncError>;

    /// Search the catalog for the best single match of a track by an artist.
    async fn search_track(
        &self,
        token: &AccessToken,
        name: &str,
        artist: &str,
    ) -> Result<Option<ResolvedSong>, SyncError>;

    async fn fetch_album(&self, token: &AccessToken, album_id: &str) -> Result<Album, SyncError>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
