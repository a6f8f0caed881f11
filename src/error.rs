/// Failures raised while updating the playlist.
///
/// `Auth` and `Fetch` abort a run. Every other variant is caught where it
/// happens and only costs the unit of work it belongs to (one source, one
/// candidate, one album lookup or one batch).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("token exchange failed: {0}")]
    Auth(String),

    #[error("playlist read failed: {0}")]
    Fetch(String),

    #[error("source {source_id} failed: {message}")]
    Source { source_id: String, message: String },

    #[error("search failed: {0}")]
    Search(String),

    #[error("album lookup failed: {0}")]
    AlbumFetch(String),

    #[error("batch write failed: {0}")]
    BatchWrite(String),
}

impl SyncError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Fetch(_))
    }

    pub(crate) fn source_failed(source_id: &str, message: impl std::fmt::Display) -> Self {
        SyncError::Source {
            source_id: source_id.to_string(),
            message: message.to_string(),
        }
    }
}
