use crate::api::{spotify::SpotifyProvider, Provider};
use crate::config::{Config, MAX_BATCH_SIZE};
use crate::error::SyncError;
use crate::models::{
    AccessToken, CandidateSong, PlaylistSnapshot, ResolvedSong, TrackIdSet, TrackNameSet, TrackRef,
};
use crate::sanitize::sanitize;
use crate::sources::{collect_candidates, Source};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use reqwest::Client;
use std::sync::Arc;

/// Counters for one run, logged at the end and returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub kept: usize,
    pub expired: usize,
    pub removed: usize,
    pub candidates: usize,
    pub resolved: usize,
    pub added: usize,
    /// False when a fatal stage (token exchange or playlist read) failed.
    pub completed: bool,
}

/// Page through the playlist and split it into tracks to keep and URIs to
/// expire.
///
/// A track is expired when `retention_ms` is set and it was added more than
/// `retention_ms` milliseconds before `now`. Paging stops once as many items
/// have been seen as the provider reports in `total`.
pub async fn read_playlist(
    provider: &dyn Provider,
    token: &AccessToken,
    retention_ms: Option<u64>,
    now: DateTime<Utc>,
) -> Result<PlaylistSnapshot, SyncError> {
    let mut snapshot = PlaylistSnapshot::default();
    let mut offset = 0usize;
    let mut seen = 0usize;

    loop {
        let page = provider
            .fetch_playlist_page(token, offset, MAX_BATCH_SIZE)
            .await?;
        snapshot.pages += 1;

        if page.items.is_empty() {
            if seen < page.total {
                warn!(
                    "Playlist page at offset {} was empty after {} of {} items; stopping",
                    offset, seen, page.total
                );
            }
            break;
        }
        seen += page.items.len();

        for item in page.items {
            let track = match item.track {
                Some(t) => t,
                None => {
                    debug!("Skipping playlist item without track data");
                    continue;
                }
            };
            let age_ms = item
                .added_at
                .map(|added| now.signed_duration_since(added).num_milliseconds());
            let is_expired = match (retention_ms, age_ms) {
                (Some(limit), Some(age)) => age > 0 && age as u64 > limit,
                _ => false,
            };
            if track.id.is_none() {
                debug!("{} has no catalog id; deduplicated by name only", track.uri);
            }
            let track = TrackRef {
                id: track.id,
                name: track.name,
                uri: track.uri,
            };
            if is_expired {
                snapshot.expired.push(track);
            } else {
                snapshot.kept.push(track);
            }
        }

        if seen >= page.total {
            break;
        }
        offset += MAX_BATCH_SIZE;
    }

    Ok(snapshot)
}

/// Outcome of removing expired tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    pub removed: usize,
    /// URIs from failed batches. They are still in the playlist.
    pub retained: Vec<String>,
}

/// Remove `expired` URIs in batches of at most `MAX_BATCH_SIZE`.
/// A failed batch is logged and skipped; its URIs end up in `retained`.
pub async fn remove_tracks(
    provider: &dyn Provider,
    token: &AccessToken,
    expired: &[String],
) -> Removal {
    let mut out = Removal::default();
    for chunk in expired.chunks(MAX_BATCH_SIZE) {
        match provider.remove_tracks(token, chunk).await {
            Ok(()) => {
                info!("{} songs removed", chunk.len());
                out.removed += chunk.len();
            }
            Err(e) => {
                warn!("Removing batch of {} failed: {}", chunk.len(), e);
                out.retained.extend_from_slice(chunk);
            }
        }
    }
    out
}

/// Ids and names of every track that stays in the playlist: the kept ones,
/// including local files without an id, plus expired tracks whose removal
/// failed.
pub fn dedup_sets(
    snapshot: &PlaylistSnapshot,
    retained: &[String],
) -> (TrackIdSet, TrackNameSet) {
    let mut ids = TrackIdSet::new();
    let mut names = TrackNameSet::new();
    let still_present = snapshot
        .expired
        .iter()
        .filter(|t| retained.contains(&t.uri));
    for track in snapshot.kept.iter().chain(still_present) {
        if let Some(id) = &track.id {
            ids.insert(id);
        }
        names.insert(&track.name);
    }
    (ids, names)
}

/// Look up each candidate in the catalog and keep the first match whose id
/// has not been seen yet. Output order follows candidate order.
pub async fn resolve_tracks(
    provider: &dyn Provider,
    token: &AccessToken,
    candidates: &[CandidateSong],
    seen_ids: &mut TrackIdSet,
) -> Vec<ResolvedSong> {
    let mut resolved = Vec::new();
    for song in candidates {
        let name = sanitize(&song.name);
        let artist = sanitize(&song.artist);
        match provider.search_track(token, &name, &artist).await {
            Ok(Some(found)) => {
                if seen_ids.insert(&found.id) {
                    resolved.push(found);
                } else {
                    debug!(
                        "{} - {} resolves to {} which is already present",
                        song.artist, song.name, found.id
                    );
                }
            }
            Ok(None) => debug!("No catalog match for {} - {}", song.artist, song.name),
            Err(e) => warn!("Search for {} - {} failed: {}", song.artist, song.name, e),
        }
    }
    resolved
}

/// Drop songs whose album was released on or before `cutoff`.
///
/// Without a cutoff every URI passes. Songs without album information pass,
/// as do albums without a release date. A failed album lookup drops the song.
pub async fn filter_by_release(
    provider: &dyn Provider,
    token: &AccessToken,
    songs: Vec<ResolvedSong>,
    cutoff: Option<NaiveDate>,
) -> Vec<String> {
    let cutoff = match cutoff {
        Some(c) => c,
        None => return songs.into_iter().map(|s| s.uri).collect(),
    };

    let mut uris = Vec::with_capacity(songs.len());
    for song in songs {
        let album = match &song.album {
            Some(a) => a,
            None => {
                uris.push(song.uri);
                continue;
            }
        };
        match provider.fetch_album(token, &album.id).await {
            Ok(meta) => match meta.release_date {
                Some(date) if date <= cutoff => {
                    debug!("Skipping {}: album released {} (cutoff {})", song.uri, date, cutoff)
                }
                _ => uris.push(song.uri),
            },
            Err(e) => warn!("Dropping {}: {}", song.uri, e),
        }
    }
    uris
}

/// Append `uris` in batches of at most `MAX_BATCH_SIZE`.
/// A failed batch is logged and skipped. Returns the number of URIs in
/// batches the provider accepted.
pub async fn add_tracks(provider: &dyn Provider, token: &AccessToken, uris: &[String]) -> usize {
    if uris.is_empty() {
        info!("0 songs added");
        return 0;
    }
    let mut added = 0;
    for chunk in uris.chunks(MAX_BATCH_SIZE) {
        match provider.add_tracks(token, chunk).await {
            Ok(()) => {
                info!("{} songs added", chunk.len());
                added += chunk.len();
            }
            Err(e) => warn!("Adding batch of {} failed: {}", chunk.len(), e),
        }
    }
    added
}

/// Runs the whole update: token, read, prune, gather, resolve, filter, add.
pub struct Updater {
    cfg: Config,
    provider: Arc<dyn Provider>,
    sources: Vec<Source>,
    client: Client,
}

impl Updater {
    /// Spotify provider and the sources named in `cfg`.
    pub fn new(cfg: Config) -> Self {
        let provider: Arc<dyn Provider> = Arc::new(SpotifyProvider::new(cfg.clone()));
        let sources = Source::all_from_config(&cfg);
        Self::with_parts(cfg, provider, sources)
    }

    pub fn with_parts(cfg: Config, provider: Arc<dyn Provider>, sources: Vec<Source>) -> Self {
        Self {
            cfg,
            provider,
            sources,
            client: Client::new(),
        }
    }

    /// Update the playlist. With `new_songs` the sources are not queried
    /// and those songs are the candidates.
    ///
    /// Never fails: errors are logged and reflected in the summary.
    pub async fn update_playlist(&self, new_songs: Option<Vec<CandidateSong>>) -> RunSummary {
        let mut summary = RunSummary::default();
        match self.run_stages(new_songs, &mut summary).await {
            Ok(()) => summary.completed = true,
            Err(e) => error!("Playlist update aborted: {}", e),
        }
        tracing::info!(
            provider = self.provider.name(),
            kept = summary.kept,
            expired = summary.expired,
            removed = summary.removed,
            candidates = summary.candidates,
            resolved = summary.resolved,
            added = summary.added,
            completed = summary.completed,
            "Playlist update finished"
        );
        summary
    }

    async fn run_stages(
        &self,
        new_songs: Option<Vec<CandidateSong>>,
        summary: &mut RunSummary,
    ) -> Result<(), SyncError> {
        let provider = self.provider.as_ref();
        let token = provider.request_access_token().await?;

        let snapshot = read_playlist(provider, &token, self.cfg.retention_ms, Utc::now()).await?;
        summary.kept = snapshot.kept.len();
        summary.expired = snapshot.expired.len();
        info!(
            "Read {} pages: {} tracks kept, {} expired",
            snapshot.pages,
            snapshot.kept.len(),
            snapshot.expired.len()
        );

        let removal = remove_tracks(provider, &token, &snapshot.expired_uris()).await;
        summary.removed = removal.removed;

        let (mut seen_ids, mut seen_names) = dedup_sets(&snapshot, &removal.retained);

        let candidates = match new_songs {
            Some(songs) => {
                info!("Using {} caller-supplied songs; sources skipped", songs.len());
                songs
            }
            None => collect_candidates(&self.sources, &self.client, &mut seen_names).await,
        };
        summary.candidates = candidates.len();

        let resolved = resolve_tracks(provider, &token, &candidates, &mut seen_ids).await;
        summary.resolved = resolved.len();

        let uris = filter_by_release(provider, &token, resolved, self.cfg.release_cutoff).await;
        summary.added = add_tracks(provider, &token, &uris).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockCall, MockProvider};
    use crate::sources::SongSource;
    use async_trait::async_trait;
    use chrono::Duration;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    struct Reported(Vec<CandidateSong>);

    #[async_trait]
    impl SongSource for Reported {
        fn id(&self) -> &str {
            "reported"
        }
        async fn fetch_songs(&self, _client: &Client) -> Result<Vec<CandidateSong>, SyncError> {
            Ok(self.0.clone())
        }
    }

    fn config(extra: &str) -> Config {
        let s = format!(
            "refresh_token = \"r\"\nclient_id = \"c\"\nclient_secret = \"s\"\n\
             user_id = \"u\"\nplaylist_id = \"p\"\n{}",
            extra
        );
        toml::from_str(&s).unwrap()
    }

    fn position(calls: &[MockCall], pred: impl Fn(&MockCall) -> bool) -> usize {
        calls.iter().position(pred).expect("call recorded")
    }

    fn token() -> AccessToken {
        AccessToken("t".into())
    }

    fn uris(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("mock:track:{}", i)).collect()
    }

    fn provider_with_tracks(n: usize, added_at: DateTime<Utc>) -> MockProvider {
        (0..n).fold(MockProvider::new(), |p, i| {
            p.with_track(&format!("id{}", i), &format!("Song {}", i), added_at)
        })
    }

    #[tokio::test]
    async fn pagination_reads_ceil_n_over_page_size() {
        for n in [1usize, 99, 100, 101, 250] {
            let p = provider_with_tracks(n, Utc::now());
            let snap = read_playlist(&p, &token(), None, Utc::now()).await.unwrap();
            assert_eq!(snap.pages, (n + MAX_BATCH_SIZE - 1) / MAX_BATCH_SIZE, "n={}", n);
            assert_eq!(snap.kept.len() + snap.expired.len(), n);
            let offsets: Vec<usize> = p
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    MockCall::Page { offset, limit } => {
                        assert_eq!(limit, MAX_BATCH_SIZE);
                        Some(offset)
                    }
                    _ => None,
                })
                .collect();
            let expected: Vec<usize> = (0..snap.pages).map(|i| i * MAX_BATCH_SIZE).collect();
            assert_eq!(offsets, expected);
        }
    }

    #[tokio::test]
    async fn retention_splits_old_tracks() {
        let now = Utc::now();
        let p = MockProvider::new()
            .with_track("old", "Old", now - Duration::days(10))
            .with_track("new", "New", now - Duration::hours(1));
        let day_ms = 24 * 60 * 60 * 1000;
        let snap = read_playlist(&p, &token(), Some(day_ms), now).await.unwrap();
        assert_eq!(snap.expired_uris(), vec!["mock:track:old".to_string()]);
        assert_eq!(
            snap.kept,
            vec![TrackRef {
                id: Some("new".into()),
                name: "New".into(),
                uri: "mock:track:new".into(),
            }]
        );

        let snap = read_playlist(&p, &token(), None, now).await.unwrap();
        assert!(snap.expired.is_empty());
        assert_eq!(snap.kept.len(), 2);
    }

    #[tokio::test]
    async fn page_failure_is_fatal_fetch_error() {
        let p = provider_with_tracks(3, Utc::now()).failing_pages();
        let err = read_playlist(&p, &token(), None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(_)));
    }

    #[tokio::test]
    async fn batches_never_exceed_limit() {
        for m in [0usize, 1, 100, 101, 350] {
            let p = MockProvider::new();
            let added = add_tracks(&p, &token(), &uris(m)).await;
            assert_eq!(added, m);
            let sizes: Vec<usize> = p
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    MockCall::Add(n) => Some(n),
                    _ => None,
                })
                .collect();
            assert_eq!(sizes.len(), (m + MAX_BATCH_SIZE - 1) / MAX_BATCH_SIZE);
            assert!(sizes.iter().all(|&n| n <= MAX_BATCH_SIZE));
        }
    }

    #[tokio::test]
    async fn failed_batch_is_not_counted_and_later_batches_continue() {
        let p = MockProvider::new().failing_add_batch(0);
        let added = add_tracks(&p, &token(), &uris(150)).await;
        assert_eq!(added, 50);
        assert_eq!(p.calls(), vec![MockCall::Add(100), MockCall::Add(50)]);

        let p = provider_with_tracks(250, Utc::now()).failing_remove_batch(1);
        let removal = remove_tracks(&p, &token(), &uris(250)).await;
        assert_eq!(removal.removed, 150);
        assert_eq!(removal.retained, uris(250)[100..200].to_vec());
        assert_eq!(
            p.calls(),
            vec![MockCall::Remove(100), MockCall::Remove(100), MockCall::Remove(50)]
        );
    }

    #[tokio::test]
    async fn resolver_sanitizes_and_dedups_ids() {
        let p = MockProvider::new()
            .with_catalog_entry("song b", "artist", "b", None)
            .with_catalog_entry("song b remix", "artist ", "b", None)
            .with_catalog_entry("present", "artist", "p", None);
        let mut seen = TrackIdSet::new();
        seen.insert("p");
        let candidates = vec![
            CandidateSong::new("Song B (Radio Edit)", "Artist"),
            CandidateSong::new("Nothing", "Nobody"),
            CandidateSong::new("Song B Remix", "Artist feat. Guest"),
            CandidateSong::new("Present", "Artist"),
        ];
        let resolved = resolve_tracks(&p, &token(), &candidates, &mut seen).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "b");
        assert!(seen.contains("b"));
        assert!(p.calls().contains(&MockCall::Search {
            name: "song b".into(),
            artist: "artist".into()
        }));
    }

    #[tokio::test]
    async fn release_filter_applies_cutoff() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let p = MockProvider::new()
            .with_album("old", Some(d(2019, 6, 1)))
            .with_album("new", Some(d(2021, 1, 1)))
            .with_album("undated", None)
            .failing_album("broken");
        let song = |id: &str, album: Option<&str>| ResolvedSong {
            uri: format!("mock:track:{}", id),
            id: id.to_string(),
            album: album.map(|a| crate::models::AlbumRef { id: a.to_string() }),
        };
        let songs = vec![
            song("1", Some("old")),
            song("2", Some("new")),
            song("3", None),
            song("4", Some("undated")),
            song("5", Some("broken")),
        ];

        let kept = filter_by_release(&p, &token(), songs.clone(), Some(d(2020, 1, 1))).await;
        assert_eq!(kept, vec!["mock:track:2", "mock:track:3", "mock:track:4"]);

        let all = filter_by_release(&p, &token(), songs, None).await;
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn local_track_name_blocks_reported_song() {
        let p = MockProvider::new().with_local_track("Song A", Utc::now());
        let snap = read_playlist(&p, &token(), None, Utc::now()).await.unwrap();
        assert_eq!(snap.kept.len(), 1);
        assert_eq!(snap.kept[0].id, None);

        let (ids, mut names) = dedup_sets(&snap, &[]);
        assert!(ids.is_empty());
        let sources = vec![Reported(vec![
            CandidateSong::new("Song A", "X"),
            CandidateSong::new("Song B", "Y"),
        ])];
        let out = collect_candidates(&sources, &Client::new(), &mut names).await;
        assert_eq!(out, vec![CandidateSong::new("Song B", "Y")]);
    }

    #[tokio::test]
    async fn expired_track_stays_in_dedup_sets_when_removal_fails() {
        let now = Utc::now();
        let p = MockProvider::new()
            .with_track("x", "Song X", now - Duration::days(10))
            .failing_remove_batch(0);
        let snap = read_playlist(&p, &token(), Some(DAY_MS), now).await.unwrap();
        let removal = remove_tracks(&p, &token(), &snap.expired_uris()).await;
        assert_eq!(removal.retained, vec!["mock:track:x".to_string()]);

        let (ids, names) = dedup_sets(&snap, &removal.retained);
        assert!(ids.contains("x"));
        assert!(names.contains("song x"));

        let (ids, names) = dedup_sets(&snap, &[]);
        assert!(ids.is_empty());
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn update_prunes_before_resolving_and_adding() {
        let now = Utc::now();
        let p = Arc::new(
            MockProvider::new()
                .with_track("old", "Old", now - Duration::days(10))
                .with_track("keep", "Keep", now - Duration::hours(1))
                .with_catalog_entry("fresh", "artist", "fresh", None),
        );
        let cfg = config(&format!("retention_ms = {}\n", DAY_MS));
        let updater = Updater::with_parts(cfg, p.clone(), Vec::new());

        let summary = updater
            .update_playlist(Some(vec![CandidateSong::new("Fresh", "Artist")]))
            .await;

        assert_eq!(
            summary,
            RunSummary {
                kept: 1,
                expired: 1,
                removed: 1,
                candidates: 1,
                resolved: 1,
                added: 1,
                completed: true,
            }
        );
        let calls = p.calls();
        assert_eq!(calls[0], MockCall::Token);
        let remove = position(&calls, |c| matches!(c, MockCall::Remove(_)));
        let search = position(&calls, |c| matches!(c, MockCall::Search { .. }));
        let add = position(&calls, |c| matches!(c, MockCall::Add(_)));
        assert!(remove < search && search < add, "{:?}", calls);
        assert_eq!(p.playlist_uris(), vec!["mock:track:keep", "mock:track:fresh"]);
    }

    #[tokio::test]
    async fn update_does_not_re_add_track_whose_removal_failed() {
        let now = Utc::now();
        let p = Arc::new(
            MockProvider::new()
                .with_track("x", "Song X", now - Duration::days(10))
                .with_catalog_entry("song x", "artist", "x", None)
                .failing_remove_batch(0),
        );
        let cfg = config(&format!("retention_ms = {}\n", DAY_MS));
        let updater = Updater::with_parts(cfg, p.clone(), Vec::new());

        let summary = updater
            .update_playlist(Some(vec![CandidateSong::new("Song X", "Artist")]))
            .await;

        assert!(summary.completed);
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.added, 0);
        assert!(!p.calls().iter().any(|c| matches!(c, MockCall::Add(_))));
        assert_eq!(p.playlist_uris(), vec!["mock:track:x"]);
    }
}
