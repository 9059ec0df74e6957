use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::mapping::MatchCache;
use crate::matching::resolve_album;
use crate::ports::catalog::{CatalogClient, TargetPlaylist};
use crate::ports::clock::Clock;
use crate::ports::radio::{RadioSource, ScrapedTrack};
use crate::services::playlist_tracks::PlaylistTrackSet;
use crate::services::retry::{RetrySettings, is_retryable};

pub fn playlist_name(channel_title: &str) -> String {
    format!("SomaFM {channel_title} Albums")
}

pub fn playlist_description(channel_title: &str) -> String {
    format!("All tracks from albums played on the SomaFM {channel_title} channel.")
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Channel ids, processed in this order
    pub channels: Vec<String>,
    pub mapping_path: PathBuf,
    /// Pause before every catalog search
    pub search_delay: Duration,
    pub retry: RetrySettings,
}

/// What happened to one channel during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub scraped: usize,
    /// Tracks whose album was not in the mapping yet
    pub new: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Resolved only by falling back to the first search result
    pub ambiguous: usize,
    pub tracks_added: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub channels: Vec<ChannelReport>,
}

impl CycleReport {
    pub fn tracks_added(&self) -> usize {
        self.channels.iter().map(|c| c.tracks_added).sum()
    }

    pub fn log(&self) {
        for channel in &self.channels {
            tracing::info!(
                channel = %channel.channel,
                scraped = channel.scraped,
                new = channel.new,
                resolved = channel.resolved,
                unresolved = channel.unresolved,
                ambiguous = channel.ambiguous,
                tracks_added = channel.tracks_added,
                "Channel summary",
            );
        }
        tracing::info!(
            channels = self.channels.len(),
            tracks_added = self.tracks_added(),
            "Sync cycle complete",
        );
    }
}

/// State that lives for exactly one cycle.
struct CycleContext {
    mapping: MatchCache,
    /// The user's playlists by name, listed on first use
    playlists: Option<HashMap<String, TargetPlaylist>>,
    track_sets: PlaylistTrackSet,
}

impl CycleContext {
    fn new(mapping: MatchCache) -> Self {
        Self {
            mapping,
            playlists: None,
            track_sets: PlaylistTrackSet::new(),
        }
    }

    /// Find the channel's playlist by name, creating it if missing.
    async fn playlist_for<C: CatalogClient + ?Sized>(
        &mut self,
        catalog: &C,
        channel_title: &str,
    ) -> Result<TargetPlaylist> {
        if self.playlists.is_none() {
            let listed = catalog
                .list_playlists()
                .await
                .wrap_err("Failed to list playlists")?;
            tracing::info!(playlists = listed.len(), "Listed playlists");
            self.playlists = Some(
                listed
                    .into_iter()
                    .map(|playlist| (playlist.name.clone(), playlist))
                    .collect(),
            );
        }
        let playlists = self.playlists.get_or_insert_with(HashMap::new);

        let name = playlist_name(channel_title);
        if let Some(existing) = playlists.get(&name) {
            tracing::info!(playlist = %existing.name, id = %existing.id, "Using playlist");
            return Ok(existing.clone());
        }

        let created = catalog
            .create_playlist(&name, &playlist_description(channel_title))
            .await
            .wrap_err(format!("Failed to create playlist '{name}'"))?;
        tracing::info!(playlist = %created.name, id = %created.id, "Created playlist");
        playlists.insert(name, created.clone());
        Ok(created)
    }
}

/// Runs sync cycles: scrape each channel, resolve new albums, add their tracks.
pub struct SyncService<C: CatalogClient, R: RadioSource> {
    catalog: C,
    radio: R,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
}

impl<C: CatalogClient, R: RadioSource> SyncService<C, R> {
    pub fn new(catalog: C, radio: R, clock: Arc<dyn Clock>, settings: SyncSettings) -> Self {
        Self {
            catalog,
            radio,
            clock,
            settings,
        }
    }

    /// One full pass over every configured channel.
    ///
    /// The mapping file is read at the start and written once at the end; a
    /// failed cycle leaves it untouched.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mapping = MatchCache::load(&self.settings.mapping_path)?;
        let mut context = CycleContext::new(mapping);
        let mut report = CycleReport::default();

        for channel in &self.settings.channels {
            let channel_report = self.sync_channel_with_retry(&mut context, channel).await?;
            report.channels.push(channel_report);
        }

        context.mapping.save(&self.settings.mapping_path)?;
        Ok(report)
    }

    async fn sync_channel_with_retry(
        &self,
        context: &mut CycleContext,
        channel: &str,
    ) -> Result<ChannelReport> {
        // Shared by all attempts: work recorded before a failure still counts.
        let mut report = ChannelReport {
            channel: channel.to_string(),
            ..Default::default()
        };
        let mut backoff = self.settings.retry.backoff();
        loop {
            match self.sync_channel(context, channel, &mut report).await {
                Ok(()) => return Ok(report),
                Err(error) if is_retryable(&error) => match backoff.next() {
                    Some(delay) => {
                        tracing::warn!(
                            channel,
                            error = %error,
                            delay_secs = delay.as_secs_f64(),
                            "Transient failure, retrying channel",
                        );
                        self.clock.sleep(delay).await;
                    }
                    None => {
                        return Err(error.wrap_err(format!("Giving up on channel {channel}")));
                    }
                },
                Err(error) => return Err(error),
            }
        }
    }

    async fn sync_channel(
        &self,
        context: &mut CycleContext,
        channel: &str,
        report: &mut ChannelReport,
    ) -> Result<()> {
        let history = self
            .radio
            .fetch(channel)
            .await
            .wrap_err(format!("Failed to fetch history of channel {channel}"))?;
        tracing::info!(
            channel = %history.channel,
            title = %history.title,
            tracks = history.tracks.len(),
            "Fetched channel history",
        );
        report.scraped = history.tracks.len();

        let new_tracks: Vec<ScrapedTrack> = history
            .tracks
            .into_iter()
            .filter(|track| !context.mapping.is_known(channel, track))
            .collect();
        // A retry sees fewer new tracks than the first attempt did.
        report.new = report.new.max(new_tracks.len());
        tracing::info!(
            channel,
            new = new_tracks.len(),
            known_misses = context.mapping.unmatched_count(channel),
            "Filtered known albums",
        );

        if new_tracks.is_empty() {
            return Ok(());
        }

        let playlist = context.playlist_for(&self.catalog, &history.title).await?;

        for track in &new_tracks {
            // The history often lists several songs from one album.
            if let Some(album_id) = context.mapping.lookup(channel, track) {
                tracing::debug!(
                    artist = %track.artist,
                    album = %track.album_title,
                    album_id = ?album_id,
                    "Album already resolved this cycle",
                );
                continue;
            }

            self.clock.sleep(self.settings.search_delay).await;
            tracing::info!(
                track = %track.track_title,
                album = %track.album_title,
                artist = %track.artist,
                "Searching catalog",
            );
            let candidates = self
                .catalog
                .search_albums(&track.album_title, &track.artist)
                .await
                .wrap_err(format!(
                    "Failed to search for '{}' by '{}'",
                    track.album_title, track.artist
                ))?;

            match resolve_album(track, &candidates) {
                Some(resolution) => {
                    tracing::info!(
                        album = %resolution.album.name,
                        artists = ?resolution.album.artists,
                        resolved_by = ?resolution.resolved_by,
                        candidates = candidates.len(),
                        "Resolved album",
                    );
                    if resolution.is_ambiguous() {
                        report.ambiguous += 1;
                    }

                    let added = context
                        .track_sets
                        .add_album(&self.catalog, &resolution.album.id, &playlist)
                        .await?;
                    if added > 0 {
                        tracing::info!(
                            playlist = %playlist.name,
                            album = %resolution.album.name,
                            tracks = added,
                            "Added album to playlist",
                        );
                    }

                    report.resolved += 1;
                    report.tracks_added += added;
                    context
                        .mapping
                        .record(channel, track, Some(&resolution.album.id));
                }
                None => {
                    tracing::info!(
                        album = %track.album_title,
                        artist = %track.artist,
                        "No album found",
                    );
                    report.unresolved += 1;
                    context.mapping.record(channel, track, None);
                }
            }
        }

        Ok(())
    }
}
