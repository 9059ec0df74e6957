use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use color_eyre::eyre::{Result, WrapErr};

use crate::ports::catalog::{CatalogClient, TargetPlaylist};

/// Track ids already present in each target playlist, fetched once per cycle.
///
/// Never reuse across cycles: the playlist may have been edited in between.
#[derive(Debug, Default)]
pub struct PlaylistTrackSet {
    cached: HashMap<String, HashSet<String>>,
}

impl PlaylistTrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ids currently in `playlist`, enumerated on first use.
    pub async fn current_track_ids<C: CatalogClient + ?Sized>(
        &mut self,
        client: &C,
        playlist: &TargetPlaylist,
    ) -> Result<&HashSet<String>> {
        let ids = match self.cached.entry(playlist.id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let ids = client
                    .playlist_track_ids(&playlist.id)
                    .await
                    .wrap_err(format!("Failed to list tracks of playlist '{}'", playlist.name))?;
                tracing::info!(
                    playlist = %playlist.name,
                    tracks = ids.len(),
                    "Fetched playlist tracks",
                );
                entry.insert(ids.into_iter().collect())
            }
        };
        Ok(ids)
    }

    /// Album tracks not yet in the playlist, in album order.
    pub async fn new_tracks<C: CatalogClient + ?Sized>(
        &mut self,
        client: &C,
        album_id: &str,
        playlist: &TargetPlaylist,
    ) -> Result<Vec<String>> {
        let album_tracks = client
            .album_track_ids(album_id)
            .await
            .wrap_err(format!("Failed to list tracks of album {album_id}"))?;
        let current = self.current_track_ids(client, playlist).await?;

        let (duplicates, new): (Vec<String>, Vec<String>) = album_tracks
            .into_iter()
            .partition(|id| current.contains(id));
        if !duplicates.is_empty() {
            tracing::info!(
                playlist = %playlist.name,
                album_id,
                duplicates = duplicates.len(),
                "Skipping album tracks already in playlist",
            );
        }
        Ok(new)
    }

    /// Insert `tracks` at the head of the playlist in one request.
    ///
    /// Does nothing for an empty list.
    pub async fn apply<C: CatalogClient + ?Sized>(
        &mut self,
        client: &C,
        playlist: &TargetPlaylist,
        tracks: Vec<String>,
    ) -> Result<usize> {
        if tracks.is_empty() {
            return Ok(0);
        }

        client
            .add_tracks_at_head(&playlist.id, &tracks)
            .await
            .wrap_err(format!("Failed to add tracks to playlist '{}'", playlist.name))?;

        let added = tracks.len();
        // A playlist never enumerated stays unknown; a partial set would hide
        // its other tracks from later dedup.
        if let Some(current) = self.cached.get_mut(&playlist.id) {
            current.extend(tracks);
        }
        Ok(added)
    }

    /// Add every track of an album that the playlist is missing.
    pub async fn add_album<C: CatalogClient + ?Sized>(
        &mut self,
        client: &C,
        album_id: &str,
        playlist: &TargetPlaylist,
    ) -> Result<usize> {
        let tracks = self.new_tracks(client, album_id, playlist).await?;
        self.apply(client, playlist, tracks).await
    }
}
