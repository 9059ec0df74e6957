use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::{Mutex, OnceCell};

use crate::ports::catalog::{CandidateAlbum, CatalogClient, TargetPlaylist};
use crate::spotify_rs::auth::refresh_access_token;
use crate::spotify_rs::client::{MAX_TRACKS_PER_REQUEST, SpotifyClient};
use crate::spotify_rs::types::SpotifyAlbum;

/// Refresh this long before Spotify says the token expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

struct Session {
    client: SpotifyClient,
    expires_at: Instant,
}

/// `CatalogClient` backed by the Spotify Web API.
///
/// Holds the refresh token and swaps in a fresh access token whenever the
/// current one is about to expire, so one adapter can serve a long-running
/// process.
pub struct SpotifyCatalogAdapter {
    credentials: SpotifyApiCredentials,
    public_playlists: bool,
    session: Mutex<Option<Session>>,
    user_id: OnceCell<String>,
}

impl SpotifyCatalogAdapter {
    pub fn new(credentials: SpotifyApiCredentials, public_playlists: bool) -> Self {
        Self {
            credentials,
            public_playlists,
            session: Mutex::new(None),
            user_id: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<SpotifyClient> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref()
            && current.expires_at > Instant::now()
        {
            return Ok(current.client.clone());
        }

        let token = refresh_access_token(
            self.credentials.client_id(),
            self.credentials.client_secret(),
            self.credentials.refresh_token(),
        )
        .await
        .wrap_err("Failed to refresh Spotify access token")?;
        tracing::debug!(expires_in = token.expires_in, "Refreshed Spotify access token");

        let client = SpotifyClient::new(token.access_token);
        *session = Some(Session {
            client: client.clone(),
            expires_at: Instant::now()
                + Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(client)
    }

    async fn user_id(&self, client: &SpotifyClient) -> Result<&str> {
        let user_id = self
            .user_id
            .get_or_try_init(|| async {
                let user = client
                    .get_current_user()
                    .await
                    .wrap_err("Failed to get Spotify user")?;
                tracing::info!(user = %user.id, "Signed in to Spotify");
                Ok::<_, color_eyre::Report>(user.id)
            })
            .await?;
        Ok(user_id.as_str())
    }
}

fn to_candidate(album: SpotifyAlbum) -> CandidateAlbum {
    CandidateAlbum {
        id: album.id,
        name: album.name,
        artists: album.artists.into_iter().map(|artist| artist.name).collect(),
        release_date: album.release_date.unwrap_or_default(),
    }
}

/// Split an ordered insert into request-sized batches, last batch first.
///
/// Each batch goes in at position 0, so sending them in this order leaves
/// the playlist head in the original order.
fn head_insert_batches(track_ids: &[String]) -> Vec<&[String]> {
    track_ids.chunks(MAX_TRACKS_PER_REQUEST).rev().collect()
}

#[async_trait::async_trait]
impl CatalogClient for SpotifyCatalogAdapter {
    async fn search_albums(
        &self,
        album_title: &str,
        artist: &str,
    ) -> Result<Vec<CandidateAlbum>> {
        let albums = self
            .client()
            .await?
            .search_albums(album_title, artist)
            .await
            .wrap_err(format!("Failed to search albums for '{album_title}' by '{artist}'"))?;
        Ok(albums.into_iter().map(to_candidate).collect())
    }

    async fn album_track_ids(&self, album_id: &str) -> Result<Vec<String>> {
        let tracks = self.client().await?.get_album_tracks(album_id).await?;
        Ok(tracks.into_iter().filter_map(|track| track.id).collect())
    }

    async fn list_playlists(&self) -> Result<Vec<TargetPlaylist>> {
        let playlists = self
            .client()
            .await?
            .get_user_playlists()
            .await
            .wrap_err("Failed to list Spotify playlists")?;
        Ok(playlists
            .into_iter()
            .map(|playlist| TargetPlaylist {
                id: playlist.id,
                name: playlist.name,
            })
            .collect())
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<TargetPlaylist> {
        let client = self.client().await?;
        let user_id = self.user_id(&client).await?;
        let playlist = client
            .create_playlist(user_id, name, description, self.public_playlists)
            .await
            .wrap_err(format!("Failed to create playlist '{name}'"))?;
        Ok(TargetPlaylist {
            id: playlist.id,
            name: playlist.name,
        })
    }

    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let items = self.client().await?.get_playlist_items(playlist_id).await?;
        // Local files and removed tracks have no id.
        Ok(items
            .into_iter()
            .filter_map(|item| item.track.and_then(|track| track.id))
            .collect())
    }

    async fn add_tracks_at_head(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let client = self.client().await?;
        for batch in head_insert_batches(track_ids) {
            client.add_tracks_to_playlist(playlist_id, batch, 0).await?;
        }
        Ok(())
    }
}
