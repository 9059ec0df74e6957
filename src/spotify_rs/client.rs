use std::time::Duration;

use color_eyre::Result;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::spotify_rs::types::{
    SpotifyAlbum, SpotifyAlbumSearchResponse, SpotifyPage, SpotifyPlaylist, SpotifyPlaylistItem,
    SpotifySnapshot, SpotifyTrackRef, SpotifyUser,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Most track uris Spotify accepts in one playlist insert.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum SpotifyApiError {
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Rate limited by Spotify (retry after {retry_after:?} seconds)")]
    RateLimited { retry_after: Option<u64> },
    #[error("Spotify returned {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

impl SpotifyApiError {
    /// Whether repeating the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpotifyApiError::FailedToSendRequest(error) => error.is_timeout() || error.is_connect(),
            SpotifyApiError::RateLimited { .. } => true,
            SpotifyApiError::UnexpectedStatus { status, .. } => status.is_server_error(),
            SpotifyApiError::FailedToParseResponse(_) => false,
        }
    }
}

/// Spotify API client
#[derive(Clone)]
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SpotifyApiError> {
        let response = request
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(SpotifyApiError::FailedToSendRequest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(SpotifyApiError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(SpotifyApiError::UnexpectedStatus {
                status,
                body: response
                    .text()
                    .await
                    .unwrap_or("Failed to get error text".to_string()),
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SpotifyApiError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(SpotifyApiError::FailedToParseResponse)
    }

    /// Follow `next` links until the listing is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            let page: SpotifyPage<T> = self.send_json(self.client.get(&url)).await?;
            items.extend(page.items);
            next_url = page.next;
        }

        Ok(items)
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser> {
        let user = self
            .send_json(self.client.get(format!("{SPOTIFY_API_URL}/me")))
            .await?;
        Ok(user)
    }

    /// Search albums with an `album:` / `artist:` field query (first page only)
    pub async fn search_albums(&self, album: &str, artist: &str) -> Result<Vec<SpotifyAlbum>> {
        let query = format!("album:{album} artist:{artist}");
        let response: SpotifyAlbumSearchResponse = self
            .send_json(
                self.client
                    .get(format!("{SPOTIFY_API_URL}/search"))
                    .query(&[("q", query.as_str()), ("type", "album")]),
            )
            .await?;
        Ok(response.albums.items)
    }

    /// Get all tracks of an album, in album order
    pub async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<SpotifyTrackRef>> {
        self.get_all_pages(format!(
            "{SPOTIFY_API_URL}/albums/{}/tracks?limit=50",
            urlencoding::encode(album_id)
        ))
        .await
    }

    /// Get all playlists for the current user
    pub async fn get_user_playlists(&self) -> Result<Vec<SpotifyPlaylist>> {
        self.get_all_pages(format!("{SPOTIFY_API_URL}/me/playlists?limit=50"))
            .await
    }

    /// Get all items in a playlist
    pub async fn get_playlist_items(&self, playlist_id: &str) -> Result<Vec<SpotifyPlaylistItem>> {
        self.get_all_pages(format!(
            "{SPOTIFY_API_URL}/playlists/{}/tracks?limit=100&fields=items(track(id)),next",
            urlencoding::encode(playlist_id)
        ))
        .await
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<SpotifyPlaylist> {
        let playlist = self
            .send_json(
                self.client
                    .post(format!(
                        "{SPOTIFY_API_URL}/users/{}/playlists",
                        urlencoding::encode(user_id)
                    ))
                    .json(&json!({
                        "name": name,
                        "description": description,
                        "public": public,
                    })),
            )
            .await?;
        Ok(playlist)
    }

    /// Insert tracks at `position`. At most `MAX_TRACKS_PER_REQUEST` ids.
    pub async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        position: usize,
    ) -> Result<String> {
        let uris: Vec<String> = track_ids
            .iter()
            .map(|id| format!("spotify:track:{id}"))
            .collect();
        let snapshot: SpotifySnapshot = self
            .send_json(
                self.client
                    .post(format!(
                        "{SPOTIFY_API_URL}/playlists/{}/tracks",
                        urlencoding::encode(playlist_id)
                    ))
                    .json(&json!({ "uris": uris, "position": position })),
            )
            .await?;
        Ok(snapshot.snapshot_id)
    }
}
