use color_eyre::eyre::Result;

/// An album returned by a catalog search, decoupled from the API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAlbum {
    pub id: String,
    pub name: String,
    /// Contributing artist names, in the order the catalog lists them.
    pub artists: Vec<String>,
    /// Free-form release date text (e.g. "2015", "2015-07", "2015-07-10").
    pub release_date: String,
}

/// A playlist owned by the current catalog user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlaylist {
    pub id: String,
    pub name: String,
}

/// Port trait wrapping the catalog and playlist capabilities the sync needs.
///
/// Implementations live in `services::spotify::client` (production) or test mocks.
/// Paginated endpoints are fully enumerated by the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Search albums by title and artist, in the catalog's relevance order.
    async fn search_albums(&self, album_title: &str, artist: &str)
    -> Result<Vec<CandidateAlbum>>;

    /// Every track id of an album, in album order.
    async fn album_track_ids(&self, album_id: &str) -> Result<Vec<String>>;

    async fn list_playlists(&self) -> Result<Vec<TargetPlaylist>>;

    async fn create_playlist(&self, name: &str, description: &str) -> Result<TargetPlaylist>;

    /// Every track id currently in a playlist.
    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Insert tracks at the head of a playlist, keeping the given order.
    async fn add_tracks_at_head(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}
