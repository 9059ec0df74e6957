use color_eyre::eyre::Result;

/// One row of a channel's recently-played history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedTrack {
    pub channel: String,
    pub artist: String,
    pub track_title: String,
    pub album_title: String,
}

/// The recently-played list of a single channel, as scraped.
#[derive(Debug, Clone)]
pub struct ChannelTrackList {
    pub channel: String,
    /// Display title of the channel, e.g. "Groove Salad".
    pub title: String,
    pub tracks: Vec<ScrapedTrack>,
}

/// Port trait for the radio station history source.
///
/// Production implementation lives in `somafm`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RadioSource: Send + Sync {
    async fn fetch(&self, channel: &str) -> Result<ChannelTrackList>;
}
