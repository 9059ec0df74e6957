use std::sync::Mutex;
use std::time::Duration;

use crate::ports::catalog::{CandidateAlbum, TargetPlaylist};
use crate::ports::clock::Clock;
use crate::ports::radio::{ChannelTrackList, ScrapedTrack};

pub fn scraped_track(artist: &str, album: &str) -> ScrapedTrack {
    ScrapedTrack {
        channel: "groovesalad".to_string(),
        artist: artist.to_string(),
        track_title: format!("A track from {album}"),
        album_title: album.to_string(),
    }
}

pub fn candidate(id: &str, name: &str, artists: &[&str], release_date: &str) -> CandidateAlbum {
    CandidateAlbum {
        id: id.to_string(),
        name: name.to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        release_date: release_date.to_string(),
    }
}

pub fn track_list(channel: &str, title: &str, tracks: &[(&str, &str)]) -> ChannelTrackList {
    ChannelTrackList {
        channel: channel.to_string(),
        title: title.to_string(),
        tracks: tracks
            .iter()
            .map(|(artist, album)| ScrapedTrack {
                channel: channel.to_string(),
                ..scraped_track(artist, album)
            })
            .collect(),
    }
}

pub fn playlist(id: &str, name: &str) -> TargetPlaylist {
    TargetPlaylist {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// A clock that never waits and remembers every requested sleep.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
