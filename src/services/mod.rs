pub mod playlist_tracks;
pub mod retry;
pub mod scheduler;
pub mod spotify;
pub mod sync;
