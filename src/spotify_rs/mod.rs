//! Minimal Spotify Web API client: the endpoints the playlist sync uses.

pub mod auth;
pub mod client;
pub mod types;
