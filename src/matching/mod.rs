//! Picks one catalog album out of the search results for a scraped track.

pub mod disambiguation;
pub mod edit_distance;
pub mod release_date;

pub use disambiguation::resolve_album;
