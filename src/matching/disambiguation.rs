use chrono::NaiveDate;

use crate::matching::edit_distance::distance;
use crate::matching::release_date::parse_release_date;
use crate::ports::catalog::CandidateAlbum;
use crate::ports::radio::ScrapedTrack;

/// The filter stage that settled on the returned album.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    /// The search returned exactly one album
    OnlyCandidate,
    /// Closest artist name
    ArtistDistance,
    /// Closest album title among the closest artists
    AlbumDistance,
    /// Most recent release among the remaining ties
    ReleaseDate,
    /// Nothing separated the candidates, the first one in search order wins
    FirstResult,
}

/// The album picked for a scraped track.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub album: &'a CandidateAlbum,
    pub resolved_by: ResolvedBy,
}

impl Resolution<'_> {
    /// A low-confidence pick that should be reviewed by hand.
    pub fn is_ambiguous(&self) -> bool {
        self.resolved_by == ResolvedBy::FirstResult
    }
}

/// A candidate plus the scores computed for it so far.
///
/// Scores are filled in stage by stage, so a later score is only computed for
/// candidates that survived the earlier stages.
#[derive(Debug, Clone)]
struct ScoredCandidate<'a> {
    album: &'a CandidateAlbum,
    artist_distance: usize,
    name_distance: usize,
    release_date: Option<NaiveDate>,
}

impl<'a> ScoredCandidate<'a> {
    fn new(album: &'a CandidateAlbum) -> Self {
        Self {
            album,
            artist_distance: 0,
            name_distance: 0,
            release_date: None,
        }
    }
}

/// Narrows the search results for `track` down to one album.
///
/// Stages run in order and each one only runs while more than one candidate
/// survives: artist distance, album title distance, latest release date, and
/// finally the first remaining candidate in search order. Returns `None` only
/// when there are no candidates at all.
pub fn resolve_album<'a>(
    track: &ScrapedTrack,
    candidates: &'a [CandidateAlbum],
) -> Option<Resolution<'a>> {
    match candidates {
        [] => return None,
        [only] => {
            return Some(Resolution {
                album: only,
                resolved_by: ResolvedBy::OnlyCandidate,
            });
        }
        _ => {}
    }

    let survivors: Vec<_> = candidates.iter().map(ScoredCandidate::new).collect();

    let survivors = filter_by_artist_distance(survivors, &track.artist);
    if let Some(resolution) = single(&survivors, ResolvedBy::ArtistDistance) {
        return Some(resolution);
    }

    let survivors = filter_by_name_distance(survivors, &track.album_title);
    if let Some(resolution) = single(&survivors, ResolvedBy::AlbumDistance) {
        return Some(resolution);
    }

    let survivors = filter_by_release_date(survivors);
    if let Some(resolution) = single(&survivors, ResolvedBy::ReleaseDate) {
        return Some(resolution);
    }

    // Survivors keep the search order, so the first one ranked highest.
    let first = survivors.first()?;
    tracing::warn!(
        artist = %track.artist,
        album = %track.album_title,
        picked = %first.album.id,
        tied = ?survivors.iter().map(|c| c.album.id.as_str()).collect::<Vec<_>>(),
        "Ambiguous album match, falling back to first search result",
    );
    Some(Resolution {
        album: first.album,
        resolved_by: ResolvedBy::FirstResult,
    })
}

fn single<'a>(survivors: &[ScoredCandidate<'a>], stage: ResolvedBy) -> Option<Resolution<'a>> {
    match survivors {
        [only] => Some(Resolution {
            album: only.album,
            resolved_by: stage,
        }),
        _ => None,
    }
}

/// Keep the items whose key equals the minimum key, preserving order.
fn retain_minimum<T>(items: Vec<T>, key: impl Fn(&T) -> usize) -> Vec<T> {
    let Some(min) = items.iter().map(&key).min() else {
        return items;
    };
    items.into_iter().filter(|item| key(item) == min).collect()
}

fn filter_by_artist_distance<'a>(
    mut candidates: Vec<ScoredCandidate<'a>>,
    artist: &str,
) -> Vec<ScoredCandidate<'a>> {
    for candidate in candidates.iter_mut() {
        // An album without listed artists scores as if compared to "".
        candidate.artist_distance = candidate
            .album
            .artists
            .iter()
            .map(|name| distance(artist, name))
            .min()
            .unwrap_or_else(|| artist.chars().count());
        tracing::debug!(
            album = %candidate.album.name,
            artists = ?candidate.album.artists,
            artist_distance = candidate.artist_distance,
            "Scored candidate artist",
        );
    }
    retain_minimum(candidates, |c| c.artist_distance)
}

fn filter_by_name_distance<'a>(
    mut candidates: Vec<ScoredCandidate<'a>>,
    album_title: &str,
) -> Vec<ScoredCandidate<'a>> {
    for candidate in candidates.iter_mut() {
        candidate.name_distance = distance(&candidate.album.name, album_title);
        tracing::debug!(
            album = %candidate.album.name,
            name_distance = candidate.name_distance,
            "Scored candidate album title",
        );
    }
    retain_minimum(candidates, |c| c.name_distance)
}

/// Keep the candidates released on the latest parsed date.
///
/// A candidate whose date does not parse can never be the latest. If no date
/// parses at all the set is returned unchanged.
fn filter_by_release_date(mut candidates: Vec<ScoredCandidate<'_>>) -> Vec<ScoredCandidate<'_>> {
    for candidate in candidates.iter_mut() {
        candidate.release_date = parse_release_date(&candidate.album.release_date);
        if candidate.release_date.is_none() {
            tracing::debug!(
                album = %candidate.album.name,
                release_date = %candidate.album.release_date,
                "Unparseable release date, excluded from recency comparison",
            );
        }
    }

    let Some(latest) = candidates.iter().filter_map(|c| c.release_date).max() else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| c.release_date == Some(latest))
        .collect()
}
