use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ports::radio::ScrapedTrack;

/// `"{artist} - {album}"` -> album id, or `None` for a confirmed miss.
pub type ChannelMapping = BTreeMap<String, Option<String>>;

/// Persisted record of every (channel, artist, album) that has been resolved.
///
/// On disk it is a JSON document keyed by channel id, then by
/// `"{artist} - {album}"`. A `null` value is a permanent negative entry: the
/// catalog had nothing for that album and it is never searched again unless
/// the file is edited by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchCache {
    channels: BTreeMap<String, ChannelMapping>,
}

impl MatchCache {
    pub fn key(track: &ScrapedTrack) -> String {
        format!("{} - {}", track.artist, track.album_title)
    }

    /// Load the mapping file, starting empty if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No mapping file yet, starting empty");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read mapping file: {}", path.display()))?;
        let cache: MatchCache = serde_json::from_str(&contents)
            .wrap_err(format!("Failed to parse mapping file: {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            channels = cache.channels.len(),
            entries = cache.entry_count(),
            "Loaded mapping file",
        );
        Ok(cache)
    }

    /// Write the whole mapping file, replacing the previous one atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)
            .wrap_err(format!("Failed to create directory: {}", directory.display()))?;

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .wrap_err("Failed to serialize mapping")?;

        let mut file = tempfile::NamedTempFile::new_in(directory)
            .wrap_err("Failed to create temporary mapping file")?;
        file.write_all(&buffer)
            .wrap_err("Failed to write temporary mapping file")?;
        file.persist(path)
            .wrap_err(format!("Failed to replace mapping file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), entries = self.entry_count(), "Saved mapping file");
        Ok(())
    }

    /// Whether the track's album already has an entry (positive or negative).
    pub fn is_known(&self, channel: &str, track: &ScrapedTrack) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|mapping| mapping.contains_key(&Self::key(track)))
    }

    /// The recorded album id. `Some(None)` is a negative entry, `None` unknown.
    pub fn lookup(&self, channel: &str, track: &ScrapedTrack) -> Option<Option<&str>> {
        self.channels
            .get(channel)?
            .get(&Self::key(track))
            .map(|album_id| album_id.as_deref())
    }

    pub fn record(&mut self, channel: &str, track: &ScrapedTrack, album_id: Option<&str>) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(Self::key(track), album_id.map(str::to_string));
    }

    pub fn channel(&self, channel: &str) -> Option<&ChannelMapping> {
        self.channels.get(channel)
    }

    /// Total number of entries across all channels.
    pub fn entry_count(&self) -> usize {
        self.channels.values().map(BTreeMap::len).sum()
    }

    /// Count of negative entries for a channel.
    pub fn unmatched_count(&self, channel: &str) -> usize {
        self.channel(channel)
            .map(|mapping| mapping.values().filter(|v| v.is_none()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::scraped_track;

    #[test]
    fn test_key_format() {
        let track = scraped_track("Bonobo", "Black Sands");
        assert_eq!(MatchCache::key(&track), "Bonobo - Black Sands");
    }

    #[test]
    fn test_record_and_is_known() {
        let mut cache = MatchCache::default();
        let track = scraped_track("Bonobo", "Black Sands");

        assert!(!cache.is_known("groovesalad", &track));
        cache.record("groovesalad", &track, Some("album1"));

        assert!(cache.is_known("groovesalad", &track));
        assert!(!cache.is_known("dronezone", &track));
        assert_eq!(cache.lookup("groovesalad", &track), Some(Some("album1")));
    }

    #[test]
    fn test_negative_entry_is_known() {
        let mut cache = MatchCache::default();
        let track = scraped_track("Nobody", "Nothing");

        cache.record("lush", &track, None);

        assert!(cache.is_known("lush", &track));
        assert_eq!(cache.lookup("lush", &track), Some(None));
        assert_eq!(cache.unmatched_count("lush"), 1);
    }

    #[test]
    fn test_same_album_different_songs_share_key() {
        let mut cache = MatchCache::default();
        let first = scraped_track("Bonobo", "Black Sands");
        let second = ScrapedTrack {
            track_title: "Kiara".to_string(),
            ..first.clone()
        };

        cache.record("groovesalad", &first, Some("album1"));
        assert!(cache.is_known("groovesalad", &second));
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut cache = MatchCache::default();
        let track = scraped_track("Bonobo", "Black Sands");

        cache.record("groovesalad", &track, Some("album1"));
        let snapshot = cache.clone();
        cache.record("groovesalad", &track, Some("album1"));

        assert_eq!(cache, snapshot);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");

        let mut cache = MatchCache::default();
        cache.record("groovesalad", &scraped_track("Bonobo", "Black Sands"), Some("a1"));
        cache.record("groovesalad", &scraped_track("Nobody", "Nothing"), None);
        cache.record("dronezone", &scraped_track("Stars of the Lid", "Tired Sounds"), Some("a2"));

        cache.save(&path).unwrap();
        let loaded = MatchCache::load(&path).unwrap();

        assert_eq!(loaded, cache);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");

        let mut cache = MatchCache::default();
        cache.record("lush", &scraped_track("Nobody", "Nothing"), None);
        cache.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "lush": { "Nobody - Nothing": null } }));
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n    \"lush\""));
    }

    #[test]
    fn test_load_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(
            &path,
            r#"{ "fluid": { "Bonobo - Black Sands": "abc", "Nobody - Nothing": null } }"#,
        )
        .unwrap();

        let cache = MatchCache::load(&path).unwrap();
        assert_eq!(cache.entry_count(), 2);
        assert!(cache.is_known("fluid", &scraped_track("Bonobo", "Black Sands")));
        assert_eq!(cache.unmatched_count("fluid"), 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MatchCache::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, "not json").unwrap();

        let result = MatchCache::load(&path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse mapping file")
        );
    }
}
