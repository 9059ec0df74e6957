use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, eyre};
use html_parser::{Dom, Element, Node};
use reqwest::Client;

use crate::ports::radio::{ChannelTrackList, RadioSource, ScrapedTrack};

const SOMAFM_URL: &str = "https://somafm.com";

/// Cells in a song row: played at, artist, track, album, album art link.
const SONG_ROW_CELLS: usize = 5;

fn song_history_url(channel: &str) -> String {
    format!(
        "{SOMAFM_URL}/{}/songhistory.html",
        urlencoding::encode(channel)
    )
}

/// Scrapes the public "recently played" page of a SomaFM channel.
pub struct SomaFmSource {
    client: Client,
}

impl SomaFmSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for SomaFmSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RadioSource for SomaFmSource {
    async fn fetch(&self, channel: &str) -> Result<ChannelTrackList> {
        let url = song_history_url(channel);
        tracing::debug!(%url, "Fetching song history");
        let body = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .wrap_err(format!("Failed to request {url}"))?
            .error_for_status()?
            .text()
            .await
            .wrap_err(format!("Failed to read body of {url}"))?;

        parse_song_history(channel, &body)
    }
}

/// Extract the channel title and the played tracks from a song history page.
pub fn parse_song_history(channel: &str, html: &str) -> Result<ChannelTrackList> {
    let dom = Dom::parse(html).wrap_err("Failed to parse song history page")?;

    let channel_block = find_by_id(&dom.children, "channelblock")
        .ok_or_else(|| eyre!("No channelblock element on the song history page of {channel}"))?;
    let heading = find_elements(&channel_block.children, "h1")
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("No channel title on the song history page of {channel}"))?;
    let title = text_of(heading);

    let playlist_block = find_by_id(&dom.children, "playinc")
        .ok_or_else(|| eyre!("No playinc element on the song history page of {channel}"))?;
    let table = find_elements(&playlist_block.children, "table")
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("No song table on the song history page of {channel}"))?;

    let tracks = find_elements(&table.children, "tr")
        .into_iter()
        // header
        .skip(1)
        .filter_map(|row| {
            let cells = find_elements(&row.children, "td");
            if cells.len() != SONG_ROW_CELLS {
                return None;
            }
            Some(ScrapedTrack {
                channel: channel.to_string(),
                artist: text_of(cells[1]),
                track_title: text_of(cells[2]),
                album_title: text_of(cells[3]),
            })
        })
        .collect();

    Ok(ChannelTrackList {
        channel: channel.to_string(),
        title,
        tracks,
    })
}

/// Depth-first search for the element with the given id.
fn find_by_id<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(element) => {
            if element.id.as_deref() == Some(id) {
                Some(element)
            } else {
                find_by_id(&element.children, id)
            }
        }
        Node::Text(_) | Node::Comment(_) => None,
    })
}

/// All elements with the given tag name, in document order. Matches are not
/// searched for nested matches.
fn find_elements<'a>(nodes: &'a [Node], name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_elements(nodes, name, &mut found);
    found
}

fn collect_elements<'a>(nodes: &'a [Node], name: &str, found: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.name.eq_ignore_ascii_case(name) {
                found.push(element);
            } else {
                collect_elements(&element.children, name, found);
            }
        }
    }
}

/// Trimmed, entity-decoded text content of an element.
fn text_of(element: &Element) -> String {
    let mut text = String::new();
    push_text(&element.children, &mut text);
    decode_entities(&text).trim().to_string()
}

fn push_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(value) => text.push_str(value),
            Node::Element(element) => push_text(&element.children, text),
            Node::Comment(_) => {}
        }
    }
}

fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        rest = &rest[start..];

        let entity = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match entity {
            Some((character, end)) => {
                decoded.push(character);
                rest = &rest[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG_HISTORY: &str = r#"<!DOCTYPE html>
<html>
<head><title>SomaFM: Groove Salad: Recently Played Songs</title></head>
<body>
<div id="channelblock">
  <img src="/img/groovesalad120.png" alt="Groove Salad" />
  <h1> Groove Salad </h1>
  <p>A nicely chilled plate of ambient beats and grooves.</p>
</div>
<div id="playinc">
  <table>
    <tr><th>Played At</th><th>Artist</th><th>Song</th><th>Album</th><th></th></tr>
    <tr>
      <td>12:31:07&nbsp; (Now)</td>
      <td><a href="/buy/artist/Bonobo">Bonobo</a></td>
      <td>Kiara</td>
      <td>Black Sands</td>
      <td><a href="/buy/album">Buy</a></td>
    </tr>
    <tr><td colspan="5">Break / Station ID</td></tr>
    <tr>
      <td>12:25:44</td>
      <td>Simon &amp; Garfunkel</td>
      <td>Don&#39;t Know</td>
      <td>  Bookends &#x26; More  </td>
      <td></td>
    </tr>
  </table>
</div>
</body>
</html>"#;

    #[test]
    fn test_song_history_url() {
        assert_eq!(
            song_history_url("groovesalad"),
            "https://somafm.com/groovesalad/songhistory.html"
        );
    }

    #[test]
    fn test_parse_song_history() {
        let list = parse_song_history("groovesalad", SONG_HISTORY).unwrap();

        assert_eq!(list.channel, "groovesalad");
        assert_eq!(list.title, "Groove Salad");
        assert_eq!(
            list.tracks,
            vec![
                ScrapedTrack {
                    channel: "groovesalad".to_string(),
                    artist: "Bonobo".to_string(),
                    track_title: "Kiara".to_string(),
                    album_title: "Black Sands".to_string(),
                },
                ScrapedTrack {
                    channel: "groovesalad".to_string(),
                    artist: "Simon & Garfunkel".to_string(),
                    track_title: "Don't Know".to_string(),
                    album_title: "Bookends & More".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_history() {
        let html = r#"<html><body>
<div id="channelblock"><h1>Drone Zone</h1></div>
<div id="playinc"><table><tr><th>Played At</th></tr></table></div>
</body></html>"#;

        let list = parse_song_history("dronezone", html).unwrap();
        assert_eq!(list.title, "Drone Zone");
        assert!(list.tracks.is_empty());
    }

    #[test]
    fn test_parse_page_without_table_fails() {
        let html = r#"<html><body><div id="channelblock"><h1>Drone Zone</h1></div></body></html>"#;

        let error = parse_song_history("dronezone", html).unwrap_err();
        assert!(error.to_string().contains("playinc"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&lt;3 &#233;t&#xE9;"), "<3 été");
        assert_eq!(decode_entities("R&B"), "R&B");
        assert_eq!(decode_entities("fish & chips; peas"), "fish & chips; peas");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }
}
