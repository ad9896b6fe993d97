//! Plex Media Server backend over its HTTP API, backed by `ureq`.
//!
//! Every request carries the X-Plex-Token and asks for JSON. Responses are
//! walked as `serde_json::Value` since we only read a handful of fields out
//! of the MediaContainer envelope.

use std::time::Duration;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::backend::{BackendError, LibrarySection, MediaBackend};
use crate::config::PlexConfig;
use crate::models::{CandidateTrack, TrackId};

/// Plex item type code for tracks in a section listing.
const TYPE_TRACK: &str = "10";

pub struct PlexBackend {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    machine_id: OnceCell<String>,
}

impl PlexBackend {
    pub fn new(config: &PlexConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(config.timeout_secs))
            .timeout_write(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            machine_id: OnceCell::new(),
        }
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        query.push(format!("X-Plex-Token={}", urlencoding::encode(&self.token)));
        format!("{}{}?{}", self.base_url, path, query.join("&"))
    }

    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, BackendError> {
        let url = self.url(path, params);
        let response = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(|err| classify(err, path))?;
        response
            .into_json()
            .map_err(|err| BackendError::Transient(format!("bad response from {path}: {err}")))
    }

    fn send(&self, method: &str, path: &str, params: &[(&str, &str)]) -> Result<(), BackendError> {
        let url = self.url(path, params);
        self.agent
            .request(method, &url)
            .set("Accept", "application/json")
            .call()
            .map(|_| ())
            .map_err(|err| classify(err, path))
    }

    /// Server machine identifier, fetched once and cached; needed to build
    /// the item URIs that playlist mutations take.
    fn machine_identifier(&self) -> Result<&str, BackendError> {
        self.machine_id
            .get_or_try_init(|| {
                let root = self.get_json("/", &[])?;
                root.get("MediaContainer")
                    .and_then(|c| c.get("machineIdentifier"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        BackendError::LibraryUnavailable(
                            "server did not report a machine identifier".to_string(),
                        )
                    })
            })
            .map(String::as_str)
    }

    /// Look a playlist up by exact title; `None` when the server has no
    /// audio playlist with that name.
    fn find_playlist(&self, playlist_name: &str) -> Result<Option<String>, BackendError> {
        let body = self.get_json("/playlists", &[("playlistType", "audio")])?;
        let found = metadata_array(&body).into_iter().find_map(|item| {
            let title = item.get("title").and_then(Value::as_str)?;
            if title == playlist_name {
                item.get("ratingKey").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        });
        Ok(found)
    }

    fn item_uri(&self, tracks: &[TrackId]) -> Result<String, BackendError> {
        let keys: Vec<&str> = tracks.iter().map(|id| id.0.as_str()).collect();
        Ok(format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            self.machine_identifier()?,
            keys.join(",")
        ))
    }
}

impl MediaBackend for PlexBackend {
    fn sections(&self) -> Result<Vec<LibrarySection>, BackendError> {
        let body = self.get_json("/library/sections", &[])?;
        let sections = body
            .get("MediaContainer")
            .and_then(|c| c.get("Directory"))
            .and_then(Value::as_array)
            .map(|dirs| {
                dirs.iter()
                    .filter(|d| d.get("type").and_then(Value::as_str) == Some("artist"))
                    .filter_map(parse_section)
                    .collect()
            })
            .unwrap_or_default();
        Ok(sections)
    }

    fn section_tracks(&self, section: &LibrarySection) -> Result<Vec<CandidateTrack>, BackendError> {
        let path = format!("/library/sections/{}/all", section.id);
        let body = self.get_json(&path, &[("type", TYPE_TRACK)])?;
        Ok(metadata_array(&body)
            .into_iter()
            .filter_map(parse_track)
            .collect())
    }

    fn playlist_track_ids(&self, playlist_name: &str) -> Result<Vec<TrackId>, BackendError> {
        // A playlist that does not exist yet simply has no tracks.
        let rating_key = match self.find_playlist(playlist_name)? {
            Some(key) => key,
            None => return Ok(Vec::new()),
        };
        let path = format!("/playlists/{rating_key}/items");
        let body = self.get_json(&path, &[])?;
        Ok(metadata_array(&body)
            .into_iter()
            .filter_map(|item| item.get("ratingKey").and_then(Value::as_str))
            .map(|key| TrackId(key.to_string()))
            .collect())
    }

    fn add_to_playlist(&self, playlist_name: &str, tracks: &[TrackId]) -> Result<(), BackendError> {
        let uri = self.item_uri(tracks)?;
        let result = match self.find_playlist(playlist_name)? {
            Some(rating_key) => {
                let path = format!("/playlists/{rating_key}/items");
                self.send("PUT", &path, &[("uri", uri.as_str())])
            }
            None => self.send(
                "POST",
                "/playlists",
                &[
                    ("type", "audio"),
                    ("smart", "0"),
                    ("title", playlist_name),
                    ("uri", uri.as_str()),
                ],
            ),
        };
        result.map_err(|err| match err {
            e @ BackendError::Transient(_) => e,
            e => BackendError::PlaylistMutation {
                playlist: playlist_name.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

/// Map a transport or HTTP error onto the retry taxonomy: timeouts, rate
/// limiting, and server errors are transient; everything else is not.
fn classify(err: ureq::Error, path: &str) -> BackendError {
    match err {
        ureq::Error::Status(code, _) if code == 408 || code == 429 || code >= 500 => {
            BackendError::Transient(format!("{path} returned HTTP {code}"))
        }
        ureq::Error::Status(404, _) => BackendError::NotFound(path.to_string()),
        ureq::Error::Status(code, _) => {
            BackendError::LibraryUnavailable(format!("{path} returned HTTP {code}"))
        }
        ureq::Error::Transport(t) => BackendError::Transient(format!("{path}: {t}")),
    }
}

fn metadata_array(body: &Value) -> Vec<&Value> {
    body.get("MediaContainer")
        .and_then(|c| c.get("Metadata"))
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn parse_section(dir: &Value) -> Option<LibrarySection> {
    Some(LibrarySection {
        id: dir.get("key").and_then(Value::as_str)?.to_string(),
        title: dir.get("title").and_then(Value::as_str)?.to_string(),
    })
}

fn parse_track(item: &Value) -> Option<CandidateTrack> {
    Some(CandidateTrack {
        id: TrackId(item.get("ratingKey").and_then(Value::as_str)?.to_string()),
        title: item.get("title").and_then(Value::as_str)?.to_string(),
        artist: item
            .get("grandparentTitle")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        album: item
            .get("parentTitle")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration_ms: item.get("duration").and_then(Value::as_i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_track_from_metadata() {
        let item = json!({
            "ratingKey": "12345",
            "title": "Yesterday",
            "grandparentTitle": "The Beatles",
            "parentTitle": "Help!",
            "duration": 125000
        });
        let track = parse_track(&item).unwrap();
        assert_eq!(track.id, TrackId("12345".into()));
        assert_eq!(track.artist, "The Beatles");
        assert_eq!(track.album.as_deref(), Some("Help!"));
        assert_eq!(track.duration_ms, Some(125000));
    }

    #[test]
    fn track_without_rating_key_is_dropped() {
        let item = json!({"title": "Yesterday"});
        assert!(parse_track(&item).is_none());
    }

    #[test]
    fn metadata_array_handles_missing_container() {
        let body = json!({"MediaContainer": {"size": 0}});
        assert!(metadata_array(&body).is_empty());
    }

    #[test]
    fn only_music_sections_survive_filtering() {
        let dirs = json!([
            {"key": "1", "title": "Movies", "type": "movie"},
            {"key": "2", "title": "Music", "type": "artist"}
        ]);
        let sections: Vec<LibrarySection> = dirs
            .as_array()
            .unwrap()
            .iter()
            .filter(|d| d.get("type").and_then(Value::as_str) == Some("artist"))
            .filter_map(parse_section)
            .collect();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Music");
    }
}
