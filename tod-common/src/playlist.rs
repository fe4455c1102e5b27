//! Playlist catalog
//!
//! Playlists and tracks are static configuration: built once at startup and
//! never mutated afterwards. A track has no identity beyond its position in
//! its playlist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single module file in a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Display name ("Artist - Title")
    pub name: String,
    /// Source URL, either absolute (`http://...`) or relative to the media root
    pub url: String,
}

impl Track {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Named, ordered sequence of tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            tracks,
        }
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track at `index`, if in range
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }
}

/// Immutable collection of playlists, addressed by index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    playlists: Vec<Playlist>,
}

impl Catalog {
    /// Build a catalog, rejecting playlists and tracks with blank names or URLs
    pub fn new(playlists: Vec<Playlist>) -> Result<Self> {
        for (index, playlist) in playlists.iter().enumerate() {
            if playlist.name.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "playlist #{} has an empty name",
                    index
                )));
            }
            for (track_index, track) in playlist.tracks.iter().enumerate() {
                if track.url.trim().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "track #{} of playlist '{}' has an empty url",
                        track_index, playlist.name
                    )));
                }
            }
        }
        Ok(Self { playlists })
    }

    /// The collection shipped with the player
    pub fn builtin() -> Self {
        let playlist = |name: &str, tracks: &[(&str, &str)]| {
            Playlist::new(
                name,
                tracks
                    .iter()
                    .map(|(name, url)| Track::new(*name, *url))
                    .collect(),
            )
        };

        Self {
            playlists: vec![
                playlist(
                    "DEMOSCENE",
                    &[
                        ("Moby - Fury Forest", "/Music/demoscene/furyforest.mod"),
                        ("Firage - Galaxy Hero", "/Music/demoscene/galaxyhero.mod"),
                        ("Michael - Open Your Heart", "/Music/demoscene/heart.mod"),
                        ("Alien - Robocop III", "/Music/demoscene/robocop3.xm"),
                    ],
                ),
                playlist(
                    "GAMES",
                    &[
                        ("BaseHead - Crusader", "/Music/games/basehead.s3m"),
                        ("Silent Mode - Eternity", "/Music/games/eternity.mod"),
                        (
                            "Alexander Brandon - Jazz The Jack Rabbit",
                            "/Music/games/jazz.s3m",
                        ),
                        ("C.C.Catch - One Must Fall", "/Music/games/omf2097.s3m"),
                    ],
                ),
                playlist(
                    "KEYGEN",
                    &[
                        ("Unknown - ST-Style", "/Music/keygen/flcstst.xm"),
                        ("Dubmood - Lucid", "/Music/keygen/lucid.xm"),
                        ("FLC - Stargliders", "/Music/keygen/stargliders.xm"),
                        ("Unknown - Your Dreams", "/Music/keygen/yr-dreamz.xm"),
                    ],
                ),
                playlist(
                    "TRANCE",
                    &[
                        ("Adnan - Drilling", "/Music/trance/driling.it"),
                        ("Revisq - Fish, fish ... ", "/Music/trance/fish.mod"),
                        ("Unknown - I'am My Slave", "/Music/trance/slave.xm"),
                        ("Mobby - A Trip To Trance", "/Music/trance/trip.mod"),
                    ],
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Playlist by index
    pub fn get(&self, id: usize) -> Option<&Playlist> {
        self.playlists.get(id)
    }

    /// Index of the first playlist with this name (case-insensitive)
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.playlists
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playlist> {
        self.playlists.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.iter().all(|p| p.len() == 4));
        assert_eq!(catalog.get(2).unwrap().name, "KEYGEN");
        assert_eq!(
            catalog.get(0).unwrap().track(3).unwrap().url,
            "/Music/demoscene/robocop3.xm"
        );
    }

    #[test]
    fn test_position_by_name_ignores_case() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.position_by_name("trance"), Some(3));
        assert_eq!(catalog.position_by_name("jazz"), None);
    }

    #[test]
    fn test_new_rejects_blank_playlist_name() {
        let result = Catalog::new(vec![Playlist::new("  ", vec![])]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_blank_track_url() {
        let result = Catalog::new(vec![Playlist::new(
            "GAMES",
            vec![Track::new("Silence", "")],
        )]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_track_out_of_range() {
        let playlist = Playlist::new("X", vec![Track::new("A", "/a.mod")]);
        assert!(playlist.track(0).is_some());
        assert!(playlist.track(1).is_none());
        assert!(!playlist.is_empty());
    }
}
