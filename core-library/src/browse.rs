//! Album browsing helpers: search filtering and share links.

use crate::models::{join_artists, Album, AlbumId};

/// Keyword that matches the album currently loaded in the player.
pub const PLAYING_KEYWORD: &str = "playing";

/// Case-insensitive substring filter over album name and artists.
#[derive(Debug, Clone, Default)]
pub struct AlbumFilter {
    needle: String,
}

impl AlbumFilter {
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// `playing` is the id of the album loaded in the player, if any. That
    /// album also matches the [`PLAYING_KEYWORD`].
    pub fn matches(&self, album: &Album, playing: Option<&AlbumId>) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let mut haystack = album.name.to_lowercase();
        haystack.push_str(&album.artists.join(" ").to_lowercase());
        if playing == Some(&album.id) {
            haystack.push_str(PLAYING_KEYWORD);
        }
        haystack.contains(&self.needle)
    }

    pub fn apply<'a>(&self, albums: &'a [Album], playing: Option<&AlbumId>) -> Vec<&'a Album> {
        albums.iter().filter(|a| self.matches(a, playing)).collect()
    }
}

/// Link that opens the library (optionally on `album`) and carries the API
/// key in the fragment, so it never reaches server logs.
pub fn share_link(origin: &str, album: Option<&Album>, api_key: Option<&str>) -> String {
    let mut link = format!("{}/", origin.trim_end_matches('/'));
    if let Some(album) = album {
        link.push_str("?album=");
        link.push_str(album.id.as_str());
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        link.push('#');
        link.push_str(key);
    }
    link
}

/// Title shown alongside a shared album link.
pub fn share_title(album: &Album) -> String {
    format!("{} - {}", join_artists(&album.artists), album.name)
}
