use std::collections::HashSet;

use serde::Deserialize;

use crate::player::store::{TrackId, TrackInfo};

/// Body of a search or lookup reply.
///
/// A request that failed degrades to the empty object, whose `results` is
/// absent. A search that matched nothing carries an empty list instead.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResponse {
    pub result_count: usize,
    pub results: Option<Vec<RawResult>>,
}

/// One row as the catalog sends it.
///
/// Lookups mix a collection row in with the songs, so every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawResult {
    pub wrapper_type: Option<String>,
    pub track_id: Option<TrackId>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub collection_id: Option<i64>,
    pub collection_name: Option<String>,
    pub primary_genre_name: Option<String>,
    pub preview_url: Option<String>,
    pub track_time_millis: Option<f64>,
}

/// A playable catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTrack {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub collection_id: Option<i64>,
    pub genre: Option<String>,
    pub preview_url: String,
    /// Full track length as listed by the catalog, not the preview's.
    pub track_time_millis: Option<f64>,
}

impl CatalogTrack {
    /// `artist - title`, or just the title when the artist is missing.
    pub fn display(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }

    pub fn to_track_info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id,
            title: self.title.clone(),
            src: self.preview_url.clone(),
        }
    }
}

/// Keep rows that can be played, in order, first occurrence of each id wins.
pub fn playable(results: Vec<RawResult>) -> Vec<CatalogTrack> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter_map(|r| {
            // Lookups also return the collection itself.
            if r.wrapper_type.as_deref().is_some_and(|w| w != "track") {
                return None;
            }
            let id = r.track_id?;
            let preview_url = r.preview_url.filter(|u| !u.is_empty())?;
            if !seen.insert(id) {
                return None;
            }
            Some(CatalogTrack {
                id,
                title: r.track_name.unwrap_or_default(),
                artist: r.artist_name.unwrap_or_default(),
                album: r.collection_name,
                collection_id: r.collection_id,
                genre: r.primary_genre_name,
                preview_url,
                track_time_millis: r.track_time_millis,
            })
        })
        .collect()
}

/// What to ask the catalog for.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Free-text search by song or artist.
    Search(String),
    /// Every song of one album.
    Album(i64),
}

impl Query {
    pub fn describe(&self) -> String {
        match self {
            Query::Search(term) => format!("\"{term}\""),
            Query::Album(id) => format!("album {id}"),
        }
    }
}

/// Outcome of the latest catalog request, as shown to the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Fetching,
    Loaded(usize),
    NothingFound,
    Failed,
}

impl SearchStatus {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            SearchStatus::NothingFound
        } else {
            SearchStatus::Loaded(count)
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            SearchStatus::NothingFound => Some("Nothing was found"),
            SearchStatus::Failed => Some("Can't load tracks. Fetch error"),
            SearchStatus::Fetching => Some("Searching..."),
            SearchStatus::Idle | SearchStatus::Loaded(_) => None,
        }
    }
}
