use crate::chronology::Chronology;

/// Results shown per query.
pub const RESULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    /// A single chart entry.
    Track { index: usize, position: u32 },
    /// An artist with all their chartings; `best` is their highest rank.
    Artist {
        key: String,
        display: String,
        best: u32,
        count: usize,
    },
}

struct TrackDoc {
    index: usize,
    position: u32,
    position_text: String,
    artist: String,
    title: String,
}

struct ArtistDoc {
    key: String,
    display: String,
    best: u32,
    count: usize,
}

/// Position/artist/title lookup over the active dataset. Matching is
/// case-folded substring containment — ranking beyond that belongs to a
/// real search index, not here.
pub struct SearchIndex {
    tracks: Vec<TrackDoc>,
    artists: Vec<ArtistDoc>,
}

impl SearchIndex {
    pub fn build(chrono: &Chronology) -> Self {
        let tracks = chrono
            .data
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| TrackDoc {
                index,
                position: entry.position,
                position_text: entry.position.to_string(),
                artist: entry.artist.to_lowercase(),
                title: entry.title.to_lowercase(),
            })
            .collect();
        let artists = chrono
            .data
            .artists
            .iter()
            .filter_map(|(key, positions)| {
                let &best = positions.first()?;
                let display = chrono
                    .find_track(best)
                    .map(|e| e.artist.clone())
                    .unwrap_or_else(|| key.clone());
                Some(ArtistDoc {
                    key: key.clone(),
                    display,
                    best,
                    count: positions.len(),
                })
            })
            .collect();
        Self { tracks, artists }
    }

    /// Top matches for a query, tracks before artist groups.
    pub fn query(&self, text: &str) -> Vec<SearchHit> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for doc in &self.tracks {
            if doc.position_text == needle
                || doc.artist.contains(&needle)
                || doc.title.contains(&needle)
            {
                hits.push(SearchHit::Track {
                    index: doc.index,
                    position: doc.position,
                });
                if hits.len() >= RESULT_LIMIT {
                    return hits;
                }
            }
        }
        for doc in &self.artists {
            if doc.key.contains(&needle) {
                hits.push(SearchHit::Artist {
                    key: doc.key.clone(),
                    display: doc.display.clone(),
                    best: doc.best,
                    count: doc.count,
                });
                if hits.len() >= RESULT_LIMIT {
                    break;
                }
            }
        }
        hits
    }
}
