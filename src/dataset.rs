use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset has no tracks")]
    Empty,
    #[error("positions length {positions} does not match tracks length {tracks}")]
    LengthMismatch { positions: usize, tracks: usize },
    #[error("position {position} at broadcast index {index} breaks the rank mapping (expected {expected})")]
    BrokenMapping { index: usize, position: u32, expected: u32 },
    #[error("track at broadcast index {index} has no air timestamp")]
    MissingTimestamp { index: usize },
    #[error("dataset carries no broadcast schedule")]
    Unscheduled,
    #[error("air timestamps are not in broadcast order at index {index}")]
    UnorderedTimestamps { index: usize },
    #[error("first_year {first_year} is after chart year {year}")]
    YearRange { first_year: u16, year: u16 },
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// One track's raw record as exported in the chart-data JSON.
///
/// Historical chartings arrive as numeric-year keys on the track object
/// (e.g. `"2015": 437`); they are flattened into `extra` and pulled out
/// during validation.
#[derive(Debug, Deserialize)]
struct RawTrack {
    artist: String,
    title: String,
    year: u16,
    timestamp: Option<i64>,
    #[serde(default)]
    album_version: bool,
    max_artist_key: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    tracks: Vec<RawTrack>,
    positions: Vec<u32>,
    #[serde(default)]
    keys: Vec<Vec<String>>,
    #[serde(default)]
    artists: BTreeMap<String, Vec<u32>>,
    first_year: u16,
    year: u16,
    #[serde(default)]
    reverse: bool,
    latest_year: Option<u16>,
    #[serde(default)]
    old_data_available: bool,
    wiki_url: Option<String>,
    web_url: Option<String>,
}

/// One chart entry, in broadcast order.
#[derive(Debug, Clone)]
pub struct Entry {
    /// 1-based rank in the active year, unique across the chart.
    pub position: u32,
    pub artist: String,
    pub title: String,
    /// Release year.
    pub year: u16,
    /// Broadcast air instant, epoch millis. Validated present when the
    /// dataset carries a broadcast schedule at all.
    pub timestamp: Option<i64>,
    pub album_version: bool,
    /// Key into the artists index for the entry's main artist.
    pub artist_key: Option<String>,
    /// Rank in earlier years this track also charted in.
    pub historical: BTreeMap<u16, u32>,
}

/// A validated chart dataset. Entries are stored in broadcast order
/// (ascending air time) regardless of the countdown's ranking direction.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub entries: Vec<Entry>,
    /// Rank per broadcast index (parallel to `entries`).
    pub positions: Vec<u32>,
    /// All credited artist keys per track (parallel to `entries`).
    pub keys: Vec<Vec<String>>,
    /// Artist key → ordered list of chart positions for that artist.
    pub artists: BTreeMap<String, Vec<u32>>,
    pub first_year: u16,
    pub year: u16,
    /// Whether rank 1 plays last (a countdown).
    pub reverse: bool,
    pub latest_year: Option<u16>,
    pub old_data_available: bool,
    pub wiki_url: Option<String>,
    pub web_url: Option<String>,
    /// Whether every entry carries an air timestamp; a clock can only be
    /// built for scheduled datasets.
    pub scheduled: bool,
}

impl Dataset {
    /// Parse and validate a chart-data JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(raw)?;
        Self::validate(raw)
    }

    /// Read and validate a chart-data JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn validate(raw: RawDataset) -> Result<Self> {
        if raw.tracks.is_empty() {
            return Err(DatasetError::Empty);
        }
        if raw.positions.len() != raw.tracks.len() {
            return Err(DatasetError::LengthMismatch {
                positions: raw.positions.len(),
                tracks: raw.tracks.len(),
            });
        }
        if raw.first_year > raw.year {
            return Err(DatasetError::YearRange {
                first_year: raw.first_year,
                year: raw.year,
            });
        }

        let len = raw.tracks.len() as u32;
        for (index, &position) in raw.positions.iter().enumerate() {
            // The rank mapping must be exactly invertible:
            // broadcast index = reverse ? len - position : position - 1.
            let expected = if raw.reverse {
                len - index as u32
            } else {
                index as u32 + 1
            };
            if position != expected {
                return Err(DatasetError::BrokenMapping {
                    index,
                    position,
                    expected,
                });
            }
        }

        // A dataset is either fully scheduled or not scheduled at all;
        // a partially timestamped chart is a data error.
        let scheduled = raw.tracks[0].timestamp.is_some();
        let mut previous: Option<i64> = None;
        for (index, track) in raw.tracks.iter().enumerate() {
            match (scheduled, track.timestamp) {
                (true, Some(ts)) => {
                    if previous.is_some_and(|p| ts < p) {
                        return Err(DatasetError::UnorderedTimestamps { index });
                    }
                    previous = Some(ts);
                }
                (false, None) => {}
                _ => return Err(DatasetError::MissingTimestamp { index }),
            }
        }

        let first_year = raw.first_year;
        let year = raw.year;
        let keys = raw.keys;
        let entries = raw
            .tracks
            .into_iter()
            .zip(&raw.positions)
            .enumerate()
            .map(|(index, (track, &position))| Entry {
                position,
                historical: historical_positions(&track.extra, first_year, year),
                artist: track.artist,
                title: track.title,
                year: track.year,
                timestamp: track.timestamp,
                album_version: track.album_version,
                // The exporter only writes max_artist_key for tracks whose
                // main artist differs from the first credited key.
                artist_key: track
                    .max_artist_key
                    .or_else(|| keys.get(index).and_then(|k| k.first().cloned())),
            })
            .collect();

        Ok(Self {
            entries,
            positions: raw.positions,
            keys,
            artists: raw.artists,
            first_year,
            year,
            reverse: raw.reverse,
            latest_year: raw.latest_year,
            old_data_available: raw.old_data_available,
            wiki_url: raw.wiki_url,
            web_url: raw.web_url,
            scheduled,
        })
    }
}

/// Pull the numeric-year keys (`"2015": 437`) out of a track's flattened
/// extra fields. Keys outside the chart's year range are not chartings.
fn historical_positions(
    extra: &BTreeMap<String, Value>,
    first_year: u16,
    year: u16,
) -> BTreeMap<u16, u32> {
    extra
        .iter()
        .filter_map(|(key, value)| {
            let charted: u16 = key.parse().ok()?;
            if charted < first_year || charted >= year {
                return None;
            }
            let position = value.as_u64()?;
            Some((charted, position as u32))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small countdown chart: 3 entries, rank 3 airs first.
    pub(crate) fn sample_json() -> String {
        r#"{
            "tracks": [
                {"artist": "The Sparks", "title": "Cold Morning", "year": 1977,
                 "timestamp": 1000, "2015": 5, "2016": 4},
                {"artist": "Delta Riders", "title": "Long Haul", "year": 1984,
                 "timestamp": 2000, "max_artist_key": "delta riders"},
                {"artist": "The Sparks", "title": "Northern Line", "year": 1981,
                 "timestamp": 3000, "album_version": true, "2014": 2,
                 "max_artist_key": "the sparks"}
            ],
            "positions": [3, 2, 1],
            "keys": [["the sparks"], ["delta riders"], ["the sparks"]],
            "artists": {"the sparks": [1, 3], "delta riders": [2]},
            "first_year": 2014,
            "year": 2017,
            "reverse": true
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_and_validate() {
        let data = Dataset::from_json(&sample_json()).unwrap();
        assert_eq!(data.entries.len(), 3);
        assert!(data.scheduled);
        assert!(data.reverse);
        assert_eq!(data.positions, vec![3, 2, 1]);
        assert_eq!(data.entries[0].historical.get(&2015), Some(&5));
        assert_eq!(data.entries[2].historical.get(&2014), Some(&2));
        assert!(data.entries[2].album_version);
        assert_eq!(data.artists["the sparks"], vec![1, 3]);
    }

    #[test]
    fn test_historical_ignores_out_of_range_years() {
        let data = Dataset::from_json(&sample_json()).unwrap();
        // "2016" is within range, the chart year itself would not be.
        assert_eq!(data.entries[0].historical.len(), 2);
        assert!(!data.entries[0].historical.contains_key(&2017));
    }

    #[test]
    fn test_empty_rejected() {
        let raw = r#"{"tracks": [], "positions": [], "first_year": 2014, "year": 2017}"#;
        assert!(matches!(Dataset::from_json(raw), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let raw = r#"{
            "tracks": [{"artist": "A", "title": "T", "year": 1990, "timestamp": 1}],
            "positions": [1, 2],
            "first_year": 2014, "year": 2017
        }"#;
        assert!(matches!(
            Dataset::from_json(raw),
            Err(DatasetError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_broken_rank_mapping_rejected() {
        // reverse countdown of 2 must be [2, 1]
        let raw = r#"{
            "tracks": [
                {"artist": "A", "title": "T", "year": 1990, "timestamp": 1},
                {"artist": "B", "title": "U", "year": 1991, "timestamp": 2}
            ],
            "positions": [1, 2],
            "first_year": 2014, "year": 2017, "reverse": true
        }"#;
        assert!(matches!(
            Dataset::from_json(raw),
            Err(DatasetError::BrokenMapping { index: 0, position: 1, expected: 2 })
        ));
    }

    #[test]
    fn test_partial_timestamps_rejected() {
        let raw = r#"{
            "tracks": [
                {"artist": "A", "title": "T", "year": 1990, "timestamp": 1},
                {"artist": "B", "title": "U", "year": 1991}
            ],
            "positions": [2, 1],
            "first_year": 2014, "year": 2017, "reverse": true
        }"#;
        assert!(matches!(
            Dataset::from_json(raw),
            Err(DatasetError::MissingTimestamp { index: 1 })
        ));
    }

    #[test]
    fn test_unordered_timestamps_rejected() {
        let raw = r#"{
            "tracks": [
                {"artist": "A", "title": "T", "year": 1990, "timestamp": 2000},
                {"artist": "B", "title": "U", "year": 1991, "timestamp": 1000}
            ],
            "positions": [2, 1],
            "first_year": 2014, "year": 2017, "reverse": true
        }"#;
        assert!(matches!(
            Dataset::from_json(raw),
            Err(DatasetError::UnorderedTimestamps { index: 1 })
        ));
    }

    #[test]
    fn test_unscheduled_dataset_allowed() {
        let raw = r#"{
            "tracks": [
                {"artist": "A", "title": "T", "year": 1990},
                {"artist": "B", "title": "U", "year": 1991}
            ],
            "positions": [2, 1],
            "first_year": 2014, "year": 2017, "reverse": true
        }"#;
        let data = Dataset::from_json(raw).unwrap();
        assert!(!data.scheduled);
    }
}
