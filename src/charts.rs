use std::collections::BTreeSet;

use crate::chronology::Chronology;
use crate::format;
use crate::EXPECTED_POSITIONS;

/// Items shown per statistic.
pub const CHART_COUNT: usize = 10;

/// One bar of a computed statistic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartItem {
    pub label: String,
    pub value: i64,
}

/// A named statistic over the active dataset. `compute` returns the full
/// ordered series; hosts truncate to `CHART_COUNT`.
pub struct ChartSource {
    pub id: &'static str,
    pub name: &'static str,
    pub compute: fn(&Chronology) -> Vec<ChartItem>,
}

/// Registry of chart statistics, in display order. The first entry is the
/// charts tab's default sub-resource.
pub const SOURCES: &[ChartSource] = &[
    ChartSource {
        id: "max_artist",
        name: "Artists with the most tracks",
        compute: most_charted_artists,
    },
    ChartSource {
        id: "artist_collab",
        name: "Most collaborations",
        compute: most_collaborations,
    },
    ChartSource {
        id: "artist_name",
        name: "Longest artist names",
        compute: longest_artist_names,
    },
    ChartSource {
        id: "new",
        name: "Highest new entries",
        compute: highest_new_entries,
    },
    ChartSource {
        id: "rise",
        name: "Biggest risers",
        compute: biggest_risers,
    },
    ChartSource {
        id: "extra500",
        name: "Breakthrough from beyond the chart",
        compute: breakthrough_entries,
    },
    ChartSource {
        id: "fall",
        name: "Biggest fallers",
        compute: biggest_fallers,
    },
    ChartSource {
        id: "return",
        name: "Longest-absent returns",
        compute: longest_absent_returns,
    },
    ChartSource {
        id: "old",
        name: "Oldest tracks",
        compute: oldest_tracks,
    },
    ChartSource {
        id: "long_title",
        name: "Longest titles",
        compute: longest_titles,
    },
];

pub fn default_source_id() -> &'static str {
    SOURCES[0].id
}

pub fn find_source(id: &str) -> Option<&'static ChartSource> {
    SOURCES.iter().find(|s| s.id == id)
}

/// Display name for an artist key: the artist credit on one of the key's
/// own tracks whose lowercase form matches, falling back to the key.
fn artist_name(chrono: &Chronology, key: &str) -> String {
    if let Some(positions) = chrono.data.artists.get(key) {
        for &position in positions {
            if let Some(entry) = chrono.find_track(position) {
                if entry.artist.to_lowercase() == key {
                    return entry.artist.clone();
                }
            }
        }
    }
    key.to_string()
}

fn most_charted_artists(chrono: &Chronology) -> Vec<ChartItem> {
    let mut items: Vec<ChartItem> = chrono
        .data
        .artists
        .iter()
        .map(|(key, positions)| ChartItem {
            label: artist_name(chrono, key),
            value: positions.len() as i64,
        })
        .collect();
    items.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    items
}

/// Whether key `other`'s chart positions are wholly contained in `chart`
/// — an alias of the same act rather than a distinct partner.
fn is_overlap(chrono: &Chronology, chart: &BTreeSet<u32>, other: &str) -> bool {
    chrono
        .data
        .artists
        .get(other)
        .is_some_and(|positions| positions.iter().all(|p| chart.contains(p)))
}

/// Distinct partner acts credited together with this key on its tracks.
fn collaborators(chrono: &Chronology, key: &str) -> BTreeSet<String> {
    let Some(positions) = chrono.data.artists.get(key) else {
        return BTreeSet::new();
    };
    let chart: BTreeSet<u32> = positions.iter().copied().collect();
    let mut partners = BTreeSet::new();
    for &position in positions {
        let Some(index) = chrono.index_of(position) else {
            continue;
        };
        for credit in chrono.data.keys.get(index).into_iter().flatten() {
            if credit != key && !is_overlap(chrono, &chart, credit) {
                partners.insert(credit.clone());
            }
        }
    }
    partners
}

fn most_collaborations(chrono: &Chronology) -> Vec<ChartItem> {
    let mut items: Vec<ChartItem> = chrono
        .data
        .artists
        .keys()
        .map(|key| ChartItem {
            label: artist_name(chrono, key),
            value: collaborators(chrono, key).len() as i64,
        })
        .filter(|item| item.value > 0)
        .collect();
    items.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    items
}

fn longest_artist_names(chrono: &Chronology) -> Vec<ChartItem> {
    let mut items: Vec<ChartItem> = chrono
        .data
        .artists
        .keys()
        .filter(|key| collaborators(chrono, key).is_empty())
        .map(|key| ChartItem {
            label: artist_name(chrono, key),
            value: key.chars().count() as i64,
        })
        .collect();
    items.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    items
}

fn highest_new_entries(chrono: &Chronology) -> Vec<ChartItem> {
    let mut positions: Vec<u32> = chrono
        .data
        .entries
        .iter()
        .filter(|entry| chrono.is_new_entry(entry))
        .map(|entry| entry.position)
        .collect();
    positions.sort_unstable();
    positions
        .into_iter()
        .map(|position| ChartItem {
            label: format::track(chrono, position),
            value: position as i64,
        })
        .collect()
}

/// Movement against last year's chart, for entries that charted inside it.
fn movements(chrono: &Chronology, from_beyond: bool) -> Vec<(u32, i64)> {
    let previous_year = chrono.year() - 1;
    chrono
        .data
        .entries
        .iter()
        .filter_map(|entry| {
            let previous = *entry.historical.get(&previous_year)?;
            let beyond = previous > EXPECTED_POSITIONS;
            if beyond != from_beyond {
                return None;
            }
            Some((entry.position, previous as i64 - entry.position as i64))
        })
        .collect()
}

fn biggest_risers(chrono: &Chronology) -> Vec<ChartItem> {
    let mut moves = movements(chrono, false);
    moves.retain(|&(_, delta)| delta > 0);
    moves.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    moves
        .into_iter()
        .map(|(position, delta)| ChartItem {
            label: format::track(chrono, position),
            value: delta,
        })
        .collect()
}

fn breakthrough_entries(chrono: &Chronology) -> Vec<ChartItem> {
    let mut moves = movements(chrono, true);
    moves.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    moves
        .into_iter()
        .map(|(position, delta)| ChartItem {
            label: format::track(chrono, position),
            value: delta,
        })
        .collect()
}

fn biggest_fallers(chrono: &Chronology) -> Vec<ChartItem> {
    let mut moves = movements(chrono, false);
    moves.retain(|&(_, delta)| delta < 0);
    moves.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    moves
        .into_iter()
        .map(|(position, delta)| ChartItem {
            label: format::track(chrono, position),
            value: -delta,
        })
        .collect()
}

fn longest_absent_returns(chrono: &Chronology) -> Vec<ChartItem> {
    let mut returns: Vec<(u32, i64)> = chrono
        .data
        .entries
        .iter()
        .filter_map(|entry| {
            // Most recent year the track charted inside the main chart,
            // skipping last year (that would be a mover, not a return).
            let last_charted = (chrono.first_year()..chrono.year() - 1)
                .rev()
                .find(|year| {
                    entry
                        .historical
                        .get(year)
                        .is_some_and(|&p| p <= EXPECTED_POSITIONS)
                })?;
            if entry.historical.contains_key(&(chrono.year() - 1)) {
                return None;
            }
            Some((entry.position, (chrono.year() - last_charted) as i64))
        })
        .collect();
    returns.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    returns
        .into_iter()
        .map(|(position, years)| ChartItem {
            label: format::track(chrono, position),
            value: years,
        })
        .collect()
}

fn oldest_tracks(chrono: &Chronology) -> Vec<ChartItem> {
    let mut items: Vec<(u32, u16)> = chrono
        .data
        .entries
        .iter()
        .map(|entry| (entry.position, entry.year))
        .collect();
    items.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    items
        .into_iter()
        .map(|(position, year)| ChartItem {
            label: format::track(chrono, position),
            value: year as i64,
        })
        .collect()
}

/// Title length with parenthesized asides stripped.
fn title_length(title: &str) -> usize {
    let mut length = 0;
    let mut depth = 0usize;
    for c in title.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => length += 1,
            _ => {}
        }
    }
    length
}

fn longest_titles(chrono: &Chronology) -> Vec<ChartItem> {
    let mut items: Vec<(u32, usize)> = chrono
        .data
        .entries
        .iter()
        .map(|entry| (entry.position, title_length(&entry.title)))
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
        .into_iter()
        .map(|(position, length)| ChartItem {
            label: format::track(chrono, position),
            value: length as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronology::Chronology;
    use crate::dataset::Dataset;

    fn chart_with_history() -> Chronology {
        let raw = r#"{
            "tracks": [
                {"artist": "Delta Riders", "title": "Long Haul (Live)", "year": 1984,
                 "timestamp": 1000, "2016": 2400},
                {"artist": "The Sparks & Delta Riders", "title": "Crossing", "year": 1991,
                 "timestamp": 2000, "2016": 1},
                {"artist": "The Sparks", "title": "Cold Morning", "year": 1977,
                 "timestamp": 3000, "2014": 3},
                {"artist": "The Sparks", "title": "Northern Line", "year": 1981,
                 "timestamp": 4000, "2016": 3}
            ],
            "positions": [4, 3, 2, 1],
            "keys": [["delta riders"], ["the sparks", "delta riders"],
                     ["the sparks"], ["the sparks"]],
            "artists": {"the sparks": [1, 2, 3], "delta riders": [3, 4]},
            "first_year": 2014,
            "year": 2017,
            "reverse": true
        }"#;
        Chronology::new(Dataset::from_json(raw).unwrap())
    }

    #[test]
    fn test_registry_ids_unique() {
        let mut ids: Vec<&str> = SOURCES.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), SOURCES.len());
        assert_eq!(default_source_id(), "max_artist");
        assert!(find_source("rise").is_some());
        assert!(find_source("bogus").is_none());
    }

    #[test]
    fn test_most_charted_artists() {
        let chrono = chart_with_history();
        let items = most_charted_artists(&chrono);
        assert_eq!(items[0].label, "The Sparks");
        assert_eq!(items[0].value, 3);
        assert_eq!(items[1].label, "Delta Riders");
        assert_eq!(items[1].value, 2);
    }

    #[test]
    fn test_collaborations() {
        let chrono = chart_with_history();
        let items = most_collaborations(&chrono);
        // Both acts share position 3, and neither chart is a subset of
        // the other, so each counts the other once.
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.value == 1));
    }

    #[test]
    fn test_new_entries_exclude_returning_tracks() {
        let chrono = chart_with_history();
        let items = highest_new_entries(&chrono);
        // Long Haul only ever charted beyond the chart boundary; every
        // other track charted inside it in some earlier year.
        assert_eq!(items.len(), 1);
        assert!(items[0].label.contains("Long Haul"));
        assert_eq!(items[0].value, 4);
    }

    #[test]
    fn test_risers_fallers_and_breakthrough() {
        let chrono = chart_with_history();
        let risers = biggest_risers(&chrono);
        // Northern Line climbed 3 → 1.
        assert_eq!(risers.len(), 1);
        assert!(risers[0].label.contains("Northern Line"));
        assert_eq!(risers[0].value, 2);

        // Crossing fell 1 → 3.
        let fallers = biggest_fallers(&chrono);
        assert_eq!(fallers.len(), 1);
        assert!(fallers[0].label.contains("Crossing"));
        assert_eq!(fallers[0].value, 2);

        let breakthrough = breakthrough_entries(&chrono);
        assert_eq!(breakthrough.len(), 1);
        assert!(breakthrough[0].label.contains("Long Haul"));
        assert_eq!(breakthrough[0].value, 2400 - 4);
    }

    #[test]
    fn test_returns() {
        let chrono = chart_with_history();
        let items = longest_absent_returns(&chrono);
        // Cold Morning last charted in 2014 and skipped 2016: back after
        // three years.
        assert_eq!(items.len(), 1);
        assert!(items[0].label.contains("Cold Morning"));
        assert_eq!(items[0].value, 3);
    }

    #[test]
    fn test_oldest_and_titles() {
        let chrono = chart_with_history();
        let oldest = oldest_tracks(&chrono);
        assert!(oldest[0].label.contains("Cold Morning"));
        assert_eq!(oldest[0].value, 1977);

        assert_eq!(title_length("Long Haul (Live)"), "Long Haul ".len());
        let titles = longest_titles(&chrono);
        assert!(titles[0].label.contains("Northern Line"));
    }
}
