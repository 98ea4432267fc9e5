use chrono::{Local, NaiveDate, TimeZone};

use crate::dataset::{Dataset, Entry};

/// Direction-aware view over a validated chart dataset.
///
/// Entries sit in broadcast order (ascending air time); ranks map onto
/// broadcast indexes through the invariant
/// `index = reverse ? len - position : position - 1`, so rank lookups and
/// broadcast traversal stay mutually inverse. All derived scalars are
/// computed once at construction and never change.
#[derive(Debug)]
pub struct Chronology {
    pub data: Dataset,
    /// Rank step per broadcast step: -1 for a countdown, +1 otherwise.
    pub direction: i32,
    /// Rank of the last broadcast entry (where the countdown finishes).
    pub front: u32,
    /// Rank of the first broadcast entry.
    pub end: u32,
    /// Numeric chart boundary: historical ranks beyond this were outside
    /// the main chart, which classifies an entry as new to it.
    pub start: u32,
    /// Nominal end-of-broadcast instant (Jan 1 of the following year,
    /// local time), epoch millis. Fixed here so evaluation stays a pure
    /// function of (now, timestamps).
    pub end_of_year_ms: i64,
}

impl Chronology {
    pub fn new(data: Dataset) -> Self {
        let direction = if data.reverse { -1 } else { 1 };
        let end = data.positions[0];
        let front = data.positions[data.positions.len() - 1];
        let start = if data.reverse { end } else { front };
        let end_of_year_ms = end_of_year_ms(data.year);
        Self {
            data,
            direction,
            front,
            end,
            start,
            end_of_year_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    pub fn year(&self) -> u16 {
        self.data.year
    }

    pub fn first_year(&self) -> u16 {
        self.data.first_year
    }

    /// The most recent chart year known to exist, which may be later than
    /// the loaded dataset's own year when browsing an archived chart.
    pub fn latest_year(&self) -> u16 {
        self.data.latest_year.unwrap_or(self.data.year)
    }

    /// Convert a 1-based rank to its broadcast-order record.
    pub fn find_track(&self, position: u32) -> Option<&Entry> {
        self.index_of(position).map(|i| &self.data.entries[i])
    }

    /// Broadcast index for a rank, `None` when the rank is not on the chart.
    pub fn index_of(&self, position: u32) -> Option<usize> {
        if position < self.lowest() || position > self.highest() {
            return None;
        }
        let len = self.len() as u32;
        let index = if self.data.reverse {
            len - position
        } else {
            position - 1
        };
        Some(index as usize)
    }

    /// Rank at a broadcast index. Panics on out-of-range indexes; callers
    /// iterate `0..len()`.
    pub fn position_at(&self, index: usize) -> u32 {
        self.data.positions[index]
    }

    pub fn entry(&self, index: usize) -> &Entry {
        &self.data.entries[index]
    }

    /// Numerically lowest rank on the chart.
    pub fn lowest(&self) -> u32 {
        self.front.min(self.end)
    }

    /// Numerically highest rank on the chart.
    pub fn highest(&self) -> u32 {
        self.front.max(self.end)
    }

    /// Whether the entry never charted inside the main chart in any
    /// earlier year.
    pub fn is_new_entry(&self, entry: &Entry) -> bool {
        (self.data.first_year..self.data.year)
            .all(|year| entry.historical.get(&year).is_none_or(|&pos| pos > self.start))
    }

    /// Rank of the entry's artist within that artist's own chartings this
    /// year, as (rank, total).
    pub fn artist_chart(&self, entry: &Entry) -> Option<(usize, usize)> {
        let key = entry.artist_key.as_ref()?;
        let positions = self.data.artists.get(key)?;
        let rank = positions.iter().position(|&p| p == entry.position)? + 1;
        Some((rank, positions.len()))
    }
}

/// Epoch millis of Jan 1, 00:00 local time in the year after the chart's.
fn end_of_year_ms(year: u16) -> i64 {
    let date = NaiveDate::from_ymd_opt(year as i32 + 1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid end-of-year date");
    match Local.from_local_datetime(&date) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.timestamp_millis()
        }
        chrono::LocalResult::None => date.and_utc().timestamp_millis(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dataset::tests::sample_json;

    pub(crate) fn sample_chronology() -> Chronology {
        Chronology::new(Dataset::from_json(&sample_json()).unwrap())
    }

    #[test]
    fn test_derived_scalars() {
        let chrono = sample_chronology();
        assert_eq!(chrono.direction, -1);
        assert_eq!(chrono.end, 3);
        assert_eq!(chrono.front, 1);
        assert_eq!(chrono.start, 3);
        assert_eq!(chrono.lowest(), 1);
        assert_eq!(chrono.highest(), 3);
    }

    #[test]
    fn test_find_track_inverse_mapping() {
        let chrono = sample_chronology();
        for index in 0..chrono.len() {
            let position = chrono.position_at(index);
            assert_eq!(chrono.index_of(position), Some(index));
            assert_eq!(
                chrono.find_track(position).unwrap().position,
                position
            );
            // index = reverse ? len - pos : pos - 1
            let expected = if chrono.data.reverse {
                chrono.len() - position as usize
            } else {
                position as usize - 1
            };
            assert_eq!(index, expected);
        }
    }

    #[test]
    fn test_find_track_out_of_range() {
        let chrono = sample_chronology();
        assert!(chrono.find_track(0).is_none());
        assert!(chrono.find_track(4).is_none());
    }

    #[test]
    fn test_forward_mapping() {
        let raw = r#"{
            "tracks": [
                {"artist": "A", "title": "T", "year": 1990},
                {"artist": "B", "title": "U", "year": 1991},
                {"artist": "C", "title": "V", "year": 1992}
            ],
            "positions": [1, 2, 3],
            "first_year": 2014, "year": 2017, "reverse": false
        }"#;
        let chrono = Chronology::new(Dataset::from_json(raw).unwrap());
        assert_eq!(chrono.direction, 1);
        assert_eq!(chrono.end, 1);
        assert_eq!(chrono.front, 3);
        assert_eq!(chrono.start, 3);
        assert_eq!(chrono.index_of(1), Some(0));
        assert_eq!(chrono.index_of(3), Some(2));
    }

    #[test]
    fn test_new_entry_classification() {
        let chrono = sample_chronology();
        // Position 3 charted at 5 and 4 — beyond start=3 each time, so new.
        let charted_low = chrono.find_track(3).unwrap();
        assert!(chrono.is_new_entry(charted_low));
        // Position 1 charted at 2 in 2014 — inside the chart, not new.
        let returning = chrono.find_track(1).unwrap();
        assert!(!chrono.is_new_entry(returning));
        // Position 2 never charted at all — new.
        let fresh = chrono.find_track(2).unwrap();
        assert!(chrono.is_new_entry(fresh));
    }

    #[test]
    fn test_artist_chart() {
        let chrono = sample_chronology();
        let entry = chrono.find_track(3).unwrap();
        assert_eq!(chrono.artist_chart(entry), Some((2, 2)));
        let entry = chrono.find_track(1).unwrap();
        assert_eq!(chrono.artist_chart(entry), Some((1, 2)));
    }

    #[test]
    fn test_end_of_year_after_timestamps() {
        let chrono = sample_chronology();
        // Sample timestamps are near the epoch; the 2018 boundary is far
        // beyond them regardless of local offset.
        assert!(chrono.end_of_year_ms > 3000);
    }
}
