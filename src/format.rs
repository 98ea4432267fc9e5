use chrono::{DateTime, Local};

use crate::chronology::Chronology;
use crate::dataset::Entry;

/// Separator between artist and title in a track line.
pub const SEP: &str = "\u{a0}\u{2014}\u{a0}";

/// "437. Artist (1975) — Title"
pub fn track_line(position: u32, entry: &Entry) -> String {
    format!(
        "{position}. {} ({}){SEP}{}",
        entry.artist, entry.year, entry.title
    )
}

/// Track line for a chart position; bare rank when it is off the chart.
pub fn track(chrono: &Chronology, position: u32) -> String {
    match chrono.find_track(position) {
        Some(entry) => track_line(position, entry),
        None => format!("{position}."),
    }
}

/// Movement marker against earlier chartings: ▲/▼ with the distance
/// moved, ⇄ for a held rank, ⟲year for a return after absence, ∴ for a
/// first-time entry.
pub fn rank_change(chrono: &Chronology, entry: &Entry) -> String {
    let previous_year = chrono.year() - 1;
    if let Some(&previous) = entry.historical.get(&previous_year) {
        let diff = (entry.position as i64 - previous as i64).unsigned_abs();
        return if entry.position < previous {
            format!("\u{25b2}{diff}")
        } else if entry.position > previous {
            format!("\u{25bc}{diff}")
        } else {
            "\u{21c4}".to_string()
        };
    }
    for year in (chrono.first_year()..previous_year).rev() {
        if entry.historical.contains_key(&year) {
            return format!("\u{27f2}{year}");
        }
    }
    "\u{2234}".to_string()
}

/// Title column text: the title, an album-version mark, and the movement
/// and artist-chart annotations.
pub fn title_annotation(chrono: &Chronology, entry: &Entry) -> String {
    let version = if entry.album_version { " \u{29be}" } else { "" };
    let artist_chart = match chrono.artist_chart(entry) {
        Some((rank, total)) => format!(" {rank}/{total}"),
        None => String::new(),
    };
    format!(
        "{}{version} ({}{artist_chart})",
        entry.title,
        rank_change(chrono, entry)
    )
}

/// Air time column: "26-12 14:05", empty without a schedule.
pub fn air_time(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.with_timezone(&Local).format("%d-%m %H:%M").to_string())
        .unwrap_or_default()
}

/// Countdown text: "HH:MM:SS", with a leading day count past 24 hours.
pub fn timer(ms_remaining: i64) -> String {
    let total = ms_remaining.max(0) / 1000;
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{days}:{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
