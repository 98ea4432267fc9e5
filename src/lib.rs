pub mod charts;
pub mod chronology;
pub mod config;
pub mod dataset;
pub mod format;
pub mod info;
pub mod loader;
pub mod pagination;
pub mod playback;
pub mod router;
pub mod search;
pub mod store;

/// Nominal chart size — positions beyond this count as "outside the chart"
/// (the broadcaster publishes an overflow list past the main countdown).
pub const EXPECTED_POSITIONS: u32 = 2000;

/// Application name for XDG paths
pub const APP_NAME: &str = "chartcast";
