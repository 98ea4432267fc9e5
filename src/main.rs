use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};

use chartcast::chronology::Chronology;
use chartcast::dataset::Dataset;
use chartcast::info::InfoPanel;
use chartcast::loader::{
    CachedLoader, ChainLoader, DatasetLoader, FileLoader, HttpLoader, StoreLoader,
};
use chartcast::playback::{Effect, NullViewport, PlaybackClock};
use chartcast::router::{RouterEffect, TabId, ViewRouter};
use chartcast::search::{SearchHit, SearchIndex};
use chartcast::store::YearStore;
use chartcast::{charts, config, format, pagination};

#[derive(Parser)]
#[command(name = "chartcast", version, about = "Yearly music countdown playback engine")]
struct Cli {
    /// Path to the active year's dataset JSON
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the chart in broadcast order with movement annotations
    Show {
        /// Chart year (defaults to the active dataset's year)
        #[arg(long)]
        year: Option<u16>,

        /// Number of rows (0 = all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,
    },

    /// Follow the broadcast live, tracking the on-air entry
    Play {
        /// Wall-clock override (RFC 3339 or "YYYY-MM-DD HH:MM" local),
        /// for replaying past broadcasts
        #[arg(long)]
        at: Option<String>,
    },

    /// Resolve a deep-link hash and print the view reconciliation plan
    Route {
        /// Fragment such as "#/2015/437", "#/charts/rise" or "#credits"
        hash: String,
    },

    /// Print the page markers around a position
    Pages {
        /// Position to treat as on air
        #[arg(long)]
        current: Option<u32>,
    },

    /// Print a chart statistic (omit the id to list them)
    Charts {
        /// Statistic id
        id: Option<String>,

        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show a position's rank progression across chart years
    Info {
        position: u32,

        /// Additional positions to compare
        #[arg(long, value_delimiter = ',')]
        compare: Vec<u32>,
    },

    /// Search positions, artists and titles
    Search {
        query: String,
    },

    /// List imported year datasets
    Years,

    /// Validate and import a year dataset dump
    Import {
        file: PathBuf,
    },

    /// Delete an imported year dataset
    Remove {
        year: u16,
    },

    /// Show dataset statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = config::AppConfig::load();

    // Resolve dataset path: CLI > config > working directory
    let data_path = cli
        .data
        .or(config.data_path.clone())
        .unwrap_or_else(config::default_data_path);

    let store = match &config.years_dir {
        Some(dir) => YearStore::new(dir.clone()),
        None => YearStore::open_default(),
    };

    // Store maintenance commands work without an active dataset.
    match &cli.command {
        Commands::Years => {
            let years = store.list().context("Failed to list stored years")?;
            if years.is_empty() {
                println!("No imported year datasets.");
                return Ok(());
            }
            println!("{:<6} {:>8} {:>10}", "Year", "Entries", "Scheduled");
            println!("{}", "-".repeat(26));
            for y in years {
                println!(
                    "{:<6} {:>8} {:>10}",
                    y.year,
                    y.entries,
                    if y.scheduled { "yes" } else { "no" }
                );
            }
            return Ok(());
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let year = store.import(&raw).context("Import failed")?;
            println!("Imported dataset for year {year}.");
            return Ok(());
        }
        Commands::Remove { year } => {
            if store.delete(*year).context("Delete failed")? {
                println!("Removed stored dataset for year {year}.");
            } else {
                println!("No stored dataset for year {year}.");
            }
            return Ok(());
        }
        _ => {}
    }

    log::info!("Dataset: {}", data_path.display());
    let data = Dataset::from_file(&data_path)
        .with_context(|| format!("Failed to load dataset {}", data_path.display()))?;
    let mut loader = build_loader(&config, &data_path, &data, store);
    let chrono = Chronology::new(data);

    match cli.command {
        Commands::Show { year, limit } => {
            let chrono = resolve_year(&chrono, year, &mut loader)?;
            print_chart_table(&chrono, limit);
        }

        Commands::Play { at } => {
            let offset = match at {
                Some(text) => parse_instant(&text)? - Utc::now().timestamp_millis(),
                None => 0,
            };
            run_play(&chrono, offset, config.resync_threshold_ms)?;
        }

        Commands::Route { hash } => {
            run_route(chrono, &hash, &mut loader)?;
        }

        Commands::Pages { current } => {
            if let Some(position) = current {
                if chrono.find_track(position).is_none() {
                    println!("Position {position} is not on the {} chart.", chrono.year());
                    return Ok(());
                }
            }
            let pages = pagination::pages(&chrono, current);
            for (i, page) in pages.iter().enumerate() {
                let marker = if current == Some(*page) { "*" } else { " " };
                let wide = pagination::visible_at(
                    pagination::Breakpoint::Touch,
                    i,
                    *page,
                    current,
                    pages.len(),
                );
                println!("{marker} {page:>5}{}", if wide { "" } else { "  (wide only)" });
            }
        }

        Commands::Charts { id, limit } => {
            let Some(id) = id else {
                println!("{:<14} {}", "Id", "Statistic");
                println!("{}", "-".repeat(50));
                for source in charts::SOURCES {
                    println!("{:<14} {}", source.id, source.name);
                }
                return Ok(());
            };
            let source = charts::find_source(&id)
                .with_context(|| format!("Unknown statistic \"{id}\" (run `chartcast charts`)"))?;
            let items = (source.compute)(&chrono);
            if items.is_empty() {
                println!("No data for \"{}\".", source.name);
                return Ok(());
            }
            println!("{}:", source.name);
            println!();
            for item in items.iter().take(limit) {
                println!("{:>6}  {}", item.value, truncate(&item.label, 60));
            }
        }

        Commands::Info { position, compare } => {
            let (panel, _) = InfoPanel::open(&chrono, position, None);
            let Some(mut panel) = panel else {
                println!("Position {position} is not on the {} chart.", chrono.year());
                return Ok(());
            };
            for extra in compare {
                if panel.add_position(&chrono, extra).is_empty() {
                    log::warn!("Position {extra} not added to the comparison");
                }
            }
            print_progression(&chrono, &panel);
        }

        Commands::Search { query } => {
            let index = SearchIndex::build(&chrono);
            let hits = index.query(&query);
            if hits.is_empty() {
                println!("No results for \"{query}\".");
                return Ok(());
            }
            for hit in hits {
                match hit {
                    SearchHit::Track { position, .. } => {
                        println!("{}", format::track(&chrono, position));
                    }
                    SearchHit::Artist {
                        display,
                        best,
                        count,
                        ..
                    } => {
                        println!("{best}. {display} ({count}\u{d7})");
                    }
                }
            }
        }

        Commands::Stats => {
            let data = &chrono.data;
            println!("Chart Statistics");
            println!("================");
            println!("Chart year:       {}", data.year);
            println!("Chart span:       {}\u{2013}{}", data.first_year, chrono.latest_year());
            println!("Entries:          {}", data.entries.len());
            println!("Artists indexed:  {}", data.artists.len());
            let new_entries = data
                .entries
                .iter()
                .filter(|e| chrono.is_new_entry(e))
                .count();
            println!("New entries:      {new_entries}");
            if data.scheduled {
                let first = data.entries.first().and_then(|e| e.timestamp);
                let last = data.entries.last().and_then(|e| e.timestamp);
                println!(
                    "Broadcast:        {} \u{2014} {}",
                    format::air_time(first),
                    format::air_time(last)
                );
            } else {
                println!("Broadcast:        no schedule");
            }
        }

        // Handled before the dataset loads.
        Commands::Years | Commands::Import { .. } | Commands::Remove { .. } => unreachable!(),
    }

    Ok(())
}

/// File / store / HTTP lookup chain behind an idempotent cache, seeded
/// with the active dataset.
fn build_loader(
    config: &config::AppConfig,
    data_path: &std::path::Path,
    data: &Dataset,
    store: YearStore,
) -> CachedLoader<ChainLoader> {
    let dir = data_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut backends: Vec<Box<dyn DatasetLoader>> = vec![
        Box::new(FileLoader::new(dir)),
        Box::new(StoreLoader::new(store)),
    ];
    if let Some(url) = config.data_url.clone().or_else(|| data.web_url.clone()) {
        backends.push(Box::new(HttpLoader::new(url)));
    }
    let mut loader = CachedLoader::new(ChainLoader::new(backends));
    loader.seed(data.clone());
    loader
}

/// The requested year's chronology, through the loader when it is not
/// the active dataset.
fn resolve_year(
    chrono: &Chronology,
    year: Option<u16>,
    loader: &mut CachedLoader<ChainLoader>,
) -> Result<Chronology> {
    match year {
        None => Ok(Chronology::new(chrono.data.clone())),
        Some(year) if year == chrono.year() => Ok(Chronology::new(chrono.data.clone())),
        Some(year) => {
            let data = loader
                .load_year(year)
                .with_context(|| format!("Failed to load year {year}"))?;
            Ok(Chronology::new(data))
        }
    }
}

fn parse_instant(text: &str) -> Result<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
        .with_context(|| format!("Unrecognized instant \"{text}\""))?;
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            Ok(dt.timestamp_millis())
        }
        chrono::LocalResult::None => anyhow::bail!("Instant \"{text}\" does not exist locally"),
    }
}

/// Follow the broadcast on a current-thread runtime. The engine stays
/// synchronous; this loop owns the single live timer and the once-a-second
/// countdown refresh.
fn run_play(chrono: &Chronology, offset_ms: i64, resync_threshold_ms: i64) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    rt.block_on(play_loop(chrono, offset_ms, resync_threshold_ms))
}

async fn play_loop(chrono: &Chronology, offset_ms: i64, resync_threshold_ms: i64) -> Result<()> {
    let now_ms = || Utc::now().timestamp_millis() + offset_ms;

    let mut clock = PlaybackClock::new(chrono).context("Dataset cannot be played")?;
    let effects = clock.seed(chrono, now_ms(), &NullViewport);
    render_playback(chrono, &effects);

    while let Some(timer) = clock.pending() {
        let now = now_ms();
        if now < timer.deadline_ms {
            // Sleep in short slices so the countdown display ticks and a
            // suspend gap is noticed promptly.
            let slice = (timer.deadline_ms - now).min(1_000);
            tokio::time::sleep(Duration::from_millis(slice as u64)).await;
            let woke = now_ms();
            if woke - now - slice > resync_threshold_ms {
                log::info!(
                    "overslept by {}ms, resyncing to corrected clock",
                    woke - now - slice
                );
                let effects = clock.resync(chrono, woke, &NullViewport);
                render_playback(chrono, &effects);
                continue;
            }
            if let Some(remaining) = clock.upcoming_remaining(woke) {
                print!("\rStarting in {} ", format::timer(remaining));
                std::io::stdout().flush().ok();
            }
            continue;
        }
        let effects = clock.fire(chrono, now, &NullViewport);
        render_playback(chrono, &effects);
    }

    match clock.current() {
        Some(position) => println!(
            "Broadcast over; the chart closed on {}",
            format::track(chrono, position)
        ),
        None => println!("Broadcast over."),
    }
    Ok(())
}

fn render_playback(chrono: &Chronology, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::AnnounceCurrent { position } => {
                let air = format::air_time(
                    chrono.find_track(*position).and_then(|e| e.timestamp),
                );
                println!("\r\u{1f534} {}  [{air}]", format::track(chrono, *position));
            }
            Effect::ShowUpcoming { position, remaining_ms } => {
                println!(
                    "Up next: {} in {}",
                    format::track(chrono, *position),
                    format::timer(*remaining_ms)
                );
            }
            Effect::HideUpcoming => {
                println!();
            }
            Effect::UpdatePagination { pages, current } => {
                log::debug!("page markers: {pages:?} (current {current})");
            }
            Effect::MarkRow { index, current } => {
                log::trace!("row {index} current={current}");
            }
            Effect::ScrollIntoView { index } => {
                log::trace!("scroll row {index} into view");
            }
            Effect::MarkPinned { index, live } => {
                log::debug!("pinned row {index} (live={live})");
            }
            Effect::ArmTimer { deadline_ms } => {
                log::debug!("timer armed for {deadline_ms}");
            }
        }
    }
}

/// Resolve a hash the way the UI would: reconcile, satisfy any lazy year
/// load through the cache chain, and replay the recorded hash against
/// the freshly built dataset state.
fn run_route(
    mut chrono: Chronology,
    hash: &str,
    loader: &mut CachedLoader<ChainLoader>,
) -> Result<()> {
    let mut router = ViewRouter::new(&chrono);
    let mut hash = hash.to_string();

    // A hash swap can cascade at most once per loaded year; keep a small
    // bound rather than trusting that.
    for _ in 0..4 {
        let effects = router.reconcile(&chrono, &hash, None);
        let mut next_hash = None;
        for effect in &effects {
            println!("{}", describe_router_effect(effect));
            match effect {
                RouterEffect::LoadYear { year } => {
                    let result = loader.load_year(*year);
                    let follow_up = match &result {
                        Ok(_) => router.year_loaded(*year, Ok(())),
                        Err(e) => router.year_loaded(*year, Err(e)),
                    };
                    if let Ok(data) = result {
                        // The arriving dataset gets a fresh chronology
                        // and tab registry; the recorded hash replays
                        // against them below.
                        chrono = Chronology::new(data);
                        router = ViewRouter::new(&chrono);
                    }
                    for effect in &follow_up {
                        println!("{}", describe_router_effect(effect));
                        if let RouterEffect::SetHash(h) = effect {
                            next_hash = Some(h.clone());
                        }
                    }
                }
                RouterEffect::SetHash(h) => next_hash = Some(h.clone()),
                _ => {}
            }
        }
        match next_hash {
            Some(h) => hash = h,
            None => break,
        }
    }
    Ok(())
}

fn describe_tab(id: &TabId) -> String {
    match id {
        TabId::Year(year) => year.to_string(),
        TabId::Charts => "charts".to_string(),
        TabId::Info => "info".to_string(),
        TabId::Search => "search".to_string(),
        TabId::Upload => "upload".to_string(),
        TabId::Theme => "theme".to_string(),
    }
}

fn describe_router_effect(effect: &RouterEffect) -> String {
    match effect {
        RouterEffect::ShowPanel { panel, overlay } => {
            format!(
                "show panel {panel:?}{}",
                if *overlay { " (overlay)" } else { "" }
            )
        }
        RouterEffect::HidePanel { panel } => format!("hide panel {panel:?}"),
        RouterEffect::MarkTab { id, active } => format!(
            "mark tab {} {}",
            describe_tab(id),
            if *active { "active" } else { "inactive" }
        ),
        RouterEffect::OpenModal(kind) => format!("open {kind:?} modal"),
        RouterEffect::CloseModal(kind) => format!("close {kind:?} modal"),
        RouterEffect::ToggleTheme => "toggle theme".to_string(),
        RouterEffect::SetHash(hash) => format!("set hash {hash}"),
        RouterEffect::ScrollToPosition { year, position } => match position {
            Some(position) => format!("scroll to position {position} in {year}"),
            None => format!("scroll to the live row in {year}"),
        },
        RouterEffect::SelectChart { chart } => format!("select statistic {chart}"),
        RouterEffect::ScrollToAnchor { id } => format!("scroll to anchor #{id}"),
        RouterEffect::LoadYear { year } => format!("load dataset for year {year}"),
        RouterEffect::SetLink { id, href } => {
            format!("link tab {} to {href}", describe_tab(id))
        }
        RouterEffect::Notice { message } => format!("notice: {message}"),
    }
}

/// Print the chart in broadcast order with the movement annotations.
fn print_chart_table(chrono: &Chronology, limit: usize) {
    let count = if limit == 0 { chrono.len() } else { limit.min(chrono.len()) };
    println!(
        "{:>5} {:<30} {:<44} {:>12}",
        "Nr.", "Artist", "Title", "Time"
    );
    println!("{}", "-".repeat(95));
    for index in 0..count {
        let entry = chrono.entry(index);
        println!(
            "{:>5} {:<30} {:<44} {:>12}",
            format!("{}.", entry.position),
            truncate(&format!("{} ({})", entry.artist, entry.year), 30),
            truncate(&format::title_annotation(chrono, entry), 44),
            format::air_time(entry.timestamp),
        );
    }
    if count < chrono.len() {
        println!("... {} more entries", chrono.len() - count);
    }
}

fn print_progression(chrono: &Chronology, panel: &InfoPanel) {
    print!("{:<44}", "Track");
    for year in panel.years() {
        print!(" {:>5}", year % 100);
    }
    println!();
    println!("{}", "-".repeat(44 + panel.years().len() * 6));
    for (position, ranks) in panel.series() {
        print!("{:<44}", truncate(&format::track(chrono, *position), 44));
        for rank in ranks {
            match rank {
                Some(rank) => print!(" {rank:>5}"),
                None => print!(" {:>5}", "\u{b7}"),
            }
        }
        println!();
    }
}

/// Truncate long display text with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
