use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::charts;
use crate::chronology::Chronology;
use crate::loader::LoadError;

/// Bare in-panel anchor grammar; anything else with a `#` prefix is a
/// navigational fragment or noise.
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[a-z][-a-z0-9_:.]*$").unwrap());

/// A named, hash-addressable top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabId {
    Year(u16),
    Charts,
    Info,
    Search,
    Upload,
    Theme,
}

impl TabId {
    pub fn fragment(&self) -> String {
        match self {
            TabId::Year(year) => format!("#/{year}"),
            TabId::Charts => "#/charts".to_string(),
            TabId::Info => "#/info".to_string(),
            TabId::Search => "#/search".to_string(),
            TabId::Upload => "#/upload".to_string(),
            TabId::Theme => "#/theme".to_string(),
        }
    }
}

/// Content containers. Every year tab projects into the shared main
/// table; modal and action tabs have no panel of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Main,
    Charts,
    Info,
}

const ALL_PANELS: [Panel; 3] = [Panel::Main, Panel::Charts, Panel::Info];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Search,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ThemeToggle,
}

/// What a tab does when it becomes the hash target, resolved by pattern
/// match — no optional-callback probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    /// Scrolls to a chart position; `hidden_mobile` thins old years out
    /// of narrow layouts.
    Year { year: u16, hidden_mobile: bool },
    /// Resolves a statistic id from its sub-path.
    Charts,
    Info,
    /// Overlays without deactivating the underlying tab.
    Modal(ModalKind),
    /// Runs an action and immediately restores the prior route.
    Action(ActionKind),
}

#[derive(Debug, Clone)]
pub struct TabDescriptor {
    pub id: TabId,
    pub icon: &'static str,
    pub label: String,
    pub kind: TabKind,
}

impl TabDescriptor {
    fn panel(&self) -> Option<Panel> {
        match self.kind {
            TabKind::Year { .. } => Some(Panel::Main),
            TabKind::Charts => Some(Panel::Charts),
            TabKind::Info => Some(Panel::Info),
            TabKind::Modal(_) | TabKind::Action(_) => None,
        }
    }
}

/// Host-side work described by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEffect {
    /// Toggle a content container. `overlay` marks panels that float
    /// over the main table rather than replacing the page flow.
    ShowPanel { panel: Panel, overlay: bool },
    HidePanel { panel: Panel },
    /// Toggle a tab's active styling.
    MarkTab { id: TabId, active: bool },
    OpenModal(ModalKind),
    CloseModal(ModalKind),
    ToggleTheme,
    /// Set the location hash — applied through the host event queue,
    /// never re-entered synchronously.
    SetHash(String),
    /// Resolve a position scroll within a year tab (through the clock).
    ScrollToPosition { year: u16, position: Option<u32> },
    /// Select a statistic on the charts tab.
    SelectChart { chart: String },
    /// Scroll to an element id inside the visible panel; a missing id is
    /// a silent no-op.
    ScrollToAnchor { id: String },
    /// Start loading a year's dataset (host checks its cache first).
    LoadYear { year: u16 },
    /// Refresh a tab link's composed deep link.
    SetLink { id: TabId, href: String },
    /// Non-blocking notice shown in the affected tab.
    Notice { message: String },
}

/// A year activation waiting for its dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    pub year: u16,
    pub hash: String,
}

enum Resolved {
    Tab { id: TabId, sub: Vec<String> },
    Anchor(String),
}

/// Hash-driven view state machine. All navigation funnels through the
/// hash; `reconcile` is the only place visibility state changes, and the
/// projected panel/tab classes are a pure render of `active`/`shown` —
/// never read back from a display.
#[derive(Debug)]
pub struct ViewRouter {
    tabs: Vec<TabDescriptor>,
    active: Option<TabId>,
    modal: Option<ModalKind>,
    shown: HashSet<Panel>,
    marked: HashSet<TabId>,
    links: HashMap<TabId, String>,
    loading: Option<PendingLoad>,
    prior_hash: String,
}

impl ViewRouter {
    /// Build the tab registry for a loaded dataset. A fresh router is
    /// constructed per dataset, together with its clock.
    pub fn new(chrono: &Chronology) -> Self {
        let mut tabs = Vec::new();
        let current = chrono.year();
        let latest = chrono.latest_year();
        if chrono.data.old_data_available || latest > current {
            for year in chrono.first_year()..=latest {
                if year == current {
                    continue;
                }
                tabs.push(TabDescriptor {
                    id: TabId::Year(year),
                    icon: "\u{1f519}",
                    label: year.to_string(),
                    kind: TabKind::Year {
                        year,
                        hidden_mobile: year + 1 < latest,
                    },
                });
            }
        }
        tabs.push(TabDescriptor {
            id: TabId::Year(current),
            icon: "\u{1f534}",
            label: current.to_string(),
            kind: TabKind::Year {
                year: current,
                hidden_mobile: false,
            },
        });
        tabs.push(TabDescriptor {
            id: TabId::Charts,
            icon: "\u{1f4ca}",
            label: "Charts".to_string(),
            kind: TabKind::Charts,
        });
        tabs.push(TabDescriptor {
            id: TabId::Info,
            icon: "\u{2139}\u{fe0f}",
            label: "Info".to_string(),
            kind: TabKind::Info,
        });
        tabs.push(TabDescriptor {
            id: TabId::Search,
            icon: "\u{1f50e}",
            label: "Search".to_string(),
            kind: TabKind::Modal(ModalKind::Search),
        });
        tabs.push(TabDescriptor {
            id: TabId::Upload,
            icon: "\u{1f4e4}",
            label: "Upload".to_string(),
            kind: TabKind::Modal(ModalKind::Upload),
        });
        tabs.push(TabDescriptor {
            id: TabId::Theme,
            icon: "\u{1f317}",
            label: "Theme".to_string(),
            kind: TabKind::Action(ActionKind::ThemeToggle),
        });

        Self {
            tabs,
            active: None,
            modal: None,
            shown: HashSet::new(),
            marked: HashSet::new(),
            links: HashMap::new(),
            loading: None,
            prior_hash: String::new(),
        }
    }

    pub fn tabs(&self) -> &[TabDescriptor] {
        &self.tabs
    }

    pub fn active(&self) -> Option<TabId> {
        self.active
    }

    pub fn modal(&self) -> Option<ModalKind> {
        self.modal
    }

    pub fn loading(&self) -> Option<&PendingLoad> {
        self.loading.as_ref()
    }

    /// The single reconciliation pass, run on every hash change and once
    /// at startup. Idempotent: repeating an unchanged hash produces no
    /// further visibility changes.
    pub fn reconcile(
        &mut self,
        chrono: &Chronology,
        hash: &str,
        active_position: Option<u32>,
    ) -> Vec<RouterEffect> {
        let mut effects = Vec::new();
        match self.resolve(chrono, hash) {
            Resolved::Anchor(id) => {
                // Scroll within the visible tab; which tab is active does
                // not change.
                effects.push(RouterEffect::ScrollToAnchor { id });
                self.prior_hash = hash.to_string();
            }
            Resolved::Tab { id, sub } => {
                let descriptor = self
                    .tabs
                    .iter()
                    .find(|t| t.id == id)
                    .cloned()
                    .expect("resolved tab is registered");
                match descriptor.kind {
                    TabKind::Modal(kind) => {
                        // Overlay: underlying tab visibility untouched.
                        if self.modal != Some(kind) {
                            self.modal = Some(kind);
                            effects.push(RouterEffect::OpenModal(kind));
                        }
                        self.mark(&mut effects);
                    }
                    TabKind::Action(ActionKind::ThemeToggle) => {
                        effects.push(RouterEffect::ToggleTheme);
                        effects.push(RouterEffect::SetHash(self.prior_hash.clone()));
                    }
                    TabKind::Year { year, .. } => {
                        self.close_open_modal(&mut effects);
                        self.activate(id, &mut effects);
                        let position = sub.first().and_then(|s| s.parse().ok());
                        if year == chrono.year() {
                            self.loading = None;
                            effects.push(RouterEffect::ScrollToPosition { year, position });
                        } else {
                            // Lazy activation: scroll once the dataset
                            // arrives and a fresh router re-reconciles.
                            log::info!("year {year} not loaded, requesting dataset");
                            self.loading = Some(PendingLoad {
                                year,
                                hash: hash.to_string(),
                            });
                            effects.push(RouterEffect::LoadYear { year });
                        }
                        self.prior_hash = hash.to_string();
                    }
                    TabKind::Charts => {
                        self.close_open_modal(&mut effects);
                        self.activate(id, &mut effects);
                        let chart = sub
                            .first()
                            .filter(|id| charts::find_source(id).is_some())
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| charts::default_source_id().to_string());
                        effects.push(RouterEffect::SelectChart { chart });
                        self.prior_hash = hash.to_string();
                    }
                    TabKind::Info => {
                        self.close_open_modal(&mut effects);
                        self.activate(id, &mut effects);
                        self.prior_hash = hash.to_string();
                    }
                }
            }
        }
        self.compose_links(chrono, active_position, &mut effects);
        effects
    }

    /// A modal's own close: restore the route it overlaid, through the
    /// event queue.
    pub fn close_modal(&mut self) -> Vec<RouterEffect> {
        let mut effects = Vec::new();
        if let Some(kind) = self.modal.take() {
            effects.push(RouterEffect::CloseModal(kind));
            effects.push(RouterEffect::SetHash(self.prior_hash.clone()));
            self.mark(&mut effects);
        }
        effects
    }

    /// A lazily requested dataset arrived (or failed). On success the
    /// host rebuilds the chronology/clock/router trio and replays the
    /// recorded hash through it; on failure the working dataset stays
    /// intact and the tab shows a notice.
    pub fn year_loaded(
        &mut self,
        year: u16,
        result: Result<(), &LoadError>,
    ) -> Vec<RouterEffect> {
        let Some(pending) = self.loading.take_if(|p| p.year == year) else {
            return Vec::new();
        };
        match result {
            Ok(()) => vec![RouterEffect::SetHash(pending.hash)],
            Err(err) => {
                log::warn!("year {year} failed to load: {err}");
                vec![RouterEffect::Notice {
                    message: format!("Year {year} could not be loaded: {err}"),
                }]
            }
        }
    }

    fn resolve(&self, chrono: &Chronology, hash: &str) -> Resolved {
        if let Some(rest) = hash.strip_prefix("#/") {
            let mut parts = rest.split('/');
            let name = parts.next().unwrap_or("");
            let sub: Vec<String> = parts.map(str::to_string).collect();
            let id = match name {
                "charts" => Some(TabId::Charts),
                "info" => Some(TabId::Info),
                "search" => Some(TabId::Search),
                "upload" => Some(TabId::Upload),
                "theme" => Some(TabId::Theme),
                _ => name.parse().ok().map(TabId::Year),
            };
            if let Some(id) = id.filter(|id| self.tabs.iter().any(|t| t.id == *id)) {
                return Resolved::Tab { id, sub };
            }
        } else if ANCHOR_RE.is_match(hash) {
            return Resolved::Anchor(hash[1..].to_string());
        }
        // Unknown tab or malformed fragment: the current-year list.
        Resolved::Tab {
            id: TabId::Year(chrono.year()),
            sub: Vec::new(),
        }
    }

    fn close_open_modal(&mut self, effects: &mut Vec<RouterEffect>) {
        if let Some(kind) = self.modal.take() {
            effects.push(RouterEffect::CloseModal(kind));
        }
    }

    /// Project the active tab onto panels and tab markers, emitting only
    /// the differences.
    fn activate(&mut self, target: TabId, effects: &mut Vec<RouterEffect>) {
        self.active = Some(target);
        let want = self
            .tabs
            .iter()
            .find(|t| t.id == target)
            .and_then(|t| t.panel());
        for panel in ALL_PANELS {
            let visible = want == Some(panel);
            if visible && !self.shown.contains(&panel) {
                self.shown.insert(panel);
                effects.push(RouterEffect::ShowPanel {
                    panel,
                    overlay: panel != Panel::Main,
                });
            } else if !visible && self.shown.contains(&panel) {
                self.shown.remove(&panel);
                effects.push(RouterEffect::HidePanel { panel });
            }
        }
        self.mark(effects);
    }

    fn mark(&mut self, effects: &mut Vec<RouterEffect>) {
        let mut want: HashSet<TabId> = HashSet::new();
        if let Some(active) = self.active {
            want.insert(active);
        }
        match self.modal {
            Some(ModalKind::Search) => {
                want.insert(TabId::Search);
            }
            Some(ModalKind::Upload) => {
                want.insert(TabId::Upload);
            }
            None => {}
        }
        for tab in &self.tabs {
            let active = want.contains(&tab.id);
            if active != self.marked.contains(&tab.id) {
                if active {
                    self.marked.insert(tab.id);
                } else {
                    self.marked.remove(&tab.id);
                }
                effects.push(RouterEffect::MarkTab { id: tab.id, active });
            }
        }
    }

    /// Compose deep links that carry the active year and position across
    /// tab switches, emitting only changed hrefs.
    fn compose_links(
        &mut self,
        chrono: &Chronology,
        active_position: Option<u32>,
        effects: &mut Vec<RouterEffect>,
    ) {
        let year = chrono.year();
        for tab in &self.tabs {
            let href = match (tab.id, active_position) {
                (TabId::Year(y), Some(position)) if y == year => format!("#/{y}/{position}"),
                (TabId::Search, Some(position)) => format!("#/search/{position}/{year}"),
                (TabId::Search, None) => format!("#/search/{year}"),
                (id, _) => id.fragment(),
            };
            if self.links.get(&tab.id) != Some(&href) {
                self.links.insert(tab.id, href.clone());
                effects.push(RouterEffect::SetLink { id: tab.id, href });
            }
        }
    }
}
