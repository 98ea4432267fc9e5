use crate::chronology::Chronology;
use crate::dataset::DatasetError;
use crate::pagination;

/// Guard added to every timer delay against clock-boundary races.
pub const UPDATE_SLACK_MS: i64 = 1_000;

/// How long the host keeps the on-air announcement up before reverting.
pub const CURRENT_DISPLAY_MS: i64 = 10_000;

/// Whether the viewport follows the on-air row.
///
/// `Rearming` is the transitional state between a manual scroll-away and
/// following again: the row has been seen in view once and must be seen
/// on the next evaluation too before following resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autoscroll {
    Following,
    Detached,
    Rearming,
}

/// The single pending re-evaluation. `next` is the broadcast index the
/// timer targets; `anchor` is re-checked first when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub next: usize,
    pub anchor: usize,
    pub deadline_ms: i64,
}

/// Pre-start countdown display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upcoming {
    pub index: usize,
    pub starts_at_ms: i64,
}

/// Host-side work described by a clock transition. Scheduling is data:
/// the clock never sleeps or touches a display itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Set a row's on-air flag. Idempotent.
    MarkRow { index: usize, current: bool },
    /// Refresh the page markers with the active position included.
    UpdatePagination { pages: Vec<u32>, current: u32 },
    /// Announce the newly on-air track (reverted by the host after
    /// `CURRENT_DISPLAY_MS`).
    AnnounceCurrent { position: u32 },
    /// Bring a row into view on the next rendering opportunity — never
    /// synchronously inside the evaluation pass, since scrolling can
    /// itself trigger a visibility recompute.
    ScrollIntoView { index: usize },
    /// Style a manually selected row; `live` when it is the on-air row.
    MarkPinned { index: usize, live: bool },
    /// Replace the single pending timer with one firing at the deadline.
    ArmTimer { deadline_ms: i64 },
    /// Show or refresh the time-until-broadcast countdown.
    ShowUpcoming { position: u32, remaining_ms: i64 },
    HideUpcoming,
}

/// What the host knows about row visibility.
pub trait Viewport {
    fn in_view(&self, index: usize) -> bool;
}

/// Viewport for hosts without meaningful scroll state: every row counts
/// as visible, so autoscroll never detaches on its own.
pub struct NullViewport;

impl Viewport for NullViewport {
    fn in_view(&self, _index: usize) -> bool {
        true
    }
}

/// Decides which entry is on air and when that answer must be
/// re-evaluated. One instance per loaded dataset: loading another year
/// discards the clock and builds a fresh one.
#[derive(Debug)]
pub struct PlaybackClock {
    current: Option<u32>,
    autoscroll: Autoscroll,
    pending: Option<PendingTimer>,
    upcoming: Option<Upcoming>,
}

impl PlaybackClock {
    /// Refuses datasets without a broadcast schedule — a chart with no
    /// air timestamps has nothing to synchronize to.
    pub fn new(chrono: &Chronology) -> Result<Self, DatasetError> {
        if !chrono.data.scheduled {
            return Err(DatasetError::Unscheduled);
        }
        Ok(Self {
            current: None,
            autoscroll: Autoscroll::Following,
            pending: None,
            upcoming: None,
        })
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn autoscroll(&self) -> Autoscroll {
        self.autoscroll
    }

    pub fn pending(&self) -> Option<PendingTimer> {
        self.pending
    }

    pub fn upcoming(&self) -> Option<Upcoming> {
        self.upcoming
    }

    /// Countdown text input for the host's once-a-second refresh.
    pub fn upcoming_remaining(&self, now_ms: i64) -> Option<i64> {
        self.upcoming
            .map(|u| (u.starts_at_ms - now_ms + UPDATE_SLACK_MS).max(0))
    }

    /// The current-ness rule, derivable purely from `(now, timestamps)`:
    /// an entry is on air iff it has started and the next broadcast entry
    /// has not — with the nominal end-of-year instant as the boundary
    /// after the last entry.
    pub fn evaluate(&self, chrono: &Chronology, index: usize, now_ms: i64) -> bool {
        let Some(ts) = chrono.entry(index).timestamp else {
            return false;
        };
        if ts > now_ms {
            return false;
        }
        let boundary = if index + 1 < chrono.len() {
            air_time(chrono, index + 1)
        } else {
            chrono.end_of_year_ms
        };
        boundary > now_ms
    }

    /// Evaluate one row and apply the resulting transitions. Returns
    /// whether the row is on air plus the effects to run.
    pub fn observe(
        &mut self,
        chrono: &Chronology,
        index: usize,
        now_ms: i64,
        viewport: &dyn Viewport,
    ) -> (bool, Vec<Effect>) {
        let mut effects = Vec::new();
        let is_current = self.evaluate(chrono, index, now_ms);
        effects.push(Effect::MarkRow {
            index,
            current: is_current,
        });

        if is_current {
            let position = chrono.position_at(index);
            let transitioned = self.current != Some(position);
            self.current = Some(position);
            effects.push(Effect::UpdatePagination {
                pages: pagination::pages(chrono, Some(position)),
                current: position,
            });
            if transitioned {
                effects.push(Effect::AnnounceCurrent { position });
            }

            if self.autoscroll != Autoscroll::Following {
                self.autoscroll = match (self.autoscroll, viewport.in_view(index)) {
                    // Seen in view twice in a row: follow again.
                    (Autoscroll::Rearming, true) => Autoscroll::Following,
                    (Autoscroll::Detached, true) => Autoscroll::Rearming,
                    (Autoscroll::Rearming, false) => Autoscroll::Detached,
                    (state, _) => state,
                };
            }
            if self.autoscroll == Autoscroll::Following {
                effects.push(Effect::ScrollIntoView { index });
            }

            if self.upcoming.take().is_some() {
                effects.push(Effect::HideUpcoming);
            }
            self.arm(chrono, index + 1, index, now_ms, &mut effects);
        } else if index == 0 && air_time(chrono, 0) > now_ms {
            // Broadcast has not started: arm a start timer for the first
            // entry and raise the countdown display.
            let starts_at = air_time(chrono, 0);
            self.arm(chrono, 0, 0, now_ms, &mut effects);
            self.upcoming = Some(Upcoming {
                index: 0,
                starts_at_ms: starts_at,
            });
            effects.push(Effect::ShowUpcoming {
                position: chrono.position_at(0),
                remaining_ms: starts_at - now_ms + UPDATE_SLACK_MS,
            });
        }

        (is_current, effects)
    }

    /// Initial pass over every row, the way a freshly rendered table is
    /// seeded.
    pub fn seed(
        &mut self,
        chrono: &Chronology,
        now_ms: i64,
        viewport: &dyn Viewport,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        for index in 0..chrono.len() {
            let (_, mut fx) = self.observe(chrono, index, now_ms, viewport);
            effects.append(&mut fx);
        }
        effects
    }

    /// The pending timer fired (or is being force-flushed). Re-checks the
    /// anchor first — a stale or early fire simply re-arms — then walks
    /// forward in broadcast order, marking intermediate rows not-current,
    /// until the new on-air entry is found or the list ends. With no
    /// entry found the clock is left idle.
    pub fn fire(
        &mut self,
        chrono: &Chronology,
        now_ms: i64,
        viewport: &dyn Viewport,
    ) -> Vec<Effect> {
        let Some(timer) = self.pending.take() else {
            // A superseded timer finds nothing pending and stays inert.
            return Vec::new();
        };

        let (still_current, mut effects) = self.observe(chrono, timer.anchor, now_ms, viewport);
        if still_current {
            return effects;
        }
        let mut next = timer.next;
        while next < chrono.len() {
            let (is_current, mut fx) = self.observe(chrono, next, now_ms, viewport);
            effects.append(&mut fx);
            if is_current {
                break;
            }
            next += 1;
        }
        effects
    }

    /// Drift correction after the host was backgrounded or suspended:
    /// force-flush the pending evaluation once, with the corrected now.
    /// The countdown display, if active, is re-raised from the same pass
    /// rather than resumed stale.
    pub fn resync(
        &mut self,
        chrono: &Chronology,
        now_ms: i64,
        viewport: &dyn Viewport,
    ) -> Vec<Effect> {
        if self.pending.is_none() {
            return Vec::new();
        }
        self.fire(chrono, now_ms, viewport)
    }

    /// A page-marker or row selection. Selecting the live position
    /// re-enables following; any other position becomes a manual pin and
    /// detaches autoscroll. With no explicit target, scroll to the live
    /// row when following.
    pub fn pin(&mut self, chrono: &Chronology, position: Option<u32>) -> Vec<Effect> {
        let target = position.or_else(|| {
            (self.autoscroll == Autoscroll::Following)
                .then_some(self.current)
                .flatten()
        });
        let Some(position) = target else {
            return Vec::new();
        };
        let Some(index) = chrono.index_of(position) else {
            return Vec::new();
        };
        let live = self.current == Some(position);
        self.autoscroll = if live {
            Autoscroll::Following
        } else {
            Autoscroll::Detached
        };
        vec![
            Effect::ScrollIntoView { index },
            Effect::MarkPinned { index, live },
        ]
    }

    /// The user scrolled away manually.
    pub fn detach(&mut self) {
        self.autoscroll = Autoscroll::Detached;
    }

    fn arm(
        &mut self,
        chrono: &Chronology,
        next: usize,
        anchor: usize,
        now_ms: i64,
        effects: &mut Vec<Effect>,
    ) {
        if next >= chrono.len() {
            // No successor in the direction of travel: idle until reload.
            return;
        }
        let deadline_ms = now_ms + (air_time(chrono, next) - now_ms).max(0) + UPDATE_SLACK_MS;
        self.pending = Some(PendingTimer {
            next,
            anchor,
            deadline_ms,
        });
        effects.push(Effect::ArmTimer { deadline_ms });
        log::debug!(
            "armed timer for broadcast index {} (anchor {}) at +{}ms",
            next,
            anchor,
            deadline_ms - now_ms
        );
    }
}

/// Air instant of a broadcast index. Construction guarantees a schedule;
/// a missing value simply never airs.
fn air_time(chrono: &Chronology, index: usize) -> i64 {
    chrono.entry(index).timestamp.unwrap_or(i64::MAX)
}
