use crate::chronology::Chronology;

/// Most position series one panel will plot.
pub const CHART_LIMIT: usize = 12;

/// Row-styling work for pinned comparison series. The series index keys
/// the host's color cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoEffect {
    MarkCompared { index: usize, series: usize },
    ClearCompared { index: usize },
}

/// Detail view for one expanded row: the track's rank progression across
/// every chart year, plus additionally pinned positions for comparison.
///
/// Only one panel is open at a time. The pinned set is shared row
/// styling, so opening a panel tears the previous one down first —
/// otherwise two panels would fight over the same rows.
#[derive(Debug)]
pub struct InfoPanel {
    position: u32,
    years: Vec<u16>,
    current_year_index: usize,
    series: Vec<(u32, Vec<Option<u32>>)>,
}

impl InfoPanel {
    /// Open a panel for a chart position, tearing down `previous` if a
    /// panel was already open. Out-of-chart positions yield no panel.
    pub fn open(
        chrono: &Chronology,
        position: u32,
        previous: Option<InfoPanel>,
    ) -> (Option<InfoPanel>, Vec<InfoEffect>) {
        let mut effects = Vec::new();
        if let Some(previous) = previous {
            effects.extend(previous.close(chrono));
        }
        if chrono.find_track(position).is_none() {
            return (None, effects);
        }

        let years: Vec<u16> = (chrono.first_year()..=chrono.latest_year()).collect();
        let current_year_index = years
            .iter()
            .position(|&y| y == chrono.year())
            .unwrap_or(years.len() - 1);
        let mut panel = InfoPanel {
            position,
            years,
            current_year_index,
            series: Vec::new(),
        };
        panel.series.push((position, panel.progression(chrono, position)));
        if let Some(index) = chrono.index_of(position) {
            effects.push(InfoEffect::MarkCompared { index, series: 0 });
        }
        (Some(panel), effects)
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn years(&self) -> &[u16] {
        &self.years
    }

    pub fn current_year_index(&self) -> usize {
        self.current_year_index
    }

    /// The plotted series, insertion-ordered: the panel's own position
    /// first, then pinned comparisons.
    pub fn series(&self) -> &[(u32, Vec<Option<u32>>)] {
        &self.series
    }

    /// Pin another position for comparison. No-op when already plotted
    /// or at the plot limit.
    pub fn add_position(&mut self, chrono: &Chronology, position: u32) -> Vec<InfoEffect> {
        if self.series.len() >= CHART_LIMIT
            || self.series.iter().any(|(p, _)| *p == position)
            || chrono.find_track(position).is_none()
        {
            return Vec::new();
        }
        let series = self.series.len();
        self.series.push((position, self.progression(chrono, position)));
        match chrono.index_of(position) {
            Some(index) => vec![InfoEffect::MarkCompared { index, series }],
            None => Vec::new(),
        }
    }

    /// Unpin a comparison. The panel's own position cannot be removed.
    pub fn remove_position(&mut self, chrono: &Chronology, position: u32) -> Vec<InfoEffect> {
        if position == self.position {
            return Vec::new();
        }
        let Some(at) = self.series.iter().position(|(p, _)| *p == position) else {
            return Vec::new();
        };
        self.series.remove(at);
        match chrono.index_of(position) {
            Some(index) => vec![InfoEffect::ClearCompared { index }],
            None => Vec::new(),
        }
    }

    /// Tear the panel down, releasing every styled row.
    pub fn close(self, chrono: &Chronology) -> Vec<InfoEffect> {
        self.series
            .iter()
            .filter_map(|(position, _)| chrono.index_of(*position))
            .map(|index| InfoEffect::ClearCompared { index })
            .collect()
    }

    /// Rank per chart year for a position: the live rank in the loaded
    /// year, the historical rank where it charted, gaps elsewhere.
    fn progression(&self, chrono: &Chronology, position: u32) -> Vec<Option<u32>> {
        let entry = chrono.find_track(position);
        self.years
            .iter()
            .map(|&year| {
                if year == chrono.year() {
                    Some(position)
                } else {
                    entry.and_then(|e| e.historical.get(&year).copied())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronology::tests::sample_chronology;

    #[test]
    fn test_open_seeds_own_progression() {
        let chrono = sample_chronology();
        let (panel, effects) = InfoPanel::open(&chrono, 3, None);
        let panel = panel.unwrap();

        assert_eq!(panel.years(), &[2014, 2015, 2016, 2017]);
        assert_eq!(panel.current_year_index(), 3);
        // Position 3 charted at 5 in 2015 and 4 in 2016.
        assert_eq!(
            panel.series(),
            &[(3, vec![None, Some(5), Some(4), Some(3)])]
        );
        assert_eq!(effects, vec![InfoEffect::MarkCompared { index: 0, series: 0 }]);
    }

    #[test]
    fn test_open_unknown_position() {
        let chrono = sample_chronology();
        let (panel, effects) = InfoPanel::open(&chrono, 99, None);
        assert!(panel.is_none());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_add_and_remove_comparison() {
        let chrono = sample_chronology();
        let (panel, _) = InfoPanel::open(&chrono, 3, None);
        let mut panel = panel.unwrap();

        let effects = panel.add_position(&chrono, 1);
        assert_eq!(effects, vec![InfoEffect::MarkCompared { index: 2, series: 1 }]);
        assert_eq!(panel.series().len(), 2);
        // Duplicates are a no-op.
        assert!(panel.add_position(&chrono, 1).is_empty());

        let effects = panel.remove_position(&chrono, 1);
        assert_eq!(effects, vec![InfoEffect::ClearCompared { index: 2 }]);
        // The panel's own position stays.
        assert!(panel.remove_position(&chrono, 3).is_empty());
        assert_eq!(panel.series().len(), 1);
    }

    #[test]
    fn test_open_tears_down_previous_panel() {
        let chrono = sample_chronology();
        let (panel, _) = InfoPanel::open(&chrono, 3, None);
        let mut first = panel.unwrap();
        first.add_position(&chrono, 1);

        let (second, effects) = InfoPanel::open(&chrono, 2, first.into());
        assert!(second.is_some());
        // Both of the first panel's rows are released before the new
        // panel styles its own.
        assert_eq!(
            effects,
            vec![
                InfoEffect::ClearCompared { index: 0 },
                InfoEffect::ClearCompared { index: 2 },
                InfoEffect::MarkCompared { index: 1, series: 0 },
            ]
        );
    }

    #[test]
    fn test_chart_limit() {
        let chrono = sample_chronology();
        let (panel, _) = InfoPanel::open(&chrono, 1, None);
        let mut panel = panel.unwrap();
        panel.add_position(&chrono, 2);
        panel.add_position(&chrono, 3);
        assert_eq!(panel.series().len(), 3);
        // Chart has only three positions; the limit guard still holds
        // structurally.
        assert!(panel.series().len() <= CHART_LIMIT);
    }
}
