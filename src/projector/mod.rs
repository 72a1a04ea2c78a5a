//! Projection of the selected data series onto this month and the previous month.
//!
//! The projector works in two phases. Selection changes ([CalendarProjector::set_username],
//! [CalendarProjector::advance_source]) only update the selection. Outputs are recomputed only by
//! [CalendarProjector::refresh], which asks the clock for the current date every time it runs, so
//! several selection changes can be batched into one recompute and day changes are picked up.

pub mod events;

use chrono::{Datelike, Duration, NaiveDate};
use events::{Notifier, ProjectorEvent};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    calendar::{
        days_in_month,
        label::{render_label, NO_DATA_TODAY_LABEL, NO_SOURCES_LABEL},
        previous_month,
        series::DataSeries,
        DailyValue, MonthGrid,
    },
    store::metrics::UserLookup,
    theme::{ColorTheme, ColorThemePair, ColorThemeProvider},
    utils::{clock::Clock, time::month_start},
};

/// Which user is shown and which of their sources is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub username: String,
    /// Index into the user's sources, taken modulo their count.
    pub source_cursor: usize,
}

pub struct CalendarProjector<S> {
    clock: Box<dyn Clock>,
    store: S,
    themes: Box<dyn ColorThemeProvider>,
    selection: Selection,
    notifier: Notifier,

    current_day: u32,
    label: String,
    first_month: MonthGrid,
    second_month: MonthGrid,
    first_color: ColorTheme,
    second_color: ColorTheme,
    active_source: Option<String>,
}

impl<S: UserLookup> CalendarProjector<S> {
    /// Creates a projector and computes its outputs once, so they are valid right away.
    pub fn new(clock: Box<dyn Clock>, store: S, themes: Box<dyn ColorThemeProvider>) -> Self {
        let today = clock.today();
        let (second_year, second_month) = previous_month(today.year(), today.month());
        let mut projector = Self {
            clock,
            store,
            themes,
            selection: Selection::default(),
            notifier: Notifier::default(),
            current_day: today.day(),
            label: NO_SOURCES_LABEL.to_string(),
            first_month: MonthGrid::empty(today.year(), today.month()),
            second_month: MonthGrid::empty(second_year, second_month),
            first_color: ColorTheme::BLANK,
            second_color: ColorTheme::BLANK,
            active_source: None,
        };
        projector.refresh_at(today);
        projector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectorEvent> {
        self.notifier.subscribe()
    }

    /// Selects another user and goes back to their first source. Outputs are not recomputed.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.selection.username = username.into();
        self.selection.source_cursor = 0;
        self.notifier
            .notify(ProjectorEvent::UsernameChanged(self.selection.username.clone()));
    }

    /// Moves to the next source of the current user, wrapping after the last one. Outputs are not
    /// recomputed.
    pub fn advance_source(&mut self) {
        let count = self.store.find_user(&self.selection.username).len();
        self.selection.source_cursor = if count == 0 {
            0
        } else {
            (self.selection.source_cursor + 1) % count
        };
    }

    /// Recomputes every output from the current date, the store and the selection, then notifies
    /// observers about all of them.
    pub fn refresh(&mut self) {
        let today = self.clock.today();
        self.refresh_at(today);
    }

    fn refresh_at(&mut self, today: NaiveDate) {
        let first_start = month_start(today);
        let (second_year, second_month) = previous_month(today.year(), today.month());
        let second_start =
            first_start - Duration::days(days_in_month(second_year, second_month) as i64);

        let mut first_month = MonthGrid::empty(today.year(), today.month());
        let mut second_month = MonthGrid::empty(second_year, second_month);

        let user = self.store.find_user(&self.selection.username);
        let active = match user.len() {
            0 => None,
            count => user.nth_source(self.selection.source_cursor % count),
        };

        let (label, colors, active_source) = match active {
            Some((source_id, series)) => {
                fill_month(&mut first_month, first_start, series);
                fill_month(&mut second_month, second_start, series);
                let label = match series.value_at(today) {
                    DailyValue::Absent => NO_DATA_TODAY_LABEL.to_string(),
                    DailyValue::Value(value) => render_label(series.label_template(), value),
                };
                (
                    label,
                    self.themes.color_theme(source_id),
                    Some(source_id.to_string()),
                )
            }
            None => (
                NO_SOURCES_LABEL.to_string(),
                ColorThemePair::default(),
                None,
            ),
        };

        debug!(
            "Refreshed calendar for {:?} at {today}, source {:?}: {label}",
            self.selection, active_source
        );

        self.current_day = today.day();
        self.label = label;
        self.first_month = first_month;
        self.second_month = second_month;
        self.first_color = colors.primary;
        self.second_color = colors.secondary;
        self.active_source = active_source;

        self.notify_all();
    }

    fn notify_all(&self) {
        let notifier = &self.notifier;
        notifier.notify(ProjectorEvent::CurrentDayChanged(self.current_day));
        notifier.notify(ProjectorEvent::LabelChanged(self.label.clone()));
        notifier.notify(ProjectorEvent::FirstMonthChanged(self.first_month.clone()));
        notifier.notify(ProjectorEvent::SecondMonthChanged(self.second_month.clone()));
        notifier.notify(ProjectorEvent::FirstColorChanged(self.first_color));
        notifier.notify(ProjectorEvent::SecondColorChanged(self.second_color));
    }
}

impl<S> CalendarProjector<S> {
    /// Day of the month of the last refresh, starting from 1.
    pub fn current_day(&self) -> u32 {
        self.current_day
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Grid of the month of the last refresh.
    pub fn first_month(&self) -> &MonthGrid {
        &self.first_month
    }

    /// Grid of the month before [CalendarProjector::first_month].
    pub fn second_month(&self) -> &MonthGrid {
        &self.second_month
    }

    pub fn first_color(&self) -> &ColorTheme {
        &self.first_color
    }

    pub fn second_color(&self) -> &ColorTheme {
        &self.second_color
    }

    pub fn username(&self) -> &str {
        &self.selection.username
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn source_cursor(&self) -> usize {
        self.selection.source_cursor
    }

    /// Source shown by the last refresh.
    pub fn active_source(&self) -> Option<&str> {
        self.active_source.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Writes values of `series` into `grid`, whose first day is `first_day`.
fn fill_month(grid: &mut MonthGrid, first_day: NaiveDate, series: &DataSeries) {
    let Some(anchor) = series.anchor() else {
        return;
    };
    let first_offset = (anchor - first_day).num_days();
    for (day0, cell) in grid.cells_mut().iter_mut().enumerate() {
        *cell = series.value_at_offset(first_offset - day0 as i64);
    }
}
