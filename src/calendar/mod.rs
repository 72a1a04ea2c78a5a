//! Calendar primitives used by the projector.
//!  - [DailyValue] separates a day that was never measured from a measured zero.
//!  - [MonthGrid] is a per-day view of one calendar month.
//!  - [series::DataSeries] is the sparse, backward-indexed source the grids are filled from.

pub mod label;
pub mod series;

use serde::{Deserialize, Serialize};

/// Value recorded for a single day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum DailyValue {
    /// Nothing was ever recorded for the day.
    #[default]
    Absent,
    Value(f64),
}

impl DailyValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, DailyValue::Absent)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            DailyValue::Absent => None,
            DailyValue::Value(v) => Some(*v),
        }
    }
}

impl From<Option<f64>> for DailyValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(DailyValue::Absent, DailyValue::Value)
    }
}

impl From<DailyValue> for Option<f64> {
    fn from(value: DailyValue) -> Self {
        value.value()
    }
}

impl From<f64> for DailyValue {
    fn from(value: f64) -> Self {
        DailyValue::Value(value)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in a month of the proleptic Gregorian calendar.
///
/// Panics when `month` is outside of `1..=12`. That is a bug on the caller side.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => panic!("month {month} is outside of 1..=12"),
    }
}

/// Returns the calendar month right before `(year, month)`.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    debug_assert!((1..=12).contains(&month));
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Values of a single calendar month. Day `d` lives at `cells[d - 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGrid {
    year: i32,
    month: u32,
    cells: Vec<DailyValue>,
}

impl MonthGrid {
    /// Creates a grid where every day is absent.
    pub fn empty(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            cells: vec![DailyValue::Absent; days_in_month(year, month) as usize],
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[DailyValue] {
        &self.cells
    }

    /// Value for a 1-based day of the month. Days outside of the month are absent.
    pub fn day(&self, day: u32) -> DailyValue {
        day.checked_sub(1)
            .and_then(|index| self.cells.get(index as usize))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_all_absent(&self) -> bool {
        self.cells.iter().all(DailyValue::is_absent)
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [DailyValue] {
        &mut self.cells
    }
}
