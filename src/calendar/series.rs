use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DailyValue;

/// A daily series that is indexed backwards from its anchor: `values[i]` belongs to
/// `anchor - i` days. Anything outside of the stored range is absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSeries {
    anchor: Option<NaiveDate>,
    values: Vec<DailyValue>,
    label_template: String,
}

impl DataSeries {
    pub fn new(
        anchor: NaiveDate,
        values: impl IntoIterator<Item = DailyValue>,
        label_template: impl Into<String>,
    ) -> Self {
        Self {
            anchor: Some(anchor),
            values: values.into_iter().collect(),
            label_template: label_template.into(),
        }
    }

    /// Replaces the whole series. There is no partial update.
    pub fn set_series(&mut self, anchor: NaiveDate, values: impl IntoIterator<Item = DailyValue>) {
        self.anchor = Some(anchor);
        self.values = values.into_iter().collect();
    }

    pub fn set_label_template(&mut self, template: impl Into<String>) {
        self.label_template = template.into();
    }

    /// Date of `values[0]`. A freshly created series has no anchor.
    pub fn anchor(&self) -> Option<NaiveDate> {
        self.anchor
    }

    pub fn values(&self) -> &[DailyValue] {
        &self.values
    }

    pub fn label_template(&self) -> &str {
        &self.label_template
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value recorded for `date`. Dates outside of `[anchor - (len - 1), anchor]` are absent.
    pub fn value_at(&self, date: NaiveDate) -> DailyValue {
        match self.anchor {
            Some(anchor) => self.value_at_offset((anchor - date).num_days()),
            None => DailyValue::Absent,
        }
    }

    /// Value stored `offset` days before the anchor. Negative offsets are in the future.
    pub(crate) fn value_at_offset(&self, offset: i64) -> DailyValue {
        usize::try_from(offset)
            .ok()
            .and_then(|offset| self.values.get(offset))
            .copied()
            .unwrap_or_default()
    }
}

/// Values collected by a metric producer for one replacement of a [DataSeries]. The first value
/// belongs to the anchor passed to [SeriesUpdate::commit], every next one to the day before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesUpdate {
    values: Vec<DailyValue>,
}

impl SeriesUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data(&mut self, value: f64) -> &mut Self {
        self.values.push(DailyValue::Value(value));
        self
    }

    /// Marks the day as not measured. This is not the same as `add_data(0.)`.
    pub fn add_null(&mut self) -> &mut Self {
        self.values.push(DailyValue::Absent);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces `series` with the collected values anchored at `anchor`, usually today.
    pub fn commit(self, series: &mut DataSeries, anchor: NaiveDate) {
        series.set_series(anchor, self.values);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use crate::calendar::DailyValue::{self, Absent, Value};

    use super::{DataSeries, SeriesUpdate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_value_at_is_backward_indexed() {
        let series = DataSeries::new(
            date(2001, 1, 7),
            [Value(100.), Value(95.), Absent, Value(0.)],
            "%1",
        );

        assert_eq!(series.value_at(date(2001, 1, 7)), Value(100.));
        assert_eq!(series.value_at(date(2001, 1, 6)), Value(95.));
        assert_eq!(series.value_at(date(2001, 1, 5)), Absent);
        assert_eq!(series.value_at(date(2001, 1, 4)), Value(0.));
    }

    #[test]
    fn test_value_at_outside_of_range_is_absent() {
        let anchor = date(2000, 12, 25);
        let series = DataSeries::new(anchor, [Value(1.); 4], "%1");

        for days in -40..40 {
            let day = anchor - Duration::days(days);
            let expected = if (0..4).contains(&days) {
                Value(1.)
            } else {
                Absent
            };
            assert_eq!(series.value_at(day), expected, "{day}");
        }
    }

    #[test]
    fn test_empty_series_is_always_absent() {
        let series = DataSeries::default();
        assert!(series.is_empty());
        assert_eq!(series.anchor(), None);
        assert_eq!(series.value_at(date(2001, 1, 7)), DailyValue::Absent);
    }

    #[test]
    fn test_set_series_replaces_everything() {
        let mut series = DataSeries::new(date(2001, 1, 7), [Value(1.), Value(2.)], "t %1");
        series.set_series(date(2001, 1, 1), [Value(3.)]);

        assert_eq!(series.len(), 1);
        assert_eq!(series.value_at(date(2001, 1, 7)), Absent);
        assert_eq!(series.value_at(date(2001, 1, 1)), Value(3.));
        assert_eq!(series.label_template(), "t %1");
    }

    #[test]
    fn test_update_keeps_nulls_apart_from_zeros() {
        let mut series = DataSeries::new(date(2000, 1, 1), [Value(9.)], "%1 calls");
        let mut update = SeriesUpdate::new();
        update.add_data(3.).add_null().add_data(0.).add_null();
        assert_eq!(update.len(), 4);

        update.commit(&mut series, date(2001, 1, 7));

        assert_eq!(series.anchor(), Some(date(2001, 1, 7)));
        assert_eq!(series.values(), &[Value(3.), Absent, Value(0.), Absent]);
        assert_eq!(series.value_at(date(2001, 1, 6)), Absent);
        assert_eq!(series.value_at(date(2001, 1, 5)), Value(0.));
        assert_eq!(series.value_at(date(2000, 1, 1)), Absent);
        assert_eq!(series.label_template(), "%1 calls");
    }

    #[test]
    fn test_empty_update_clears_values() {
        let mut series = DataSeries::new(date(2001, 1, 7), [Value(1.)], "%1");
        let update = SeriesUpdate::new();
        assert!(update.is_empty());

        update.commit(&mut series, date(2001, 1, 7));
        assert!(series.is_empty());
        assert_eq!(series.value_at(date(2001, 1, 7)), Absent);
    }
}
