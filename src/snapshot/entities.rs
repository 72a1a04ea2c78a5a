use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::{label::PLACEHOLDER, series::DataSeries, DailyValue},
    store::metrics::{SourceRecord, UserRecord},
};

/// Contents of a snapshot file written by a metrics producer.
///
/// ```json
/// {
///   "sources": { "steps": { "template": "%1 steps today" } },
///   "users": {
///     "alice": [ { "source": "steps", "anchor": "2001-01-07", "values": [100, null, 0] } ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceRecord>,
    /// Series of every user, in the order sources are cycled through.
    #[serde(default)]
    pub users: BTreeMap<String, Vec<SeriesEntity>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntity {
    pub source: String,
    /// Date of the first value.
    pub anchor: NaiveDate,
    /// Most recent first. `null` marks a day without a measurement.
    #[serde(default)]
    pub values: Vec<DailyValue>,
}

impl SnapshotEntity {
    /// Label template of a source. Unknown sources show the bare value.
    pub fn template(&self, source: &str) -> &str {
        self.sources
            .get(source)
            .map_or(PLACEHOLDER, |record| record.template.as_str())
    }

    pub fn user_record(&self, username: &str) -> Option<UserRecord> {
        let series = self.users.get(username)?;
        Some(
            series
                .iter()
                .map(|entity| {
                    (
                        entity.source.clone(),
                        DataSeries::new(
                            entity.anchor,
                            entity.values.iter().copied(),
                            self.template(&entity.source),
                        ),
                    )
                })
                .collect(),
        )
    }

    pub fn series(&self, username: &str, source: &str) -> Option<&SeriesEntity> {
        self.users
            .get(username)?
            .iter()
            .rev()
            .find(|entity| entity.source == source)
    }
}

/// Identifier of the record holding `username`'s series of `source`.
pub fn record_id(username: &str, source: &str) -> String {
    format!("{username}/{source}")
}
