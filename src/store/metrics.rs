use serde::{Deserialize, Serialize};

use crate::calendar::series::DataSeries;

use super::{
    synced::{RemoteKeySource, SyncedStore},
    KeyedStore,
};

/// All series of a single user keyed by source id. Insertion order defines the order in which
/// sources are cycled through.
#[derive(Debug, Default)]
pub struct UserRecord {
    sources: KeyedStore<String, DataSeries>,
}

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series for `source_id`, created empty when the user has none yet.
    pub fn series(&mut self, source_id: &str) -> &mut DataSeries {
        self.sources.find_mut(&source_id.to_string())
    }

    pub fn get(&self, source_id: &str) -> Option<&DataSeries> {
        self.sources.get_by_key(&source_id.to_string())
    }

    pub fn remove(&mut self, source_id: &str) -> Option<DataSeries> {
        self.sources.remove(&source_id.to_string())
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn nth_source(&self, n: usize) -> Option<(&str, &DataSeries)> {
        self.sources.nth(n).map(|(id, series)| (id.as_str(), series))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<(String, DataSeries)> for UserRecord {
    fn from_iter<T: IntoIterator<Item = (String, DataSeries)>>(iter: T) -> Self {
        let mut record = UserRecord::new();
        for (source_id, series) in iter {
            record.sources.insert(source_id, series);
        }
        record
    }
}

/// Metadata of a data source shared between users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Label template with a single `%1` placeholder.
    pub template: String,
}

/// Local per-user store.
pub type LocalUserStore = KeyedStore<String, UserRecord>;

/// Lookup of user records that never fails.
pub trait UserLookup {
    fn find_user(&mut self, username: &str) -> &UserRecord;
}

impl UserLookup for LocalUserStore {
    fn find_user(&mut self, username: &str) -> &UserRecord {
        self.find_mut(&username.to_string())
    }
}

impl<S> UserLookup for SyncedStore<S>
where
    S: RemoteKeySource<Key = String, Value = UserRecord>,
{
    fn find_user(&mut self, username: &str) -> &UserRecord {
        self.find_mut(&username.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::calendar::DailyValue;

    use super::*;

    #[test]
    fn test_unknown_user_is_created_empty() {
        let mut store = LocalUserStore::new();
        assert!(store.find_user("ghost").is_empty());
        assert!(store.contains(&"ghost".to_string()));
    }

    #[test]
    fn test_sources_keep_insertion_order() {
        let mut record = UserRecord::new();
        record.series("steps");
        record.series("calls");
        record.series("steps").set_series(
            NaiveDate::from_ymd_opt(2001, 1, 7).unwrap(),
            [DailyValue::Value(1.)],
        );

        assert_eq!(record.source_ids().collect::<Vec<_>>(), vec!["steps", "calls"]);
        assert_eq!(record.nth_source(0).unwrap().1.len(), 1);
        assert!(record.nth_source(1).unwrap().1.is_empty());
        assert!(record.nth_source(2).is_none());
    }
}
