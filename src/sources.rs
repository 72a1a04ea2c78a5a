//! Fan-out notification about changed source records, consumed by whoever reacts to new data.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

/// Multimap of source name to the identifiers of records that belong to it.
pub type SourceFileMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourcesChanged {
    /// Records that are new or were modified by the update.
    pub changed: SourceFileMap,
    /// Every record known after the update.
    pub all: SourceFileMap,
}

pub fn insert_record(map: &mut SourceFileMap, source: &str, record: impl Into<String>) {
    map.entry(source.to_string()).or_default().insert(record.into());
}

/// Keeps the current set of records and broadcasts [SourcesChanged] when it is updated.
#[derive(Debug)]
pub struct SourceIndex {
    all: SourceFileMap,
    sender: broadcast::Sender<SourcesChanged>,
}

impl Default for SourceIndex {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            all: SourceFileMap::new(),
            sender,
        }
    }
}

impl SourceIndex {
    pub fn subscribe(&self) -> broadcast::Receiver<SourcesChanged> {
        self.sender.subscribe()
    }

    pub fn all(&self) -> &SourceFileMap {
        &self.all
    }

    /// Replaces the known records with `all`. Nothing is emitted when `changed` is empty.
    pub fn update(&mut self, changed: SourceFileMap, all: SourceFileMap) -> Option<SourcesChanged> {
        self.all = all;
        let changed: SourceFileMap = changed
            .into_iter()
            .filter(|(_, records)| !records.is_empty())
            .collect();
        if changed.is_empty() {
            return None;
        }

        let event = SourcesChanged {
            changed,
            all: self.all.clone(),
        };
        debug!("Sources changed {:?}", event.changed);
        let _ = self.sender.send(event.clone());
        Some(event)
    }
}
