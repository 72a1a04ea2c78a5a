//! File backed collaborator used by the CLI.
//!  - A metrics producer writes the whole state into a JSON snapshot file.
//!  - [SnapshotFeed] keeps the last snapshot it managed to read and, on every
//!    [SnapshotFeed::reload], tells subscribers which users and sources were added, removed or
//!    changed.
//!  - [UserFeed] and [SourceFeed] expose the feed as [RemoteKeySource]s for the two synced stores.

pub mod entities;

use std::{
    collections::{BTreeMap, BTreeSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Result};
use entities::{record_id, SnapshotEntity};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, BufReader},
    sync::{
        broadcast,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
};
use tracing::{debug, info, instrument};

use crate::{
    sources::{insert_record, SourceFileMap, SourceIndex, SourcesChanged},
    store::{
        metrics::{SourceRecord, UserRecord},
        synced::{KeyEvent, RemoteKeySource},
    },
};

type Subscribers = Vec<UnboundedSender<KeyEvent<String>>>;

#[derive(Default)]
struct FeedState {
    snapshot: SnapshotEntity,
    users: Subscribers,
    sources: Subscribers,
    index: SourceIndex,
}

pub struct SnapshotFeed {
    path: PathBuf,
    state: Mutex<FeedState>,
}

impl SnapshotFeed {
    /// Opens a feed for `path`. A missing file is treated as an empty snapshot, a broken one is
    /// an error.
    pub async fn open(path: PathBuf) -> Result<Arc<Self>> {
        let snapshot = read_snapshot(&path).await?.unwrap_or_else(|| {
            info!("Snapshot {path:?} doesn't exist yet, starting empty");
            SnapshotEntity::default()
        });
        let feed = Self::from_snapshot(path, SnapshotEntity::default());
        feed.replace(snapshot)?;
        Ok(feed)
    }

    /// Feed that starts with `snapshot` and never touched the file system.
    pub fn from_snapshot(path: PathBuf, snapshot: SnapshotEntity) -> Arc<Self> {
        Arc::new(Self {
            path,
            state: Mutex::new(FeedState {
                snapshot,
                ..Default::default()
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> Result<MutexGuard<'_, FeedState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Snapshot feed state is poisoned"))
    }

    /// Reads the file again and publishes the difference. When the file can't be read the last
    /// good snapshot stays in place and the error is returned.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        match read_snapshot(&self.path).await? {
            Some(snapshot) => self.replace(snapshot),
            None => Err(anyhow!("Snapshot {:?} disappeared", self.path)),
        }
    }

    /// Swaps the current snapshot and notifies subscribers. Subscribers see the events in the same
    /// critical section the snapshot changes in, so enumeration never misses an event.
    pub fn replace(&self, snapshot: SnapshotEntity) -> Result<()> {
        let mut state = self.state()?;
        let previous = std::mem::replace(&mut state.snapshot, snapshot);
        let current = &state.snapshot;

        let source_events = diff_keys(&previous.sources, &current.sources);
        let changed_sources = source_events
            .iter()
            .map(|event| match event {
                KeyEvent::Added(key) | KeyEvent::Removed(key) | KeyEvent::Changed(key) => {
                    key.as_str()
                }
            })
            .collect::<BTreeSet<_>>();

        let mut user_events = diff_keys(&previous.users, &current.users);
        for (username, series) in current.users.iter() {
            let touched = user_events.iter().any(|event| match event {
                KeyEvent::Added(key) | KeyEvent::Changed(key) => key == username,
                KeyEvent::Removed(_) => false,
            });
            if !touched
                && series
                    .iter()
                    .any(|entity| changed_sources.contains(entity.source.as_str()))
            {
                user_events.push(KeyEvent::Changed(username.clone()));
            }
        }

        let (changed, all) = record_changes(&previous, current);
        debug!(
            "Snapshot replaced: {} user events, {} source events",
            user_events.len(),
            source_events.len()
        );

        publish(&mut state.sources, source_events);
        publish(&mut state.users, user_events);
        state.index.update(changed, all);
        Ok(())
    }

    /// Drops every subscriber, as if the producer went away.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state()?;
        state.users.clear();
        state.sources.clear();
        Ok(())
    }

    pub fn subscribe_sources_changed(&self) -> Result<broadcast::Receiver<SourcesChanged>> {
        Ok(self.state()?.index.subscribe())
    }

    /// Every record of the current snapshot, grouped by source.
    pub fn records(&self) -> Result<SourceFileMap> {
        Ok(self.state()?.index.all().clone())
    }

    pub fn snapshot(&self) -> Result<SnapshotEntity> {
        Ok(self.state()?.snapshot.clone())
    }
}

async fn read_snapshot(path: &Path) -> Result<Option<SnapshotEntity>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;
    let mut reader = BufReader::new(file);
    let mut content = String::new();
    let read = reader.read_to_string(&mut content).await;
    reader.into_inner().unlock_async().await?;
    read?;

    let snapshot = serde_json::from_str::<SnapshotEntity>(&content)
        .map_err(|e| anyhow!("Snapshot {path:?} is malformed: {e}"))?;
    Ok(Some(snapshot))
}

fn diff_keys<V: PartialEq>(
    previous: &BTreeMap<String, V>,
    current: &BTreeMap<String, V>,
) -> Vec<KeyEvent<String>> {
    let removed = previous
        .keys()
        .filter(|key| !current.contains_key(*key))
        .map(|key| KeyEvent::Removed(key.clone()));
    let added_or_changed = current
        .iter()
        .filter_map(|(key, value)| match previous.get(key) {
            None => Some(KeyEvent::Added(key.clone())),
            Some(old) if old != value => Some(KeyEvent::Changed(key.clone())),
            Some(_) => None,
        });
    removed.chain(added_or_changed).collect()
}

/// Returns records that are new or modified, and all current records.
fn record_changes(
    previous: &SnapshotEntity,
    current: &SnapshotEntity,
) -> (SourceFileMap, SourceFileMap) {
    let mut changed = SourceFileMap::new();
    let mut all = SourceFileMap::new();
    for (username, series) in current.users.iter() {
        for entity in series {
            let id = record_id(username, &entity.source);
            if previous.series(username, &entity.source) != Some(entity) {
                insert_record(&mut changed, &entity.source, id.clone());
            }
            insert_record(&mut all, &entity.source, id);
        }
    }
    (changed, all)
}

fn publish(subscribers: &mut Subscribers, events: Vec<KeyEvent<String>>) {
    for event in events {
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

fn subscribe(subscribers: &mut Subscribers) -> UnboundedReceiver<KeyEvent<String>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    subscribers.push(sender);
    receiver
}

/// Per-user view of a [SnapshotFeed].
#[derive(Clone)]
pub struct UserFeed(pub Arc<SnapshotFeed>);

impl RemoteKeySource for UserFeed {
    type Key = String;
    type Value = UserRecord;

    fn subscribe(&self) -> Result<UnboundedReceiver<KeyEvent<String>>> {
        Ok(subscribe(&mut self.0.state()?.users))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.0.state()?.snapshot.users.keys().cloned().collect())
    }

    fn bind(&self, key: &String) -> Result<UserRecord> {
        self.0
            .state()?
            .snapshot
            .user_record(key)
            .ok_or_else(|| anyhow!("User {key} is not in the snapshot"))
    }
}

/// Per-source view of a [SnapshotFeed].
#[derive(Clone)]
pub struct SourceFeed(pub Arc<SnapshotFeed>);

impl RemoteKeySource for SourceFeed {
    type Key = String;
    type Value = SourceRecord;

    fn subscribe(&self) -> Result<UnboundedReceiver<KeyEvent<String>>> {
        Ok(subscribe(&mut self.0.state()?.sources))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.0.state()?.snapshot.sources.keys().cloned().collect())
    }

    fn bind(&self, key: &String) -> Result<SourceRecord> {
        self.0
            .state()?
            .snapshot
            .sources
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("Source {key} is not in the snapshot"))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::{SnapshotFeed, SourceFeed, UserFeed};
    use crate::{
        calendar::DailyValue,
        store::{metrics::UserLookup, synced::SyncedStore},
        utils::logging::TEST_LOGGING,
    };

    const FIRST: &str = r#"{
        "sources": {
            "steps": { "template": "%1 steps" },
            "calls": { "template": "%1 calls" }
        },
        "users": {
            "alice": [
                { "source": "steps", "anchor": "2001-01-07", "values": [100, null, 0] },
                { "source": "calls", "anchor": "2001-01-06", "values": [3] }
            ],
            "bob": [
                { "source": "steps", "anchor": "2001-01-07", "values": [5] }
            ]
        }
    }"#;

    const SECOND: &str = r#"{
        "sources": {
            "steps": { "template": "%1 steps walked" }
        },
        "users": {
            "alice": [
                { "source": "steps", "anchor": "2001-01-07", "values": [100, null, 0] }
            ],
            "carol": [
                { "source": "steps", "anchor": "2001-01-08", "values": [1] }
            ]
        }
    }"#;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn keys<S: super::RemoteKeySource<Key = String>>(store: &SyncedStore<S>) -> Vec<String> {
        store.keys().cloned().collect()
    }

    #[tokio::test]
    async fn test_open_and_bind_users() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        write(&path, FIRST);

        let feed = SnapshotFeed::open(path).await?;
        let mut users = SyncedStore::new(UserFeed(feed.clone()));

        assert_eq!(keys(&users), vec!["alice", "bob"]);
        let alice = users.find_user("alice");
        assert_eq!(alice.source_ids().collect::<Vec<_>>(), vec!["steps", "calls"]);
        let steps = alice.get("steps").unwrap();
        assert_eq!(steps.label_template(), "%1 steps");
        assert_eq!(
            steps.value_at(NaiveDate::from_ymd_opt(2001, 1, 6).unwrap()),
            DailyValue::Absent
        );
        assert_eq!(
            steps.value_at(NaiveDate::from_ymd_opt(2001, 1, 5).unwrap()),
            DailyValue::Value(0.)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() -> Result<()> {
        let dir = tempdir()?;
        let feed = SnapshotFeed::open(dir.path().join("nothing.json")).await?;
        let users = SyncedStore::new(UserFeed(feed.clone()));
        assert!(users.is_empty());
        assert!(feed.reload().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_publishes_differences() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        write(&path, FIRST);

        let feed = SnapshotFeed::open(path.clone()).await?;
        let mut users = SyncedStore::new(UserFeed(feed.clone()));
        let mut sources = SyncedStore::new(SourceFeed(feed.clone()));
        let mut changes = feed.subscribe_sources_changed()?;
        assert_eq!(keys(&sources), vec!["calls", "steps"]);

        write(&path, SECOND);
        feed.reload().await?;
        users.pump();
        sources.pump();

        assert_eq!(keys(&users), vec!["alice", "carol"]);
        assert_eq!(keys(&sources), vec!["steps"]);
        assert_eq!(
            sources.get_by_key(&"steps".into()).unwrap().template,
            "%1 steps walked"
        );

        // alice lost her calls series and steps got a new template.
        let alice = users.find_user("alice");
        assert_eq!(alice.len(), 1);
        assert_eq!(alice.get("steps").unwrap().label_template(), "%1 steps walked");

        let change = changes.try_recv()?;
        assert_eq!(
            change.changed["steps"].iter().collect::<Vec<_>>(),
            vec!["carol/steps"]
        );
        assert_eq!(change.all["steps"].len(), 2);
        assert!(!change.all.contains_key("calls"));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_reload_keeps_last_snapshot() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        write(&path, FIRST);

        let feed = SnapshotFeed::open(path.clone()).await?;
        let mut users = SyncedStore::new(UserFeed(feed.clone()));

        write(&path, "{ not json");
        assert!(feed.reload().await.is_err());
        assert_eq!(users.pump(), 0);
        assert_eq!(keys(&users), vec!["alice", "bob"]);
        assert_eq!(feed.snapshot()?.users.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_feed_keeps_store_state() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        write(&path, FIRST);

        let feed = SnapshotFeed::open(path.clone()).await?;
        let mut users = SyncedStore::new(UserFeed(feed.clone()));

        feed.close()?;
        write(&path, SECOND);
        feed.reload().await?;
        users.pump();
        assert!(!users.is_connected());
        assert_eq!(keys(&users), vec!["alice", "bob"]);

        assert!(users.reconnect());
        assert_eq!(keys(&users), vec!["alice", "carol"]);
        assert_eq!(users.find_user("alice").len(), 1);
        Ok(())
    }
}
