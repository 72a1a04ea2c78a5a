use std::{
    collections::HashSet,
    fmt::Debug,
    hash::Hash,
    ops::{Deref, DerefMut},
};

use anyhow::Result;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};
use tracing::{debug, info, warn};

use super::KeyedStore;

/// Change of the remote key set. Events for the same key must arrive in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent<K> {
    Added(K),
    Removed(K),
    /// The remote entity behind an existing key was replaced by its producer.
    Changed(K),
}

/// External collaborator that owns the real key set. The wire format behind it is its own
/// business, the store only sees keys and the values bound to them.
pub trait RemoteKeySource {
    type Key: Clone + Eq + Hash + Debug;
    type Value: Default;

    /// Starts delivering [KeyEvent]s. Events that happen while [RemoteKeySource::list_keys] runs
    /// must end up in the returned receiver.
    fn subscribe(&self) -> Result<UnboundedReceiver<KeyEvent<Self::Key>>>;

    fn list_keys(&self) -> Result<Vec<Self::Key>>;

    /// Materializes the local value for a remote entity.
    fn bind(&self, key: &Self::Key) -> Result<Self::Value>;
}

/// When the initial key set is enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapMode {
    /// Enumerate inside the constructor.
    #[default]
    Immediate,
    /// Subscribe in the constructor and enumerate on the first [SyncedStore::pump].
    Deferred,
}

/// [KeyedStore] that mirrors the key set of a [RemoteKeySource].
///
/// The store is meant to be owned by a single context. Events produced by the collaborator are
/// queued in a channel and only applied when the owner calls [SyncedStore::pump] (or awaits
/// [SyncedStore::next_event]), so they never interleave with a read of the store.
///
/// Lookups through the arena may insert local placeholders for keys the collaborator doesn't
/// know yet. Such a placeholder is replaced by the bound value once the key is added remotely.
pub struct SyncedStore<S: RemoteKeySource> {
    source: S,
    store: KeyedStore<S::Key, S::Value>,
    /// Keys whose value came from [RemoteKeySource::bind].
    bound: HashSet<S::Key>,
    events: Option<UnboundedReceiver<KeyEvent<S::Key>>>,
    bootstrapped: bool,
}

impl<S: RemoteKeySource> SyncedStore<S> {
    pub fn new(source: S) -> Self {
        Self::with_mode(source, BootstrapMode::default())
    }

    pub fn with_mode(source: S, mode: BootstrapMode) -> Self {
        let mut synced = Self {
            source,
            store: KeyedStore::new(),
            bound: HashSet::new(),
            events: None,
            bootstrapped: false,
        };
        synced.connect();
        if mode == BootstrapMode::Immediate {
            synced.bootstrap();
        }
        synced
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_connected(&self) -> bool {
        self.events.is_some()
    }

    fn connect(&mut self) {
        match self.source.subscribe() {
            Ok(receiver) => self.events = Some(receiver),
            Err(e) => warn!("Failed to subscribe to remote key source, keeping local state: {e:?}"),
        }
    }

    /// Enumerates the current remote keys. Subscription has to happen before this, otherwise
    /// keys that change during enumeration would be lost.
    fn bootstrap(&mut self) -> bool {
        let keys = match self.source.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to enumerate remote keys, keeping local state: {e:?}");
                return false;
            }
        };
        debug!("Bootstrapping synced store with {} keys", keys.len());
        for key in keys {
            self.add(key);
        }
        self.bootstrapped = true;
        true
    }

    /// Binds a key the collaborator reported. Keys that are already bound are ignored, a local
    /// placeholder under the same key is replaced in place.
    fn add(&mut self, key: S::Key) {
        if self.bound.contains(&key) {
            return;
        }
        self.rebind(key);
    }

    fn rebind(&mut self, key: S::Key) {
        match self.source.bind(&key) {
            Ok(value) => {
                self.store.insert(key.clone(), value);
                self.bound.insert(key);
            }
            Err(e) => warn!("Failed to bind remote entity {key:?}: {e:?}"),
        }
    }

    fn evict(&mut self, key: &S::Key) {
        self.store.remove(key);
        self.bound.remove(key);
    }

    /// Whether the value under `key` came from the collaborator rather than a local lookup.
    pub fn is_bound(&self, key: &S::Key) -> bool {
        self.bound.contains(key)
    }

    /// Applies a single event to the local store.
    pub fn apply(&mut self, event: KeyEvent<S::Key>) {
        debug!("Applying {event:?}");
        match event {
            KeyEvent::Added(key) => self.add(key),
            KeyEvent::Removed(key) => self.evict(&key),
            KeyEvent::Changed(key) => self.rebind(key),
        }
    }

    /// Applies every queued event in arrival order and returns how many were applied.
    pub fn pump(&mut self) -> usize {
        if !self.bootstrapped && self.is_connected() {
            self.bootstrap();
        }

        let mut applied = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return applied;
            };
            match events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    info!("Remote key source closed its event feed");
                    self.events = None;
                    return applied;
                }
            }
        }
    }

    /// Waits for the next event, applies it and returns it. Returns `None` once the feed is gone.
    pub async fn next_event(&mut self) -> Option<KeyEvent<S::Key>> {
        if !self.bootstrapped && self.is_connected() {
            self.bootstrap();
        }

        let event = self.events.as_mut()?.recv().await;
        match event {
            Some(event) => {
                self.apply(event.clone());
                Some(event)
            }
            None => {
                info!("Remote key source closed its event feed");
                self.events = None;
                None
            }
        }
    }

    /// Stops listening to the collaborator. The local state is kept as it is.
    pub fn disconnect(&mut self) {
        self.events = None;
    }

    /// Subscribes again and reconciles with the current remote key set. Keys that the
    /// collaborator does not list anymore are evicted and the rest are bound again. On failure the
    /// local state is kept.
    pub fn reconnect(&mut self) -> bool {
        self.connect();
        if !self.is_connected() {
            return false;
        }

        let keys = match self.source.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to enumerate remote keys on reconnect: {e:?}");
                self.events = None;
                return false;
            }
        };

        // Local placeholders were never remote, so only bound keys can go stale.
        let stale = self
            .bound
            .iter()
            .filter(|key| !keys.contains(*key))
            .cloned()
            .collect::<Vec<_>>();
        for key in stale {
            self.evict(&key);
        }
        // Values may have changed while nobody was listening.
        for key in keys {
            self.rebind(key);
        }
        self.bootstrapped = true;
        true
    }
}

impl<S: RemoteKeySource> Deref for SyncedStore<S> {
    type Target = KeyedStore<S::Key, S::Value>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<S: RemoteKeySource> DerefMut for SyncedStore<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}
