//! Keeps the in-memory entries, the local cache and the remote store in step.
//!
//! At boot the coordinator tries each [`BootSource`] in order until the store
//! holds data. Afterwards every mutation is written to the local cache right
//! away and pushed to the remote after a quiet period, so a burst of edits
//! turns into a single `PUT`.

use crate::errors::HealthError;
use crate::models::Entry;
use crate::remote::RemoteStore;
use crate::storage::{LocalCache, SeedFile};
use crate::store::EntryStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

pub const DEFAULT_PUSH_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncPhase {
    Offline,
    Syncing,
    Ok,
}

/// Display-only sync status. It never gates mutations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub phase: SyncPhase,
    pub last_synced: Option<DateTime<Utc>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Offline,
            last_synced: None,
        }
    }
}

fn mark(status: &watch::Sender<SyncState>, phase: SyncPhase) {
    status.send_modify(|state| {
        state.phase = phase;
        if phase == SyncPhase::Ok {
            state.last_synced = Some(Utc::now());
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootSource {
    Remote,
    LocalCache,
    Seed,
}

pub const BOOT_ORDER: [BootSource; 3] =
    [BootSource::Remote, BootSource::LocalCache, BootSource::Seed];

#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    /// The source that supplied the data, if any did.
    pub source: Option<BootSource>,
    pub entries: usize,
    pub sync: SyncState,
}

/// Remote entries win outright; local entries survive only on dates the
/// remote does not have.
pub fn reconcile(remote: Vec<Entry>, local: &[Entry]) -> Vec<Entry> {
    let mut by_date: BTreeMap<NaiveDate, Entry> = remote
        .into_iter()
        .map(|entry| (entry.date, entry))
        .collect();
    for entry in local {
        by_date.entry(entry.date).or_insert_with(|| entry.clone());
    }
    by_date.into_values().collect()
}

async fn push_now<R: RemoteStore>(
    remote: &R,
    status: &watch::Sender<SyncState>,
    entries: &[Entry],
) -> bool {
    mark(status, SyncPhase::Syncing);
    match remote.store_all(entries).await {
        Ok(count) => {
            mark(status, SyncPhase::Ok);
            info!("pushed {count} entries to remote");
            true
        }
        Err(err) => {
            mark(status, SyncPhase::Offline);
            warn!("push failed (offline?): {err}");
            false
        }
    }
}

/// A single pending push that is replaced, not stacked, on reschedule.
///
/// The entries sent are read from `collection` when the push fires, so
/// anything installed while it waited (a pull, an import) goes out with it.
struct DebouncedPush<R> {
    remote: Arc<R>,
    status: Arc<watch::Sender<SyncState>>,
    collection: watch::Receiver<Vec<Entry>>,
    delay: Duration,
    pending: Option<oneshot::Sender<()>>,
}

impl<R: RemoteStore> DebouncedPush<R> {
    fn schedule(&mut self) {
        // Dropping the old sender wakes the waiting task, which then gives up.
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        self.pending = Some(cancel_tx);

        let remote = Arc::clone(&self.remote);
        let status = Arc::clone(&self.status);
        let collection = self.collection.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => {
                    debug!("pending push superseded");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            // Past this point the push is committed and can no longer be cancelled.
            drop(cancel_rx);
            let entries = collection.borrow().clone();
            push_now(remote.as_ref(), &status, &entries).await;
        });
    }

    fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Fires a still-waiting push immediately.
    async fn flush(&mut self) {
        if !self.is_pending() {
            return;
        }
        self.pending = None;
        let entries = self.collection.borrow().clone();
        push_now(self.remote.as_ref(), &self.status, &entries).await;
    }
}

/// The network half of a pull. It owns everything it needs, so callers can
/// run it without holding on to the store.
pub struct RemoteFetch<R> {
    remote: Arc<R>,
    status: Arc<watch::Sender<SyncState>>,
}

impl<R: RemoteStore> RemoteFetch<R> {
    pub async fn run(self) -> Result<Vec<Entry>, HealthError> {
        mark(&self.status, SyncPhase::Syncing);
        let fetched = self.remote.fetch_all().await;
        if fetched.is_err() {
            mark(&self.status, SyncPhase::Offline);
        }
        fetched
    }
}

pub struct SyncCoordinator<R> {
    remote: Arc<R>,
    cache: LocalCache,
    seed: SeedFile,
    status: Arc<watch::Sender<SyncState>>,
    collection: watch::Sender<Vec<Entry>>,
    push: DebouncedPush<R>,
}

impl<R: RemoteStore> SyncCoordinator<R> {
    pub fn new(remote: R, cache: LocalCache, seed: SeedFile, push_delay: Duration) -> Self {
        let remote = Arc::new(remote);
        let status = Arc::new(watch::Sender::new(SyncState::default()));
        let collection = watch::Sender::new(Vec::new());
        let push = DebouncedPush {
            remote: Arc::clone(&remote),
            status: Arc::clone(&status),
            collection: collection.subscribe(),
            delay: push_delay,
            pending: None,
        };
        Self {
            remote,
            cache,
            seed,
            status,
            collection,
            push,
        }
    }

    pub fn state(&self) -> SyncState {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.status.subscribe()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn remote_fetch(&self) -> RemoteFetch<R> {
        RemoteFetch {
            remote: Arc::clone(&self.remote),
            status: Arc::clone(&self.status),
        }
    }

    /// Populates `store` from the first boot source that has data.
    ///
    /// Never fails: with every source unavailable the store is left as it was,
    /// which for a first boot means empty.
    pub async fn boot(&mut self, store: &mut EntryStore) -> BootReport {
        let fetched = self.remote_fetch().run().await;
        self.boot_from(store, fetched).await
    }

    /// Runs the boot sequence with a remote fetch that already completed.
    pub async fn boot_from(
        &mut self,
        store: &mut EntryStore,
        fetched: Result<Vec<Entry>, HealthError>,
    ) -> BootReport {
        let mut fetched = Some(fetched);
        let mut source = None;
        for candidate in BOOT_ORDER {
            let attempt = match candidate {
                BootSource::Remote => match fetched.take() {
                    Some(Ok(remote)) => Ok(self.install_pulled(store, remote).await),
                    Some(Err(err)) => Err(err),
                    None => Ok(0),
                },
                BootSource::LocalCache => self.load_cache(store).await,
                BootSource::Seed => self.load_seed(store).await,
            };
            match attempt {
                Ok(count) if count > 0 => {
                    source = Some(candidate);
                    break;
                }
                Ok(_) => debug!("{candidate:?} had no entries"),
                Err(err) => warn!("{candidate:?} unavailable: {err}"),
            }
            if !store.is_empty() {
                break;
            }
        }

        info!(
            "boot finished with {} entries ({} with weight)",
            store.len(),
            store.iter().filter(|e| e.weight.is_some()).count()
        );
        BootReport {
            source,
            entries: store.len(),
            sync: self.state(),
        }
    }

    /// Reconciles a fetched remote collection into `store`.
    async fn install_pulled(&self, store: &mut EntryStore, remote: Vec<Entry>) -> usize {
        let pulled = remote.len();
        if pulled > 0 {
            let merged = reconcile(remote, &store.all());
            store.replace_all(merged);
            self.publish(store);
            if let Err(err) = self.cache.save(&store.all()).await {
                error!("failed to write local cache: {err}");
            }
        }
        mark(&self.status, SyncPhase::Ok);
        info!("pulled {pulled} entries from remote");
        pulled
    }

    async fn load_cache(&self, store: &mut EntryStore) -> Result<usize, HealthError> {
        match self.cache.load().await? {
            Some(entries) if entries.iter().any(|e| e.weight.is_some()) => {
                let count = entries.len();
                store.replace_all(entries);
                self.publish(store);
                info!("loaded {count} entries from local cache");
                Ok(count)
            }
            Some(_) => {
                warn!("local cache empty or without weight readings, will re-seed");
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn load_seed(&mut self, store: &mut EntryStore) -> Result<usize, HealthError> {
        let entries = self.seed.load().await?;
        store.replace_all(entries);
        info!("seeded {} entries from {}", store.len(), self.seed.path().display());
        self.changed(store).await;
        Ok(store.len())
    }

    fn publish(&self, store: &EntryStore) {
        self.collection.send_replace(store.all());
    }

    /// Called after every store mutation: cache now, remote after the quiet period.
    pub async fn changed(&mut self, store: &EntryStore) {
        let snapshot = store.all();
        self.collection.send_replace(snapshot.clone());
        if let Err(err) = self.cache.save(&snapshot).await {
            error!("failed to write local cache: {err}");
        }
        self.push.schedule();
    }

    pub fn push_pending(&self) -> bool {
        self.push.is_pending()
    }

    pub async fn shutdown(&mut self, store: &EntryStore) {
        if self.push_pending() {
            info!("flushing pending push before shutdown");
        }
        self.publish(store);
        self.push.flush().await;
    }
}
