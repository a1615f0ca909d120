use crate::config::{AppConfig, MetricsConfig};
use crate::errors::HealthError;
use crate::metrics::{build_dashboard, ChartRange};
use crate::models::{Dashboard, Entry};
use crate::remote::RemoteStore;
use crate::storage::{LocalCache, SeedFile};
use crate::store::EntryStore;
use crate::sync::{BootReport, RemoteFetch, SyncCoordinator, SyncState};
use crate::transfer::{export_document, parse_import, ExportDocument};
use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::info;

/// Everything one running dashboard owns: the entries, the sync machinery and
/// the current chart selection. All mutations go through here so that each
/// one reaches the local cache and the remote.
pub struct Session<R> {
    store: EntryStore,
    sync: SyncCoordinator<R>,
    metrics: MetricsConfig,
    range: ChartRange,
}

impl<R: RemoteStore> Session<R> {
    pub fn new(config: &AppConfig, remote: R) -> Self {
        let sync = SyncCoordinator::new(
            remote,
            LocalCache::new(&config.data_dir, &config.cache_key),
            SeedFile::new(&config.seed_path),
            config.push_delay,
        );
        Self {
            store: EntryStore::new(),
            sync,
            metrics: config.metrics.clone(),
            range: config.chart_range,
        }
    }

    pub async fn boot(&mut self) -> BootReport {
        self.sync.boot(&mut self.store).await
    }

    /// The remote half of a refresh (the only retry the dashboard offers),
    /// runnable while the session is not borrowed.
    pub fn remote_fetch(&self) -> RemoteFetch<R> {
        info!("refresh requested");
        self.sync.remote_fetch()
    }

    /// Re-runs the boot sequence with the outcome of [`Self::remote_fetch`].
    pub async fn finish_refresh(
        &mut self,
        fetched: Result<Vec<Entry>, HealthError>,
    ) -> BootReport {
        self.sync.boot_from(&mut self.store, fetched).await
    }

    /// Records measurements for a day, keeping fields the entry leaves out.
    pub async fn log_entry(&mut self, entry: Entry) -> Entry {
        let date = entry.date;
        self.store.upsert(entry);
        self.sync.changed(&self.store).await;
        self.store
            .get(date)
            .cloned()
            .unwrap_or_else(|| Entry::new(date))
    }

    /// Replaces every entry with the document's contents. A rejected document
    /// leaves the session untouched.
    pub async fn import(&mut self, document: &str) -> Result<usize, HealthError> {
        let entries = parse_import(document)?;
        self.store.replace_all(entries);
        self.sync.changed(&self.store).await;
        info!("imported {} entries", self.store.len());
        Ok(self.store.len())
    }

    pub fn export(&self, today: NaiveDate) -> Result<ExportDocument, HealthError> {
        export_document(&self.store.all(), today)
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.store.all()
    }

    pub fn set_range(&mut self, range: ChartRange) {
        self.range = range;
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.sync.subscribe()
    }

    pub fn dashboard(&self) -> Dashboard {
        build_dashboard(&self.store.all(), &self.metrics, self.range, self.sync_state())
    }

    pub async fn shutdown(&mut self) {
        self.sync.shutdown(&self.store).await;
    }
}
