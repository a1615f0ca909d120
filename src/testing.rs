//! Test doubles shared by the unit tests.

use crate::errors::HealthError;
use crate::models::Entry;
use crate::remote::RemoteStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("healthos_{prefix}_{}_{}", std::process::id(), nanos));
    std::fs::create_dir_all(&path).unwrap();
    path
}

/// In-memory remote that records every push it receives.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    entries: Mutex<Vec<Entry>>,
    pushes: Mutex<Vec<Vec<Entry>>>,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        let remote = Self::default();
        remote.set_offline(true);
        remote
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Replaces the remote contents as another device would.
    pub fn set_entries(&self, entries: Vec<Entry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn pushes(&self) -> Vec<Vec<Entry>> {
        self.pushes.lock().unwrap().clone()
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch_all(&self) -> Result<Vec<Entry>, HealthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(HealthError::remote("connection refused"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn store_all(&self, entries: &[Entry]) -> Result<usize, HealthError> {
        self.pushes.lock().unwrap().push(entries.to_vec());
        if self.offline.load(Ordering::SeqCst) {
            return Err(HealthError::remote("connection refused"));
        }
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(entries.len())
    }
}
