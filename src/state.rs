use crate::models::Entry;
use crate::remote::HttpRemote;
use crate::session::Session;
use crate::sync::SyncState;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{watch, Mutex};

pub type DashboardSession = Session<HttpRemote>;

/// Shared state of the dashboard process.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<DashboardSession>>,
    /// Readable without the session lock, which a refresh may hold.
    pub status: watch::Receiver<SyncState>,
}

impl AppState {
    pub fn new(session: DashboardSession) -> Self {
        let status = session.subscribe();
        Self {
            session: Arc::new(Mutex::new(session)),
            status,
        }
    }
}

/// Shared state of the remote store process.
#[derive(Clone)]
pub struct StoreState {
    pub data_path: PathBuf,
    pub entries: Arc<Mutex<Vec<Entry>>>,
}

impl StoreState {
    pub fn new(data_path: PathBuf, entries: Vec<Entry>) -> Self {
        Self {
            data_path,
            entries: Arc::new(Mutex::new(entries)),
        }
    }
}
