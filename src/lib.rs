pub mod app;
pub mod asset_cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod remote;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod ui;

#[cfg(test)]
mod testing;

pub use app::{router, store_router};
pub use config::{AppConfig, StoreConfig};
pub use session::Session;
pub use state::{AppState, StoreState};
