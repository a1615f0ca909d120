use crate::errors::HealthError;
use crate::models::Entry;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;

/// The remote copy of the full entry collection.
///
/// Any transport failure or non-2xx answer is reported as
/// [`HealthError::RemoteUnavailable`].
pub trait RemoteStore: Send + Sync + 'static {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Entry>, HealthError>> + Send;

    /// Replaces the remote collection, returning how many entries it now holds.
    fn store_all(
        &self,
        entries: &[Entry],
    ) -> impl Future<Output = Result<usize, HealthError>> + Send;
}

#[derive(Debug, Deserialize)]
struct PushReceipt {
    count: usize,
}

/// Talks to a `healthos-store` compatible endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    http: Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self, HealthError> {
        let http = Client::builder()
            .build()
            .map_err(|err| {
                HealthError::InvalidConfig(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn data_url(&self) -> String {
        format!("{}/api/data", self.base_url)
    }
}

impl RemoteStore for HttpRemote {
    async fn fetch_all(&self) -> Result<Vec<Entry>, HealthError> {
        let resp = self
            .http
            .get(self.data_url())
            .send()
            .await
            .map_err(HealthError::remote)?;
        if !resp.status().is_success() {
            return Err(HealthError::remote(format!("GET /api/data returned {}", resp.status())));
        }
        resp.json().await.map_err(HealthError::remote)
    }

    async fn store_all(&self, entries: &[Entry]) -> Result<usize, HealthError> {
        let resp = self
            .http
            .put(self.data_url())
            .json(entries)
            .send()
            .await
            .map_err(HealthError::remote)?;
        if !resp.status().is_success() {
            return Err(HealthError::remote(format!("PUT /api/data returned {}", resp.status())));
        }
        let receipt: PushReceipt = resp.json().await.map_err(HealthError::remote)?;
        Ok(receipt.count)
    }
}
