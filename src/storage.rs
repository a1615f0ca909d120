use crate::errors::HealthError;
use crate::models::Entry;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

pub const DEFAULT_CACHE_KEY: &str = "healthos_data_v2";
pub const STORE_FILE_NAME: &str = "healthos_data.json";

/// A single string-keyed slot on disk holding the serialized entry array.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been cached yet.
    pub async fn load(&self) -> Result<Option<Vec<Entry>>, HealthError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| HealthError::MalformedLocalCache(err.to_string()))
    }

    pub async fn save(&self, entries: &[Entry]) -> Result<(), HealthError> {
        let payload =
            serde_json::to_vec(entries).map_err(|err| HealthError::Io(err.into()))?;
        write_atomic(&self.path, &payload).await
    }
}

/// The bundled dataset used once when neither the remote nor the cache has data.
#[derive(Debug, Clone)]
pub struct SeedFile {
    path: PathBuf,
}

impl SeedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<Entry>, HealthError> {
        let bytes = fs::read(&self.path)
            .await
            .map_err(|err| {
                HealthError::SeedUnavailable(format!("{}: {err}", self.path.display()))
            })?;
        serde_json::from_slice(&bytes)
            .map_err(|err| HealthError::SeedUnavailable(format!("{}: {err}", self.path.display())))
    }
}

/// Writes through a sibling temp file and renames it into place.
pub async fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), HealthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub fn resolve_store_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(STORE_FILE_NAME)
}

/// Copies the seed file into place when the store has never been written.
pub async fn seed_if_empty(data_path: &Path, seed_path: &Path) -> Result<bool, HealthError> {
    if fs::try_exists(data_path).await? {
        return Ok(false);
    }
    if !fs::try_exists(seed_path).await? {
        info!("no seed data at {}, starting with an empty dataset", seed_path.display());
        return Ok(false);
    }
    if let Some(parent) = data_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::copy(seed_path, data_path).await?;
    info!("seeded {} from {}", data_path.display(), seed_path.display());
    Ok(true)
}

pub async fn load_store(path: &Path) -> Vec<Entry> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                error!("failed to parse data file: {err}");
                Vec::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            error!("failed to read data file: {err}");
            Vec::new()
        }
    }
}

pub async fn persist_store(path: &Path, entries: &[Entry]) -> Result<(), HealthError> {
    let payload = serde_json::to_vec_pretty(entries).map_err(|err| HealthError::Io(err.into()))?;
    write_atomic(path, &payload).await.inspect_err(|err| {
        warn!("failed to persist {}: {err}", path.display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn cache_round_trips_entries() {
        let dir = temp_dir("cache");
        let cache = LocalCache::new(&dir, DEFAULT_CACHE_KEY);
        assert!(cache.load().await.unwrap().is_none());

        let mut entry = Entry::new(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        entry.weight = Some(105.0);
        cache.save(&[entry.clone()]).await.unwrap();

        assert_eq!(cache.load().await.unwrap(), Some(vec![entry]));
        assert!(cache.path().ends_with("healthos_data_v2.json"));
    }

    #[tokio::test]
    async fn garbage_in_cache_is_reported_as_malformed() {
        let dir = temp_dir("cache-bad");
        let cache = LocalCache::new(&dir, "slot");
        write_atomic(cache.path(), b"{not json").await.unwrap();

        let err = cache.load().await.unwrap_err();
        assert!(matches!(err, HealthError::MalformedLocalCache(_)));
    }

    #[tokio::test]
    async fn seed_is_copied_only_once() {
        let dir = temp_dir("store-seed");
        let seed = dir.join("seed.json");
        let data = resolve_store_path(dir.join("volume"));
        write_atomic(&seed, br#"[{"date":"2025-10-01","weight":105}]"#)
            .await
            .unwrap();

        assert!(seed_if_empty(&data, &seed).await.unwrap());
        assert!(!seed_if_empty(&data, &seed).await.unwrap());
        assert_eq!(load_store(&data).await.len(), 1);
    }
}
