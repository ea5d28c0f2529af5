use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::fs;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::poll::Poll;
use crate::registry::PollRegistry;

#[cfg(test)]
use mockall::automock;

pub const SNAPSHOT_NAME: &str = "polls.json";

#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    Serialization(serde_json::Error),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "poll state i/o failed: {}", e),
            PersistenceError::Serialization(e) => write!(f, "poll state is not valid: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<io::Error> for PersistenceError {
    fn from(e: io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialization(e)
    }
}

/// Durable byte storage keyed by name.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing has been written under `name`.
    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;
    async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Blobs as files in one directory. Writes go through a temporary sibling
/// and a rename so a crash never leaves a half-written snapshot.
#[derive(Clone, Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> FileBlobStore {
        FileBlobStore { dir: dir.into() }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let staged = self.dir.join(format!("{}.tmp", name));
        fs::write(&staged, bytes).await?;
        fs::rename(&staged, self.dir.join(name)).await
    }
}

/// Which polls survive a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    KeepAll,
    /// Drop polls whose end time is older than the window.
    PurgeAfter(Duration),
}

impl Default for Retention {
    fn default() -> Self {
        Retention::KeepAll
    }
}

/// Saves and loads the whole registry as one pretty-printed JSON snapshot.
pub struct PollStore {
    blobs: Arc<dyn BlobStore>,
    retention: Retention,
    clock: Arc<dyn Clock>,
    save_lock: Mutex<()>,
}

impl PollStore {
    pub fn new(blobs: Arc<dyn BlobStore>, retention: Retention, clock: Arc<dyn Clock>) -> PollStore {
        PollStore {
            blobs,
            retention,
            clock,
            save_lock: Mutex::new(()),
        }
    }

    /// Writes the registry, applying retention first. Returns the number of polls saved.
    pub async fn save(&self, registry: &PollRegistry) -> Result<usize, PersistenceError> {
        let _saving = self.save_lock.lock().await;

        if let Retention::PurgeAfter(window) = self.retention {
            let purged = registry.purge_ended_before(self.clock.now() - window).await;
            if !purged.is_empty() {
                info!("purged expired polls poll_ids={:?}", purged);
            }
        }

        let snapshot = registry.snapshot().await;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        self.blobs.write(SNAPSHOT_NAME, &bytes).await?;

        info!("saved poll state name={} poll_count={}", SNAPSHOT_NAME, snapshot.len());
        Ok(snapshot.len())
    }

    /// Replaces the registry with the stored snapshot. A missing snapshot
    /// leaves the registry untouched.
    pub async fn load(&self, registry: &PollRegistry) -> Result<usize, PersistenceError> {
        let bytes = match self.blobs.read(SNAPSHOT_NAME).await? {
            Some(bytes) => bytes,
            None => {
                info!("no existing poll state found name={}", SNAPSHOT_NAME);
                return Ok(0);
            }
        };

        let snapshot: BTreeMap<String, Poll> = serde_json::from_slice(&bytes)?;
        let count = registry.restore(snapshot).await;

        info!("loaded poll state name={} poll_count={}", SNAPSHOT_NAME, count);
        Ok(count)
    }
}

pub fn log_persistence_error(e: &PersistenceError) {
    error!("failed to persist poll state: {}", e);
    if let PersistenceError::Io(e) = e {
        error!("{:?}", e.kind());
    }
}
