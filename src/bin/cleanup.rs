use std::{
    error::Error,
    sync::Arc,
};

use chrono::Duration;
use log::info;

use picky_poll::clock::{Clock, SystemClock};
use picky_poll::config::Config;
use picky_poll::registry::PollRegistry;
use picky_poll::store::{FileBlobStore, PollStore, Retention};

const DEFAULT_RETENTION_DAYS: i64 = 7;

#[tokio::main]
async fn main() {
    env_logger::init();
    sweep()
        .await
        .expect("Failed to run cleanup.")
}

async fn sweep() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    let retention = match config.retention {
        Retention::KeepAll => Retention::PurgeAfter(Duration::days(DEFAULT_RETENTION_DAYS)),
        retention => retention,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = PollRegistry::new();
    let store = PollStore::new(Arc::new(FileBlobStore::new(config.state_dir)), retention, clock);

    let loaded = store.load(&registry).await?;
    let saved = store.save(&registry).await?;

    info!("Deleted {} polls", loaded.saturating_sub(saved));

    Ok(())
}
