use std::sync::Arc;

use actix_web::{web::Data, App, HttpServer};
use log::{error, info, warn};

use picky_poll::clock::{Clock, SystemClock};
use picky_poll::config::Config;
use picky_poll::operations::PollOperations;
use picky_poll::paths;
use picky_poll::registry::PollRegistry;
use picky_poll::store::{log_persistence_error, FileBlobStore, PollStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(PollRegistry::new());
    let blobs = Arc::new(FileBlobStore::new(config.state_dir.clone()));
    let store = Arc::new(PollStore::new(blobs, config.retention, clock.clone()));

    if let Err(e) = store.load(&registry).await {
        warn!("starting with empty poll state: {}", e);
    }

    let ops = PollOperations::new(registry.clone(), store.clone(), clock);
    info!("listening addr={}", config.bind_addr);

    let app = move || {
        App::new()
            .app_data(Data::new(ops.clone()))
            .configure(paths::config::<PollOperations>)
    };
    HttpServer::new(app)
        .bind(&config.bind_addr)?
        .run()
        .await?;

    if let Err(e) = store.save(&registry).await {
        log_persistence_error(&e);
    }
    Ok(())
}
