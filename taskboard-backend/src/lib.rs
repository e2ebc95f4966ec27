mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod log_bridge;
pub mod server;
pub mod sessions;
pub mod state;

use std::sync::Arc;

use taskboard_core::storage::local::LocalDocumentStore;
use taskboard_core::storage::memory::MemoryDocumentStore;
use taskboard_core::storage::DocumentStore;

use config::StorageKind;
use state::AppState;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = log_bridge::init() {
        eprintln!("failed to initialize backend logger: {}", e);
    }

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);

    let documents: Arc<dyn DocumentStore> = match config.storage {
        StorageKind::Memory => {
            log::info!("Using in-memory board storage");
            Arc::new(MemoryDocumentStore::new())
        }
        StorageKind::Local => {
            let dir = config.data_dir();
            let store = LocalDocumentStore::open(&dir)?;
            log::info!("Using board documents in {}", dir.display());
            Arc::new(store)
        }
    };

    let state = AppState::new(documents, &config);
    let sessions = state.sessions.clone();
    let (_port, server) = server::spawn_server(state).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down, flushing open boards");
    server.abort();
    sessions.close_all().await;
    Ok(())
}
