/// Shared application state passed to axum handlers.
use std::sync::Arc;

use taskboard_core::storage::DocumentStore;
use tokio::sync::broadcast;

use crate::config::{ServerConfig, StorageKind};
use crate::events::BoardEvent;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub event_tx: broadcast::Sender<BoardEvent>,
    pub port: u16,
    pub bind_address: String,
    pub storage: StorageKind,
}

impl AppState {
    pub fn new(documents: Arc<dyn DocumentStore>, config: &ServerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            sessions: Arc::new(SessionRegistry::new(documents, event_tx.clone())),
            event_tx,
            port: config.port,
            bind_address: config.bind_address.clone(),
            storage: config.storage,
        }
    }
}
