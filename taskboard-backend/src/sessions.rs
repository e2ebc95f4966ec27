//! Live board sessions keyed by user id.
//!
//! Each user has their own slot behind its own lock, so loading one
//! user's board never blocks requests for another. Lock order: the map
//! is only held to look up, reserve or remove a slot and never across an
//! await on a slot or the document store; a slot lock comes before the
//! session lock inside it.
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use taskboard_core::session::BoardSession;
use taskboard_core::storage::DocumentStore;
use taskboard_core::sync::{SyncController, SyncError, SyncState, WriteStatus};
use tokio::sync::{broadcast, Mutex};

use crate::events::{BoardEvent, UserNotifier};

pub type SharedSession = Arc<Mutex<BoardSession>>;

type SlotHandle = Arc<Mutex<SessionSlot>>;

enum SessionSlot {
    /// Reserved by a sign-in that has not finished loading.
    Pending,
    Live(SharedSession),
    /// Load failed; the controller is kept for a manual retry.
    Errored(SyncController),
    /// Signed out. The slot is no longer in the map.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No session for user {0}")]
    NotSignedIn(String),

    #[error("Board for user {user_id} is unavailable: {message}")]
    Unavailable { user_id: String, message: String },

    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub user_id: String,
    pub sync: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_status: Option<WriteStatus>,
}

impl SessionStatus {
    fn live(session: &BoardSession) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            sync: SyncState::Loaded {
                board_id: session.board().id.clone(),
            },
            revision: Some(session.revision()),
            created: session.created(),
            write_status: Some(session.write_status()),
        }
    }

    fn errored(user_id: &str, controller: &SyncController) -> Self {
        Self {
            user_id: user_id.to_string(),
            sync: controller.state().clone(),
            revision: None,
            created: false,
            write_status: None,
        }
    }
}

fn state_message(state: &SyncState) -> String {
    match state {
        SyncState::Errored { message } => message.clone(),
        other => format!("{:?}", other),
    }
}

fn unavailable(user_id: &str, controller: &SyncController) -> SessionError {
    SessionError::Unavailable {
        user_id: user_id.to_string(),
        message: state_message(controller.state()),
    }
}

pub struct SessionRegistry {
    documents: Arc<dyn DocumentStore>,
    event_tx: broadcast::Sender<BoardEvent>,
    slots: Mutex<HashMap<String, SlotHandle>>,
}

impl SessionRegistry {
    pub fn new(documents: Arc<dyn DocumentStore>, event_tx: broadcast::Sender<BoardEvent>) -> Self {
        Self {
            documents,
            event_tx,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn reserve(&self, user_id: &str) -> SlotHandle {
        self.slots
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionSlot::Pending)))
            .clone()
    }

    async fn existing(&self, user_id: &str) -> Option<SlotHandle> {
        self.slots.lock().await.get(user_id).cloned()
    }

    /// Load (or create) the user's board and start a session. Signing in
    /// again while a session is live returns that session's status.
    pub async fn sign_in(&self, user_id: &str) -> Result<SessionStatus, SessionError> {
        loop {
            let handle = self.reserve(user_id).await;
            let mut slot = handle.lock().await;
            match &*slot {
                SessionSlot::Live(session) => {
                    return Ok(SessionStatus::live(&*session.lock().await));
                }
                SessionSlot::Errored(controller) => return Err(unavailable(user_id, controller)),
                // Signed out while we waited; the next reserve gets a fresh slot.
                SessionSlot::Closed => continue,
                SessionSlot::Pending => {}
            }

            let notifier = Arc::new(UserNotifier::new(user_id, self.event_tx.clone()));
            let controller = SyncController::new(self.documents.clone(), notifier);
            return Self::start(&mut slot, user_id, controller, false).await;
        }
    }

    /// Manual retry after a failed load.
    pub async fn retry(&self, user_id: &str) -> Result<SessionStatus, SessionError> {
        let Some(handle) = self.existing(user_id).await else {
            return Err(SessionError::NotSignedIn(user_id.to_string()));
        };
        let mut slot = handle.lock().await;
        match std::mem::replace(&mut *slot, SessionSlot::Pending) {
            SessionSlot::Errored(controller) => {
                Self::start(&mut slot, user_id, controller, true).await
            }
            SessionSlot::Live(session) => {
                let status = SessionStatus::live(&*session.lock().await);
                *slot = SessionSlot::Live(session);
                Ok(status)
            }
            other => {
                *slot = other;
                Err(SessionError::NotSignedIn(user_id.to_string()))
            }
        }
    }

    async fn start(
        slot: &mut SessionSlot,
        user_id: &str,
        mut controller: SyncController,
        retry: bool,
    ) -> Result<SessionStatus, SessionError> {
        let loaded = if retry {
            controller.retry(user_id).await
        } else {
            controller.load(user_id).await
        };
        match loaded {
            Ok(loaded) => {
                let session = BoardSession::start(user_id, controller, loaded);
                let status = SessionStatus::live(&session);
                *slot = SessionSlot::Live(Arc::new(Mutex::new(session)));
                Ok(status)
            }
            Err(e) => {
                *slot = SessionSlot::Errored(controller);
                Err(e.into())
            }
        }
    }

    /// Handle to the user's live session.
    pub async fn session(&self, user_id: &str) -> Result<SharedSession, SessionError> {
        let Some(handle) = self.existing(user_id).await else {
            return Err(SessionError::NotSignedIn(user_id.to_string()));
        };
        let slot = handle.lock().await;
        match &*slot {
            SessionSlot::Live(session) => Ok(session.clone()),
            SessionSlot::Errored(controller) => Err(unavailable(user_id, controller)),
            SessionSlot::Pending | SessionSlot::Closed => {
                Err(SessionError::NotSignedIn(user_id.to_string()))
            }
        }
    }

    pub async fn status(&self, user_id: &str) -> Result<SessionStatus, SessionError> {
        let Some(handle) = self.existing(user_id).await else {
            return Err(SessionError::NotSignedIn(user_id.to_string()));
        };
        let slot = handle.lock().await;
        match &*slot {
            SessionSlot::Live(session) => Ok(SessionStatus::live(&*session.lock().await)),
            SessionSlot::Errored(controller) => Ok(SessionStatus::errored(user_id, controller)),
            SessionSlot::Pending | SessionSlot::Closed => {
                Err(SessionError::NotSignedIn(user_id.to_string()))
            }
        }
    }

    /// Users with a slot, including sign-ins still loading.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Drop the user's session after its pending write is flushed. Returns
    /// false when the user had no session.
    pub async fn sign_out(&self, user_id: &str) -> bool {
        let Some(handle) = self.existing(user_id).await else {
            return false;
        };
        let taken = {
            let mut slot = handle.lock().await;
            {
                let mut slots = self.slots.lock().await;
                if slots.get(user_id).is_some_and(|h| Arc::ptr_eq(h, &handle)) {
                    slots.remove(user_id);
                }
            }
            std::mem::replace(&mut *slot, SessionSlot::Closed)
        };
        match taken {
            SessionSlot::Live(session) => close_session(user_id, session).await,
            SessionSlot::Errored(_) => {}
            SessionSlot::Pending | SessionSlot::Closed => return false,
        }
        let _ = self.event_tx.send(BoardEvent::SignedOut {
            user_id: user_id.to_string(),
        });
        log::info!("[taskboard.sessions] Signed out user {}", user_id);
        true
    }

    /// Close every session; used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(String, SlotHandle)> = self.slots.lock().await.drain().collect();
        for (user_id, handle) in drained {
            let taken = std::mem::replace(&mut *handle.lock().await, SessionSlot::Closed);
            if let SessionSlot::Live(session) = taken {
                close_session(&user_id, session).await;
            }
        }
    }
}

async fn close_session(user_id: &str, session: SharedSession) {
    match Arc::try_unwrap(session) {
        Ok(session) => session.into_inner().close().await,
        Err(_) => {
            // A request still holds it; the writer flushes once that drops.
            log::warn!(
                "[taskboard.sessions] Session for user {} still in use at sign-out",
                user_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use taskboard_core::storage::memory::MemoryDocumentStore;
    use taskboard_core::storage::StoreError;
    use taskboard_core::store::BoardCommand;
    use taskboard_core::types::Board;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    fn registry() -> (Arc<MemoryDocumentStore>, SessionRegistry, broadcast::Receiver<BoardEvent>) {
        let docs = Arc::new(MemoryDocumentStore::new());
        let (tx, rx) = broadcast::channel(16);
        (docs.clone(), SessionRegistry::new(docs, tx), rx)
    }

    #[tokio::test]
    async fn test_sign_in_creates_board_once() {
        let (_docs, registry, mut events) = registry();
        let first = registry.sign_in("u1").await.unwrap();
        assert!(first.created);
        assert_eq!(first.revision, Some(0));

        match events.try_recv().unwrap() {
            BoardEvent::Notification { user_id, notification } => {
                assert_eq!(user_id, "u1");
                assert_eq!(notification.title, "Welcome to your board");
            }
            other => panic!("unexpected event {:?}", other),
        }

        let again = registry.sign_in("u1").await.unwrap();
        assert_eq!(again.sync, first.sync);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_load_then_retry() {
        let (docs, registry, _events) = registry();
        docs.set_offline(true);

        assert!(matches!(
            registry.sign_in("u1").await,
            Err(SessionError::Sync(SyncError::Fetch(_)))
        ));
        let status = registry.status("u1").await.unwrap();
        assert!(matches!(status.sync, SyncState::Errored { .. }));
        assert!(matches!(
            registry.session("u1").await,
            Err(SessionError::Unavailable { .. })
        ));
        assert!(matches!(
            registry.sign_in("u1").await,
            Err(SessionError::Unavailable { .. })
        ));

        docs.set_offline(false);
        let status = registry.retry("u1").await.unwrap();
        assert!(matches!(status.sync, SyncState::Loaded { .. }));
        assert!(registry.session("u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_flushes_edits() {
        let (docs, registry, _events) = registry();
        registry.sign_in("u1").await.unwrap();
        let board_id = {
            let session = registry.session("u1").await.unwrap();
            let mut session = session.lock().await;
            let todo = session.board().column_order[0].clone();
            session
                .dispatch(&BoardCommand::add_task(&todo, "Launch post"))
                .unwrap();
            session.board().id.clone()
        };

        assert!(registry.sign_out("u1").await);
        assert!(!registry.sign_out("u1").await);
        assert!(matches!(
            registry.session("u1").await,
            Err(SessionError::NotSignedIn(_))
        ));

        let saved = docs.get(&board_id).unwrap();
        assert_eq!(saved.tasks.len(), 1);
    }

    /// Holds `find_board_by_owner` for one user until released.
    struct GatedStore {
        inner: MemoryDocumentStore,
        gated_user: &'static str,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn find_board_by_owner(&self, user_id: &str) -> Result<Option<Board>, StoreError> {
            if user_id == self.gated_user {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.find_board_by_owner(user_id).await
        }

        async fn create_board(&self, board: &Board) -> Result<(), StoreError> {
            self.inner.create_board(board).await
        }

        async fn update_board(&self, board: &Board) -> Result<(), StoreError> {
            self.inner.update_board(board).await
        }
    }

    #[tokio::test]
    async fn test_slow_load_does_not_block_other_users() {
        let store = Arc::new(GatedStore {
            inner: MemoryDocumentStore::new(),
            gated_user: "slow",
            entered: Notify::new(),
            release: Notify::new(),
        });
        let (tx, _rx) = broadcast::channel(16);
        let registry = Arc::new(SessionRegistry::new(store.clone(), tx));
        registry.sign_in("fast").await.unwrap();

        let loading = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.sign_in("slow").await })
        };
        store.entered.notified().await;

        let quick = Duration::from_millis(500);
        assert!(timeout(quick, registry.session("fast")).await.unwrap().is_ok());
        assert!(timeout(quick, registry.status("fast")).await.unwrap().is_ok());
        assert_eq!(timeout(quick, registry.len()).await.unwrap(), 2);
        assert!(timeout(quick, registry.sign_out("fast")).await.unwrap());

        store.release.notify_one();
        let status = loading.await.unwrap().unwrap();
        assert!(status.created);
        assert!(registry.session("slow").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_after_sign_out_starts_fresh() {
        let (_docs, registry, _events) = registry();
        let first = registry.sign_in("u1").await.unwrap();
        assert!(registry.sign_out("u1").await);
        assert_eq!(registry.len().await, 0);

        let second = registry.sign_in("u1").await.unwrap();
        assert!(!second.created);
        assert_eq!(second.sync, first.sync);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_retry_without_session() {
        let (_docs, registry, _events) = registry();
        assert!(matches!(
            registry.retry("nobody").await,
            Err(SessionError::NotSignedIn(_))
        ));
    }
}
