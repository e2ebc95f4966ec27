/// Board synchronization with the document store.
///
/// Lifecycle per session:
///   Uninitialized --load--> Loaded      (board fetched, or seeded and created)
///   Uninitialized --load--> Errored     (fetch/create failed; retry re-enters Uninitialized)
///
/// While Loaded, every snapshot published by the session is written back as
/// a whole document, except the first one observed when it is still the
/// board that was just fetched. Write-back runs on its own task fed by a
/// `watch` channel, so only the latest snapshot is ever pending and
/// superseded ones are dropped (last write wins). Failures become
/// notifications; the in-memory board is never rolled back.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::notify::{Notification, Notifier};
use crate::storage::{DocumentStore, StoreError};
use crate::store::Snapshot;
use crate::types::{new_id, Board};

/// What the authentication provider currently knows about the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unknown,
    SignedOut,
    SignedIn {
        user_id: String,
    },
}

/// Block until the user is known. Returns `None` when signed out or when
/// the provider goes away.
pub async fn wait_for_user(auth: &mut watch::Receiver<AuthState>) -> Option<String> {
    loop {
        let known = match &*auth.borrow_and_update() {
            AuthState::SignedIn { user_id } => Some(Some(user_id.clone())),
            AuthState::SignedOut => Some(None),
            AuthState::Unknown => None,
        };
        if let Some(user) = known {
            return user;
        }
        if auth.changed().await.is_err() {
            return None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncState {
    Uninitialized,
    Loaded {
        #[serde(rename = "boardId")]
        board_id: String,
    },
    Errored {
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to fetch board: {0}")]
    Fetch(#[source] StoreError),

    #[error("Failed to create board: {0}")]
    Create(#[source] StoreError),

    #[error("Failed to save board: {0}")]
    Write(#[source] StoreError),

    #[error("Retry is only possible after a failed load (state: {0:?})")]
    NotRetryable(SyncState),
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub board: Board,
    /// True when no board existed and a seeded one was created.
    pub created: bool,
}

/// Outcome of the most recent write-back attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WriteStatus {
    Idle,
    Saved {
        revision: u64,
        at: DateTime<Utc>,
    },
    Failed {
        revision: u64,
        message: String,
    },
}

pub struct SyncController {
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    state: SyncState,
    /// Board as fetched; set on load, consumed by the first observed snapshot.
    first_load: Option<Arc<Board>>,
}

impl SyncController {
    pub fn new(documents: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            documents,
            notifier,
            state: SyncState::Uninitialized,
            first_load: None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Fetch the user's board, creating a seeded one if none exists.
    pub async fn load(&mut self, user_id: &str) -> Result<Loaded, SyncError> {
        log::info!("[taskboard.sync] Loading board for user {}", user_id);

        let fetched = match self.documents.find_board_by_owner(user_id).await {
            Ok(found) => found,
            Err(e) => {
                log::error!("[taskboard.sync] Fetch failed for user {}: {}", user_id, e);
                self.fail("Couldn't load your board", &e);
                return Err(SyncError::Fetch(e));
            }
        };

        let (board, created) = match fetched {
            Some(board) => {
                let violations = board.check_invariants();
                if !violations.is_empty() {
                    log::warn!(
                        "[taskboard.sync] Board {} has {} inconsistencies, first: {}",
                        board.id,
                        violations.len(),
                        violations[0]
                    );
                }
                (board, false)
            }
            None => {
                let board = Board::seed(new_id(), user_id, Utc::now());
                if let Err(e) = self.documents.create_board(&board).await {
                    log::error!("[taskboard.sync] Create failed for user {}: {}", user_id, e);
                    self.fail("Couldn't create your board", &e);
                    return Err(SyncError::Create(e));
                }
                self.notifier.notify(Notification::info(
                    "Welcome to your board",
                    "We set up a default board to get you started.",
                ));
                (board, true)
            }
        };

        log::info!(
            "[taskboard.sync] Loaded board {} for user {} (created: {})",
            board.id,
            user_id,
            created
        );
        self.state = SyncState::Loaded {
            board_id: board.id.clone(),
        };
        self.first_load = Some(Arc::new(board.clone()));
        Ok(Loaded { board, created })
    }

    /// Manual retry after a failed load.
    pub async fn retry(&mut self, user_id: &str) -> Result<Loaded, SyncError> {
        if !matches!(self.state, SyncState::Errored { .. }) {
            return Err(SyncError::NotRetryable(self.state.clone()));
        }
        self.state = SyncState::Uninitialized;
        self.load(user_id).await
    }

    fn fail(&mut self, title: &str, e: &StoreError) {
        self.state = SyncState::Errored {
            message: e.to_string(),
        };
        self.notifier
            .notify(Notification::destructive(title, e.to_string()));
    }

    /// Decide whether a snapshot needs writing. The first snapshot observed
    /// after a load is skipped when it is still the fetched board.
    pub fn should_write(&mut self, snapshot: &Snapshot) -> bool {
        if !matches!(self.state, SyncState::Loaded { .. }) {
            return false;
        }
        match self.first_load.take() {
            Some(fetched) => {
                let unchanged =
                    Arc::ptr_eq(&fetched, &snapshot.board) || *fetched == *snapshot.board;
                if unchanged {
                    log::debug!(
                        "[taskboard.sync] Skipping write of freshly loaded board {}",
                        fetched.id
                    );
                }
                !unchanged
            }
            None => true,
        }
    }

    /// Write the snapshot as a whole document. Failures are reported to the
    /// notifier and returned; nothing local is undone.
    pub async fn persist(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let mut document = (*snapshot.board).clone();
        document.updated_at = Utc::now();
        match self.documents.update_board(&document).await {
            Ok(()) => {
                log::debug!(
                    "[taskboard.sync] Saved board {} at revision {}",
                    document.id,
                    snapshot.revision
                );
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "[taskboard.sync] Save of board {} at revision {} failed: {}",
                    document.id,
                    snapshot.revision,
                    e
                );
                self.notifier.notify(Notification::destructive(
                    "Couldn't save board",
                    "Your changes are kept and will be saved with the next edit.",
                ));
                Err(SyncError::Write(e))
            }
        }
    }
}

/// Handle to a running write-back task.
pub struct WriterHandle {
    pub task: JoinHandle<()>,
    pub status: watch::Receiver<WriteStatus>,
}

/// Spawn the write-back loop. It drains the snapshot channel until the
/// sending side (the session) is dropped, writing only the latest value.
pub fn spawn_writer(
    mut controller: SyncController,
    mut snapshots: watch::Receiver<Snapshot>,
) -> WriterHandle {
    let (status_tx, status_rx) = watch::channel(WriteStatus::Idle);

    let task = tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if controller.should_write(&snapshot) {
                let status = match controller.persist(&snapshot).await {
                    Ok(()) => WriteStatus::Saved {
                        revision: snapshot.revision,
                        at: Utc::now(),
                    },
                    Err(e) => WriteStatus::Failed {
                        revision: snapshot.revision,
                        message: e.to_string(),
                    },
                };
                status_tx.send_replace(status);
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
        log::debug!("[taskboard.sync] Writer stopped ({:?})", controller.state());
    });

    WriterHandle {
        task,
        status: status_rx,
    }
}
