/// One live board per signed-in user.
///
/// A `BoardSession` owns the user's `BoardStore` and `Selection` and is the
/// only thing allowed to mutate them. Every accepted change is applied
/// synchronously, the selection is reconciled, and the new snapshot is
/// published to the write-back task. Dropping or closing the session ends
/// the writer after it has flushed the latest snapshot.
use chrono::NaiveDate;
use tokio::sync::watch;

use crate::reorder::{self, DragEvent};
use crate::selection::{FieldEdit, Selection, TaskView};
use crate::store::{BoardCommand, BoardStore, Snapshot, ValidationError};
use crate::sync::{spawn_writer, Loaded, SyncController, WriteStatus, WriterHandle};
use crate::types::Board;

pub struct BoardSession {
    user_id: String,
    store: BoardStore,
    selection: Selection,
    snapshots: watch::Sender<Snapshot>,
    writer: WriterHandle,
    created: bool,
}

impl BoardSession {
    /// Start a session from a loaded controller. The initial snapshot is the
    /// fetched board, which the writer recognizes and does not write back.
    pub fn start(user_id: &str, controller: SyncController, loaded: Loaded) -> Self {
        let store = BoardStore::new(loaded.board);
        let (snapshots, rx) = watch::channel(store.snapshot());
        let writer = spawn_writer(controller, rx);
        log::info!(
            "[taskboard.session] Started session for user {} on board {}",
            user_id,
            store.board().id
        );
        Self {
            user_id: user_id.to_string(),
            store,
            selection: Selection::new(),
            snapshots,
            writer,
            created: loaded.created,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn board(&self) -> &Board {
        self.store.board()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    /// True when this session seeded a brand-new board.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn write_status(&self) -> WriteStatus {
        self.writer.status.borrow().clone()
    }

    /// Receiver of every published snapshot (latest value only).
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Apply one command. `Ok(false)` means nothing changed and nothing was
    /// published.
    pub fn dispatch(&mut self, command: &BoardCommand) -> Result<bool, ValidationError> {
        let changed = self.store.dispatch(command)?;
        if changed {
            self.selection.reconcile(self.store.board());
            self.snapshots.send_replace(self.store.snapshot());
        }
        Ok(changed)
    }

    /// Apply a completed drag gesture. Cancelled or no-op drops change
    /// nothing.
    pub fn handle_drag(&mut self, event: &DragEvent) -> bool {
        let Some(command) = reorder::resolve(event) else {
            return false;
        };
        match self.dispatch(&command) {
            Ok(changed) => changed,
            Err(e) => {
                log::warn!("[taskboard.session] Drag produced invalid command: {}", e);
                false
            }
        }
    }

    pub fn open_task(&mut self, task_id: &str) -> bool {
        self.selection.open(self.store.board(), task_id)
    }

    pub fn close_task(&mut self) {
        self.selection.close();
    }

    pub fn open_task_view(&self, today: NaiveDate) -> Option<TaskView> {
        self.selection.project(self.store.board(), today)
    }

    /// Commit one field edit on the open task. Without an open task this is
    /// a no-op.
    pub fn edit_open_task(&mut self, edit: FieldEdit) -> Result<bool, ValidationError> {
        match self.selection.command_for(self.store.board(), edit) {
            Some(command) => self.dispatch(&command),
            None => Ok(false),
        }
    }

    /// End the session, waiting for the writer to flush the latest snapshot.
    pub async fn close(self) {
        let Self {
            user_id,
            snapshots,
            writer,
            ..
        } = self;
        drop(snapshots);
        if let Err(e) = writer.task.await {
            log::error!("[taskboard.session] Writer for user {} ended abnormally: {}", user_id, e);
        }
        log::info!("[taskboard.session] Closed session for user {}", user_id);
    }
}
