/// In-process document store.
///
/// Used for tests and for running the backend without persistence. Can be
/// switched offline to simulate an unreachable hosted store.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{DocumentStore, StoreError};
use crate::types::Board;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    /// board_id -> Board
    boards: RwLock<HashMap<String, Board>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with existing documents.
    pub fn with_boards(boards: impl IntoIterator<Item = Board>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.boards.write() {
            map.extend(boards.into_iter().map(|b| (b.id.clone(), b)));
        }
        store
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful create/update calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, board_id: &str) -> Option<Board> {
        self.boards
            .read()
            .ok()
            .and_then(|map| map.get(board_id).cloned())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_board_by_owner(&self, user_id: &str) -> Result<Option<Board>, StoreError> {
        self.check_online()?;
        let boards = self.boards.read().map_err(|_| Self::poisoned())?;
        let mut owned: Vec<&Board> = boards.values().filter(|b| b.user_id == user_id).collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned.first().map(|b| (*b).clone()))
    }

    async fn create_board(&self, board: &Board) -> Result<(), StoreError> {
        self.check_online()?;
        let mut boards = self.boards.write().map_err(|_| Self::poisoned())?;
        if boards.contains_key(&board.id) {
            return Err(StoreError::AlreadyExists(board.id.clone()));
        }
        boards.insert(board.id.clone(), board.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_board(&self, board: &Board) -> Result<(), StoreError> {
        self.check_online()?;
        let mut boards = self.boards.write().map_err(|_| Self::poisoned())?;
        match boards.get_mut(&board.id) {
            Some(existing) => {
                *existing = board.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StoreError::NotFound(board.id.clone())),
        }
    }
}
