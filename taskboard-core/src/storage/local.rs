/// Local filesystem document store.
///
/// One `<board_id>.json` file per board in a data directory, with:
/// - Atomic writes (write to .tmp, fsync, rename)
/// - SHA-256 fingerprints (ignoring `updatedAt`) to skip rewriting
///   unchanged documents
/// - Per-board write mutex to serialize writers
/// - Owner index (user_id -> board_id) rebuilt by scanning the directory
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{is_valid_board_id, DocumentStore, StoreError};
use crate::types::Board;

pub struct LocalDocumentStore {
    dir: PathBuf,
    /// board_id -> fingerprint of the last document read or written
    hashes: RwLock<HashMap<String, String>>,
    /// user_id -> board_id
    owners: RwLock<HashMap<String, String>>,
    /// Per-board write mutex to prevent concurrent modification
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalDocumentStore {
    /// Open (and create if needed) a data directory, indexing existing boards.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let store = Self {
            dir: dir.to_path_buf(),
            hashes: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        };
        store.reindex()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the owner index from the files on disk. Unreadable files are
    /// skipped with a warning.
    pub fn reindex(&self) -> Result<usize, StoreError> {
        let mut owners: HashMap<String, (String, chrono::DateTime<chrono::Utc>)> = HashMap::new();
        let mut hashes = HashMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("[taskboard.storage] Failed to read {:?}: {}", path, e);
                    continue;
                }
            };
            let board: Board = match serde_json::from_str(&content) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("[taskboard.storage] Skipping unparsable {:?}: {}", path, e);
                    continue;
                }
            };
            if let Ok(hash) = Self::fingerprint(&board) {
                hashes.insert(board.id.clone(), hash);
            }
            // Keep the oldest board per owner.
            let keep = owners
                .get(&board.user_id)
                .map_or(true, |(_, created)| board.created_at < *created);
            if keep {
                owners.insert(board.user_id.clone(), (board.id.clone(), board.created_at));
            }
        }

        let count = hashes.len();
        *self.hashes.write().map_err(|_| Self::poisoned())? = hashes;
        *self.owners.write().map_err(|_| Self::poisoned())? = owners
            .into_iter()
            .map(|(user, (board_id, _))| (user, board_id))
            .collect();
        log::info!("[taskboard.storage] Indexed {} boards in {:?}", count, self.dir);
        Ok(count)
    }

    fn board_path(&self, board_id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_board_id(board_id) {
            return Err(StoreError::InvalidId(board_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", board_id)))
    }

    /// SHA-256 of the document without `updatedAt`. Every save stamps a
    /// fresh timestamp, so only the rest of the document decides whether
    /// anything changed.
    fn fingerprint(board: &Board) -> Result<String, StoreError> {
        let mut value = serde_json::to_value(board)?;
        if let Some(fields) = value.as_object_mut() {
            fields.remove("updatedAt");
        }
        let mut hasher = Sha256::new();
        hasher.update(value.to_string().as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("local store lock poisoned".to_string())
    }

    fn get_write_lock(&self, board_id: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self.write_locks.lock().map_err(|_| Self::poisoned())?;
        Ok(locks
            .entry(board_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn read_board(&self, board_id: &str) -> Result<Option<Board>, StoreError> {
        let path = self.board_path(board_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let board: Board = serde_json::from_str(&content)?;
        let hash = Self::fingerprint(&board)?;
        self.hashes
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(board_id.to_string(), hash);
        Ok(Some(board))
    }

    /// Serialize and write under the board's lock. Returns false when the
    /// document on disk differs at most in `updatedAt`.
    fn write_document(&self, board: &Board) -> Result<bool, StoreError> {
        let path = self.board_path(&board.id)?;
        let lock = self.get_write_lock(&board.id)?;
        let _guard = lock.lock().map_err(|_| Self::poisoned())?;

        let hash = Self::fingerprint(board)?;
        let unchanged = self
            .hashes
            .read()
            .map_err(|_| Self::poisoned())?
            .get(&board.id)
            .is_some_and(|h| *h == hash);
        if unchanged && path.exists() {
            log::debug!("[taskboard.storage] Board {} unchanged, skipping write", board.id);
            return Ok(false);
        }

        let content = serde_json::to_string_pretty(board)?;
        Self::atomic_write(&path, &content)?;
        self.hashes
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(board.id.clone(), hash);
        Ok(true)
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn find_board_by_owner(&self, user_id: &str) -> Result<Option<Board>, StoreError> {
        let board_id = self
            .owners
            .read()
            .map_err(|_| Self::poisoned())?
            .get(user_id)
            .cloned();
        match board_id {
            Some(id) => self.read_board(&id),
            None => Ok(None),
        }
    }

    async fn create_board(&self, board: &Board) -> Result<(), StoreError> {
        let path = self.board_path(&board.id)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists(board.id.clone()));
        }
        self.write_document(board)?;
        self.owners
            .write()
            .map_err(|_| Self::poisoned())?
            .entry(board.user_id.clone())
            .or_insert_with(|| board.id.clone());
        log::info!(
            "[taskboard.storage] Created board {} for user {}",
            board.id,
            board.user_id
        );
        Ok(())
    }

    async fn update_board(&self, board: &Board) -> Result<(), StoreError> {
        let path = self.board_path(&board.id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(board.id.clone()));
        }
        if self.write_document(board)? {
            log::debug!("[taskboard.storage] Wrote board {}", board.id);
        }
        Ok(())
    }
}
