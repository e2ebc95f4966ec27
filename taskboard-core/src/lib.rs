//! Kanban board state and synchronization for the agency dashboard.
//!
//! `store` holds the pure board operations, `reorder` maps drag gestures to
//! them, `selection` projects the open task, `sync` keeps one document per
//! user in step with the in-memory board, and `session` ties these together
//! for a single signed-in user.

pub mod index;
pub mod notify;
pub mod reorder;
pub mod selection;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;
