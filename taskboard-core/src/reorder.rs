/// Drag-and-drop reordering.
///
/// Turns one completed drag gesture into the matching `MoveTask` or
/// `MoveColumn` command, and provides the clamped splice helpers those
/// commands are built on. Indices are signed because gesture providers may
/// deliver transient out-of-range positions (including -1); every insert
/// clamps into `0..=len` instead of failing.
use serde::{Deserialize, Serialize};

use crate::store::BoardCommand;

/// Container id of the column-order sequence itself.
pub const COLUMN_ORDER_CONTAINER: &str = "board";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Column,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropLocation {
    pub container_id: String,
    pub index: i64,
}

/// One completed drag gesture. `destination` is `None` when the gesture
/// ended without a valid drop target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragEvent {
    pub kind: DragKind,
    pub entity_id: String,
    pub source: DropLocation,
    #[serde(default)]
    pub destination: Option<DropLocation>,
}

/// Map a drag gesture to the board command it implies.
/// Returns `None` for cancelled drops, drops back onto the starting slot,
/// and column drags that do not stay inside the column-order container.
pub fn resolve(event: &DragEvent) -> Option<BoardCommand> {
    let destination = event.destination.as_ref()?;
    if destination == &event.source {
        return None;
    }

    match event.kind {
        DragKind::Column => {
            if event.source.container_id != COLUMN_ORDER_CONTAINER
                || destination.container_id != COLUMN_ORDER_CONTAINER
            {
                log::debug!(
                    "[taskboard.reorder] Ignoring column drag outside board container: {} -> {}",
                    event.source.container_id,
                    destination.container_id
                );
                return None;
            }
            Some(BoardCommand::MoveColumn {
                column_id: event.entity_id.clone(),
                source_index: event.source.index,
                dest_index: destination.index,
            })
        }
        DragKind::Task => Some(BoardCommand::MoveTask {
            task_id: event.entity_id.clone(),
            source_column_id: event.source.container_id.clone(),
            source_index: event.source.index,
            dest_column_id: destination.container_id.clone(),
            dest_index: destination.index,
        }),
    }
}

/// Clamp a possibly out-of-range insert position into `0..=len`.
pub fn clamp_index(index: i64, len: usize) -> usize {
    if index <= 0 {
        0
    } else {
        usize::try_from(index).map_or(len, |i| i.min(len))
    }
}

/// Position of `id` in `list`, preferring `hint` when it points at `id`.
pub fn locate(list: &[String], id: &str, hint: i64) -> Option<usize> {
    usize::try_from(hint)
        .ok()
        .filter(|&i| list.get(i).is_some_and(|entry| entry == id))
        .or_else(|| list.iter().position(|entry| entry == id))
}

/// Insert `id` at the clamped `index`.
pub fn insert_clamped(list: &mut Vec<String>, id: String, index: i64) {
    let at = clamp_index(index, list.len());
    list.insert(at, id);
}

/// Splice `id` out of `list` and reinsert it at the clamped `to`.
/// Returns false (leaving `list` untouched) when `id` is not present.
pub fn move_within(list: &mut Vec<String>, id: &str, from: i64, to: i64) -> bool {
    let Some(pos) = locate(list, id, from) else {
        return false;
    };
    let entry = list.remove(pos);
    insert_clamped(list, entry, to);
    true
}
