use std::collections::HashMap;

use crate::types::Board;

/// Derived lookup from task id to the column that currently lists it.
///
/// Rebuilt from `Board::columns` on demand; column membership stays the
/// only source of truth.
#[derive(Debug, Default, Clone)]
pub struct TaskIndex {
    owners: HashMap<String, String>,
}

impl TaskIndex {
    pub fn build(board: &Board) -> Self {
        let mut owners = HashMap::with_capacity(board.tasks.len());
        for column in board.columns.values() {
            for task_id in &column.task_ids {
                owners.insert(task_id.clone(), column.id.clone());
            }
        }
        Self { owners }
    }

    pub fn column_of(&self, task_id: &str) -> Option<&str> {
        self.owners.get(task_id).map(String::as_str)
    }
}
