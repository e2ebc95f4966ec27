/// Open-task selection and the detail view projected from it.
///
/// The selection holds only a task id, so the projected view always reads
/// the latest snapshot. Edits made in the detail view are turned into
/// commands one field at a time.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::index::TaskIndex;
use crate::store::BoardCommand;
use crate::types::{Attachment, Board, ChecklistProgress, Label, Task, TaskPatch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    open_task_id: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_task_id(&self) -> Option<&str> {
        self.open_task_id.as_deref()
    }

    /// Open a task for editing. Unknown ids leave the selection as it was.
    pub fn open(&mut self, board: &Board, task_id: &str) -> bool {
        if !board.tasks.contains_key(task_id) {
            return false;
        }
        self.open_task_id = Some(task_id.to_string());
        true
    }

    pub fn close(&mut self) {
        self.open_task_id = None;
    }

    /// Drop the selection if its task no longer exists. Returns true when
    /// the selection was cleared.
    pub fn reconcile(&mut self, board: &Board) -> bool {
        match &self.open_task_id {
            Some(id) if !board.tasks.contains_key(id) => {
                log::debug!("[taskboard.selection] Open task {} was deleted", id);
                self.open_task_id = None;
                true
            }
            _ => false,
        }
    }

    pub fn project(&self, board: &Board, today: NaiveDate) -> Option<TaskView> {
        let task = board.tasks.get(self.open_task_id.as_deref()?)?;
        let index = TaskIndex::build(board);
        Some(TaskView {
            column_id: index.column_of(&task.id).map(str::to_string),
            column_title: index
                .column_of(&task.id)
                .and_then(|id| board.columns.get(id))
                .map(|col| col.title.clone()),
            labels: board.task_labels(task).into_iter().cloned().collect(),
            progress: task.checklist_progress(),
            overdue: task.is_overdue(today),
            task: task.clone(),
        })
    }

    /// Command for one committed field edit on the open task.
    pub fn command_for(&self, board: &Board, edit: FieldEdit) -> Option<BoardCommand> {
        let task = board.tasks.get(self.open_task_id.as_deref()?)?;
        Some(edit.into_command(task))
    }
}

/// Detail view of the open task, derived from the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task: Task,
    pub column_id: Option<String>,
    pub column_title: Option<String>,
    pub labels: Vec<Label>,
    pub progress: ChecklistProgress,
    pub overdue: bool,
}

/// A committed edit from the detail view (blur, date pick, checkbox click).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldEdit {
    Title { value: String },
    Description { value: Option<String> },
    Labels { label_ids: Vec<String> },
    DueDate { value: Option<NaiveDate> },
    ToggleChecklistItem { item_id: String },
    AddChecklistItem { text: String },
    RemoveChecklistItem { item_id: String },
    AddLink { name: String, url: String },
    AddFile { name: String, data_url: String },
    RemoveAttachment { attachment_id: String },
}

impl FieldEdit {
    fn into_command(self, task: &Task) -> BoardCommand {
        let task_id = task.id.as_str();
        let now: DateTime<Utc> = Utc::now();
        match self {
            FieldEdit::Title { value } => BoardCommand::UpdateTask {
                task_id: task_id.to_string(),
                patch: TaskPatch::title(&value),
            },
            FieldEdit::Description { value } => BoardCommand::UpdateTask {
                task_id: task_id.to_string(),
                patch: TaskPatch::description(value),
            },
            FieldEdit::Labels { label_ids } => BoardCommand::UpdateTask {
                task_id: task_id.to_string(),
                patch: TaskPatch::label_ids(label_ids),
            },
            FieldEdit::DueDate { value } => BoardCommand::UpdateTask {
                task_id: task_id.to_string(),
                patch: TaskPatch::due_date(value),
            },
            FieldEdit::ToggleChecklistItem { item_id } => BoardCommand::ToggleChecklistItem {
                task_id: task_id.to_string(),
                item_id,
            },
            FieldEdit::AddChecklistItem { text } => BoardCommand::add_checklist_item(task_id, &text),
            FieldEdit::RemoveChecklistItem { item_id } => BoardCommand::RemoveChecklistItem {
                task_id: task_id.to_string(),
                item_id,
            },
            FieldEdit::AddLink { name, url } => BoardCommand::AddAttachment {
                task_id: task_id.to_string(),
                attachment: Attachment::link(crate::types::new_id(), &name, &url, now),
            },
            FieldEdit::AddFile { name, data_url } => BoardCommand::AddAttachment {
                task_id: task_id.to_string(),
                attachment: Attachment::file(crate::types::new_id(), &name, &data_url, now),
            },
            FieldEdit::RemoveAttachment { attachment_id } => BoardCommand::RemoveAttachment {
                task_id: task_id.to_string(),
                attachment_id,
            },
        }
    }
}
