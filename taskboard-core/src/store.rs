/// Board store: pure snapshot-to-snapshot operations.
///
/// Every operation takes the current `Board` and returns a new one. Unknown
/// ids and rejected input leave the snapshot unchanged; nothing here fails
/// or panics. `BoardCommand::validate` reports rejections for immediate
/// form feedback, and `BoardStore` is the single owned cell holding the
/// current snapshot for a session.
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reorder::{insert_clamped, locate, move_within};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Board name cannot be blank")]
    BlankBoardName,

    #[error("Column title cannot be blank")]
    BlankColumnTitle,

    #[error("Task title cannot be blank")]
    BlankTaskTitle,

    #[error("Label name cannot be blank")]
    BlankLabelName,

    #[error("Checklist item text cannot be blank")]
    BlankChecklistItem,

    #[error("Attachment name cannot be blank")]
    BlankAttachmentName,

    #[error("Link attachments need an http(s) URL: {0}")]
    InvalidLink(String),

    #[error("File attachment is not a base64 data URL")]
    MalformedFile,

    #[error("Attachment is {size} bytes, limit is {max}")]
    AttachmentTooLarge { size: usize, max: usize },
}

/// One semantic change to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardCommand {
    RenameBoard {
        name: String,
    },
    AddColumn {
        #[serde(default = "new_id")]
        id: String,
        #[serde(default)]
        title: Option<String>,
    },
    RenameColumn {
        column_id: String,
        title: String,
    },
    DeleteColumn {
        column_id: String,
    },
    MoveColumn {
        column_id: String,
        source_index: i64,
        dest_index: i64,
    },
    AddTask {
        column_id: String,
        #[serde(default = "new_id")]
        id: String,
        title: String,
    },
    UpdateTask {
        task_id: String,
        patch: TaskPatch,
    },
    DeleteTask {
        task_id: String,
    },
    MoveTask {
        task_id: String,
        source_column_id: String,
        source_index: i64,
        dest_column_id: String,
        dest_index: i64,
    },
    CreateLabel {
        #[serde(default = "new_id")]
        id: String,
        name: String,
        #[serde(default)]
        color: LabelColor,
    },
    UpdateLabel {
        label_id: String,
        patch: LabelPatch,
    },
    DeleteLabel {
        label_id: String,
    },
    AddChecklistItem {
        task_id: String,
        #[serde(default = "new_id")]
        id: String,
        text: String,
    },
    ToggleChecklistItem {
        task_id: String,
        item_id: String,
    },
    RemoveChecklistItem {
        task_id: String,
        item_id: String,
    },
    AddAttachment {
        task_id: String,
        attachment: Attachment,
    },
    RemoveAttachment {
        task_id: String,
        attachment_id: String,
    },
}

impl BoardCommand {
    pub fn add_column(title: Option<&str>) -> Self {
        BoardCommand::AddColumn {
            id: new_id(),
            title: title.map(str::to_string),
        }
    }

    pub fn add_task(column_id: &str, title: &str) -> Self {
        BoardCommand::AddTask {
            column_id: column_id.to_string(),
            id: new_id(),
            title: title.to_string(),
        }
    }

    pub fn create_label(name: &str, color: LabelColor) -> Self {
        BoardCommand::CreateLabel {
            id: new_id(),
            name: name.to_string(),
            color,
        }
    }

    pub fn add_checklist_item(task_id: &str, text: &str) -> Self {
        BoardCommand::AddChecklistItem {
            task_id: task_id.to_string(),
            id: new_id(),
            text: text.to_string(),
        }
    }

    pub fn add_link(task_id: &str, name: &str, url: &str, now: DateTime<Utc>) -> Self {
        BoardCommand::AddAttachment {
            task_id: task_id.to_string(),
            attachment: Attachment::link(new_id(), name, url, now),
        }
    }

    pub fn add_file(task_id: &str, name: &str, data_url: &str, now: DateTime<Utc>) -> Self {
        BoardCommand::AddAttachment {
            task_id: task_id.to_string(),
            attachment: Attachment::file(new_id(), name, data_url, now),
        }
    }

    /// Input checks that do not depend on board contents.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            BoardCommand::RenameBoard { name } => {
                non_blank(name, ValidationError::BlankBoardName)
            }
            BoardCommand::RenameColumn { title, .. } => {
                non_blank(title, ValidationError::BlankColumnTitle)
            }
            BoardCommand::AddTask { title, .. } => {
                non_blank(title, ValidationError::BlankTaskTitle)
            }
            BoardCommand::UpdateTask { patch, .. } => validate_patch(patch),
            BoardCommand::CreateLabel { name, .. } => {
                non_blank(name, ValidationError::BlankLabelName)
            }
            BoardCommand::UpdateLabel { patch, .. } => match &patch.name {
                Some(name) => non_blank(name, ValidationError::BlankLabelName),
                None => Ok(()),
            },
            BoardCommand::AddChecklistItem { text, .. } => {
                non_blank(text, ValidationError::BlankChecklistItem)
            }
            BoardCommand::AddAttachment { attachment, .. } => validate_attachment(attachment),
            _ => Ok(()),
        }
    }

    /// Id of the task this command targets, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            BoardCommand::UpdateTask { task_id, .. }
            | BoardCommand::DeleteTask { task_id }
            | BoardCommand::MoveTask { task_id, .. }
            | BoardCommand::AddChecklistItem { task_id, .. }
            | BoardCommand::ToggleChecklistItem { task_id, .. }
            | BoardCommand::RemoveChecklistItem { task_id, .. }
            | BoardCommand::AddAttachment { task_id, .. }
            | BoardCommand::RemoveAttachment { task_id, .. } => Some(task_id),
            BoardCommand::AddTask { id, .. } => Some(id),
            _ => None,
        }
    }
}

fn non_blank(value: &str, err: ValidationError) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(err)
    } else {
        Ok(())
    }
}

fn validate_patch(patch: &TaskPatch) -> Result<(), ValidationError> {
    if let Some(title) = &patch.title {
        non_blank(title, ValidationError::BlankTaskTitle)?;
    }
    if let Some(items) = &patch.checklist {
        for item in items {
            non_blank(&item.text, ValidationError::BlankChecklistItem)?;
        }
    }
    if let Some(attachments) = &patch.attachments {
        for attachment in attachments {
            validate_attachment(attachment)?;
        }
    }
    Ok(())
}

/// Reject malformed links and file payloads over `MAX_ATTACHMENT_BYTES`.
pub fn validate_attachment(attachment: &Attachment) -> Result<(), ValidationError> {
    non_blank(&attachment.name, ValidationError::BlankAttachmentName)?;
    match attachment.kind {
        AttachmentKind::Link => {
            let url = attachment.url.trim();
            let has_host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .is_some_and(|rest| !rest.is_empty());
            if has_host {
                Ok(())
            } else {
                Err(ValidationError::InvalidLink(attachment.url.clone()))
            }
        }
        AttachmentKind::File => {
            let payload = attachment
                .data_payload()
                .ok_or(ValidationError::MalformedFile)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|_| ValidationError::MalformedFile)?;
            if bytes.len() > MAX_ATTACHMENT_BYTES {
                return Err(ValidationError::AttachmentTooLarge {
                    size: bytes.len(),
                    max: MAX_ATTACHMENT_BYTES,
                });
            }
            Ok(())
        }
    }
}

/// Apply one command. Rejected or inapplicable commands return an equal
/// board.
pub fn apply(board: &Board, command: &BoardCommand) -> Board {
    if let Err(e) = command.validate() {
        log::debug!("[taskboard.store] Rejected {:?}: {}", command, e);
        return board.clone();
    }
    match command {
        BoardCommand::RenameBoard { name } => rename_board(board, name),
        BoardCommand::AddColumn { id, title } => {
            add_column(board, id, title.as_deref().unwrap_or(""))
        }
        BoardCommand::RenameColumn { column_id, title } => rename_column(board, column_id, title),
        BoardCommand::DeleteColumn { column_id } => delete_column(board, column_id),
        BoardCommand::MoveColumn {
            column_id,
            source_index,
            dest_index,
        } => move_column(board, column_id, *source_index, *dest_index),
        BoardCommand::AddTask {
            column_id,
            id,
            title,
        } => add_task(board, column_id, id, title),
        BoardCommand::UpdateTask { task_id, patch } => update_task(board, task_id, patch),
        BoardCommand::DeleteTask { task_id } => delete_task(board, task_id),
        BoardCommand::MoveTask {
            task_id,
            source_column_id,
            source_index,
            dest_column_id,
            dest_index,
        } => move_task(
            board,
            task_id,
            source_column_id,
            *source_index,
            dest_column_id,
            *dest_index,
        ),
        BoardCommand::CreateLabel { id, name, color } => create_label(board, id, name, *color),
        BoardCommand::UpdateLabel { label_id, patch } => update_label(board, label_id, patch),
        BoardCommand::DeleteLabel { label_id } => delete_label(board, label_id),
        BoardCommand::AddChecklistItem { task_id, id, text } => {
            add_checklist_item(board, task_id, id, text)
        }
        BoardCommand::ToggleChecklistItem { task_id, item_id } => {
            toggle_checklist_item(board, task_id, item_id)
        }
        BoardCommand::RemoveChecklistItem { task_id, item_id } => {
            remove_checklist_item(board, task_id, item_id)
        }
        BoardCommand::AddAttachment {
            task_id,
            attachment,
        } => add_attachment(board, task_id, attachment),
        BoardCommand::RemoveAttachment {
            task_id,
            attachment_id,
        } => remove_attachment(board, task_id, attachment_id),
    }
}

pub fn rename_board(board: &Board, name: &str) -> Board {
    let mut next = board.clone();
    let name = name.trim();
    if !name.is_empty() {
        next.name = name.to_string();
    }
    next
}

/// Append an empty column. A blank title falls back to `DEFAULT_COLUMN_TITLE`.
pub fn add_column(board: &Board, id: &str, title: &str) -> Board {
    let mut next = board.clone();
    if next.columns.contains_key(id) {
        return next;
    }
    let title = match title.trim() {
        "" => DEFAULT_COLUMN_TITLE,
        t => t,
    };
    next.columns
        .insert(id.to_string(), Column::new(id.to_string(), title));
    next.column_order.push(id.to_string());
    next
}

/// Blank titles are rejected and the previous title kept.
pub fn rename_column(board: &Board, column_id: &str, title: &str) -> Board {
    let mut next = board.clone();
    let title = title.trim();
    if title.is_empty() {
        return next;
    }
    if let Some(col) = next.columns.get_mut(column_id) {
        col.title = title.to_string();
    }
    next
}

/// Remove a column together with every task it lists.
pub fn delete_column(board: &Board, column_id: &str) -> Board {
    let mut next = board.clone();
    let Some(column) = next.columns.remove(column_id) else {
        return next;
    };
    next.column_order.retain(|id| id != column_id);
    for task_id in &column.task_ids {
        next.tasks.remove(task_id);
    }
    next
}

pub fn move_column(board: &Board, column_id: &str, source_index: i64, dest_index: i64) -> Board {
    let mut next = board.clone();
    if next.columns.contains_key(column_id) {
        move_within(&mut next.column_order, column_id, source_index, dest_index);
    }
    next
}

/// Create a task with empty optional fields at the end of a column.
pub fn add_task(board: &Board, column_id: &str, id: &str, title: &str) -> Board {
    let mut next = board.clone();
    if title.trim().is_empty() || next.tasks.contains_key(id) {
        return next;
    }
    let Some(column) = next.columns.get_mut(column_id) else {
        return next;
    };
    column.task_ids.push(id.to_string());
    next.tasks
        .insert(id.to_string(), Task::new(id.to_string(), title));
    next
}

/// Shallow-merge the fields present in `patch`. Label ids that do not key
/// into the board's labels are dropped.
pub fn update_task(board: &Board, task_id: &str, patch: &TaskPatch) -> Board {
    let mut next = board.clone();
    if validate_patch(patch).is_err() {
        return next;
    }
    let label_ids = patch.label_ids.as_ref().map(|ids| {
        let mut kept: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if next.labels.contains_key(id) && !kept.contains(id) {
                kept.push(id.clone());
            }
        }
        kept
    });
    let Some(task) = next.tasks.get_mut(task_id) else {
        return next;
    };

    if let Some(title) = &patch.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = &patch.description {
        task.description = description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
    }
    if let Some(ids) = label_ids {
        task.label_ids = ids;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    if let Some(checklist) = &patch.checklist {
        task.checklist = checklist.clone();
    }
    if let Some(attachments) = &patch.attachments {
        task.attachments = attachments.clone();
    }
    next
}

pub fn delete_task(board: &Board, task_id: &str) -> Board {
    let mut next = board.clone();
    if next.tasks.remove(task_id).is_none() {
        return next;
    }
    for column in next.columns.values_mut() {
        column.task_ids.retain(|id| id != task_id);
    }
    next
}

/// Splice a task out of its column and insert it into the destination at
/// the clamped index. When `source_column_id` does not actually hold the
/// task, the owning column is looked up instead.
pub fn move_task(
    board: &Board,
    task_id: &str,
    source_column_id: &str,
    source_index: i64,
    dest_column_id: &str,
    dest_index: i64,
) -> Board {
    let mut next = board.clone();
    if !next.tasks.contains_key(task_id) || !next.columns.contains_key(dest_column_id) {
        return next;
    }

    let source_holds = next
        .columns
        .get(source_column_id)
        .is_some_and(|col| col.task_ids.iter().any(|id| id == task_id));
    let owner = if source_holds {
        source_column_id.to_string()
    } else {
        match board.column_of(task_id) {
            Some(owner) => {
                log::debug!(
                    "[taskboard.store] Task {} is in {}, not {}",
                    task_id,
                    owner,
                    source_column_id
                );
                owner.to_string()
            }
            None => return next,
        }
    };

    if owner == dest_column_id {
        if let Some(column) = next.columns.get_mut(&owner) {
            move_within(&mut column.task_ids, task_id, source_index, dest_index);
        }
        return next;
    }

    if let Some(column) = next.columns.get_mut(&owner) {
        if let Some(pos) = locate(&column.task_ids, task_id, source_index) {
            column.task_ids.remove(pos);
        }
    }
    if let Some(column) = next.columns.get_mut(dest_column_id) {
        insert_clamped(&mut column.task_ids, task_id.to_string(), dest_index);
    }
    next
}

pub fn create_label(board: &Board, id: &str, name: &str, color: LabelColor) -> Board {
    let mut next = board.clone();
    let name = name.trim();
    if name.is_empty() || next.labels.contains_key(id) {
        return next;
    }
    next.labels.insert(
        id.to_string(),
        Label {
            id: id.to_string(),
            name: name.to_string(),
            color,
        },
    );
    next
}

pub fn update_label(board: &Board, label_id: &str, patch: &LabelPatch) -> Board {
    let mut next = board.clone();
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return next;
    }
    if let Some(label) = next.labels.get_mut(label_id) {
        if let Some(name) = &patch.name {
            label.name = name.trim().to_string();
        }
        if let Some(color) = patch.color {
            label.color = color;
        }
    }
    next
}

/// Remove a label and strip it from every task that references it.
pub fn delete_label(board: &Board, label_id: &str) -> Board {
    let mut next = board.clone();
    if next.labels.remove(label_id).is_none() {
        return next;
    }
    for task in next.tasks.values_mut() {
        task.label_ids.retain(|id| id != label_id);
    }
    next
}

pub fn add_checklist_item(board: &Board, task_id: &str, id: &str, text: &str) -> Board {
    let mut next = board.clone();
    let text = text.trim();
    if text.is_empty() {
        return next;
    }
    if let Some(task) = next.tasks.get_mut(task_id) {
        if task.checklist.iter().all(|item| item.id != id) {
            task.checklist.push(ChecklistItem {
                id: id.to_string(),
                text: text.to_string(),
                completed: false,
            });
        }
    }
    next
}

pub fn toggle_checklist_item(board: &Board, task_id: &str, item_id: &str) -> Board {
    let mut next = board.clone();
    if let Some(item) = next
        .tasks
        .get_mut(task_id)
        .and_then(|task| task.checklist.iter_mut().find(|item| item.id == item_id))
    {
        item.completed = !item.completed;
    }
    next
}

pub fn remove_checklist_item(board: &Board, task_id: &str, item_id: &str) -> Board {
    let mut next = board.clone();
    if let Some(task) = next.tasks.get_mut(task_id) {
        task.checklist.retain(|item| item.id != item_id);
    }
    next
}

/// Oversized or malformed attachments are rejected before any mutation.
pub fn add_attachment(board: &Board, task_id: &str, attachment: &Attachment) -> Board {
    let mut next = board.clone();
    if validate_attachment(attachment).is_err() {
        return next;
    }
    if let Some(task) = next.tasks.get_mut(task_id) {
        if task.attachments.iter().all(|a| a.id != attachment.id) {
            task.attachments.push(attachment.clone());
        }
    }
    next
}

pub fn remove_attachment(board: &Board, task_id: &str, attachment_id: &str) -> Board {
    let mut next = board.clone();
    if let Some(task) = next.tasks.get_mut(task_id) {
        task.attachments.retain(|a| a.id != attachment_id);
    }
    next
}

/// One immutable board value tagged with the store revision it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub revision: u64,
    pub board: Arc<Board>,
}

/// Holder of the current snapshot for one session.
#[derive(Debug)]
pub struct BoardStore {
    board: Arc<Board>,
    revision: u64,
}

impl BoardStore {
    pub fn new(board: Board) -> Self {
        Self {
            board: Arc::new(board),
            revision: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            board: self.board.clone(),
        }
    }

    /// Apply a command. Returns `Ok(true)` when the snapshot changed,
    /// `Ok(false)` for a no-op, and the validation error for rejected input
    /// (in which case nothing changes).
    pub fn dispatch(&mut self, command: &BoardCommand) -> Result<bool, ValidationError> {
        command.validate()?;
        let next = apply(&self.board, command);
        if next == *self.board {
            return Ok(false);
        }
        self.board = Arc::new(next);
        self.revision += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// A:[t1,t2]  B:[]  C:[t4], label L1 on t2 and t4, L2 on t1.
    fn fixture() -> Board {
        let mut board = Board::empty("b1".into(), "Agency", "u1", ts());
        board = add_column(&board, "A", "Backlog");
        board = add_column(&board, "B", "Doing");
        board = add_column(&board, "C", "Done");
        board = add_task(&board, "A", "t1", "Kickoff deck");
        board = add_task(&board, "A", "t2", "Ad copy");
        board = add_task(&board, "C", "t4", "Invoice");
        board = create_label(&board, "L1", "Urgent", LabelColor::Red);
        board = create_label(&board, "L2", "Design", LabelColor::Blue);
        board = update_task(&board, "t2", &TaskPatch::label_ids(vec!["L1".into()]));
        board = update_task(&board, "t4", &TaskPatch::label_ids(vec!["L1".into()]));
        board = update_task(&board, "t1", &TaskPatch::label_ids(vec!["L2".into()]));
        board
    }

    fn task_ids(board: &Board, column_id: &str) -> Vec<String> {
        board.columns[column_id].task_ids.clone()
    }

    fn strs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fixture_is_consistent() {
        assert!(fixture().check_invariants().is_empty());
    }

    #[test]
    fn test_concrete_scenario() {
        let board = fixture();

        let board = move_task(&board, "t1", "A", 0, "B", 0);
        assert_eq!(task_ids(&board, "A"), strs(&["t2"]));
        assert_eq!(task_ids(&board, "B"), strs(&["t1"]));

        let board = add_task(&board, "B", "t3", "x");
        assert_eq!(task_ids(&board, "B"), strs(&["t1", "t3"]));
        let t3 = &board.tasks["t3"];
        assert_eq!(t3.title, "x");
        assert_eq!(t3.description, None);
        assert!(t3.label_ids.is_empty());
        assert_eq!(t3.due_date, None);
        assert!(t3.checklist.is_empty());
        assert!(t3.attachments.is_empty());

        let board = delete_label(&board, "L1");
        assert!(!board.tasks["t2"].label_ids.contains(&"L1".to_string()));
        assert!(!board.tasks["t4"].label_ids.contains(&"L1".to_string()));
        assert!(!board.labels.contains_key("L1"));
        assert!(board.check_invariants().is_empty());
    }

    #[test]
    fn test_add_column_appends_to_order() {
        let board = add_column(&fixture(), "D", "  ");
        assert_eq!(board.column_order, strs(&["A", "B", "C", "D"]));
        assert_eq!(board.columns["D"].title, DEFAULT_COLUMN_TITLE);
        assert!(board.columns["D"].task_ids.is_empty());
    }

    #[test]
    fn test_rename_column_rejects_blank() {
        let board = fixture();
        let renamed = rename_column(&board, "A", "   ");
        assert_eq!(renamed.columns["A"].title, "Backlog");
        let renamed = rename_column(&board, "A", " Briefs ");
        assert_eq!(renamed.columns["A"].title, "Briefs");
    }

    #[test]
    fn test_delete_column_removes_its_tasks_only() {
        let board = fixture();
        let after = delete_column(&board, "A");
        assert!(!after.columns.contains_key("A"));
        assert_eq!(after.column_order, strs(&["B", "C"]));
        assert!(!after.tasks.contains_key("t1"));
        assert!(!after.tasks.contains_key("t2"));
        assert_eq!(task_ids(&after, "B"), task_ids(&board, "B"));
        assert_eq!(task_ids(&after, "C"), task_ids(&board, "C"));
        assert!(after.tasks.contains_key("t4"));
        assert!(after.check_invariants().is_empty());
    }

    #[test]
    fn test_delete_task_removes_from_column() {
        let after = delete_task(&fixture(), "t1");
        assert!(!after.tasks.contains_key("t1"));
        assert_eq!(task_ids(&after, "A"), strs(&["t2"]));
    }

    #[test]
    fn test_label_cascade_touches_only_referencing_tasks() {
        let board = fixture();
        let after = delete_label(&board, "L1");
        assert!(after.tasks["t2"].label_ids.is_empty());
        assert!(after.tasks["t4"].label_ids.is_empty());
        assert_eq!(after.tasks["t1"], board.tasks["t1"]);
        assert!(after.labels.contains_key("L2"));
    }

    #[test]
    fn test_same_slot_moves_are_identity() {
        let board = fixture();
        assert_eq!(move_task(&board, "t2", "A", 1, "A", 1), board);
        assert_eq!(move_column(&board, "B", 1, 1), board);
    }

    #[test]
    fn test_reorder_within_column() {
        let board = move_task(&fixture(), "t1", "A", 0, "A", 1);
        assert_eq!(task_ids(&board, "A"), strs(&["t2", "t1"]));
    }

    #[test]
    fn test_move_task_clamps_out_of_range() {
        let board = fixture();
        let front = move_task(&board, "t4", "C", 0, "A", -1);
        assert_eq!(task_ids(&front, "A"), strs(&["t4", "t1", "t2"]));
        let back = move_task(&board, "t4", "C", 0, "A", 50);
        assert_eq!(task_ids(&back, "A"), strs(&["t1", "t2", "t4"]));
        assert!(task_ids(&back, "C").is_empty());
    }

    #[test]
    fn test_move_task_with_wrong_source_finds_owner() {
        let board = move_task(&fixture(), "t4", "B", 0, "A", 0);
        assert_eq!(task_ids(&board, "A"), strs(&["t4", "t1", "t2"]));
        assert!(task_ids(&board, "C").is_empty());
        assert!(board.check_invariants().is_empty());
    }

    #[test]
    fn test_move_column_clamps() {
        let board = move_column(&fixture(), "C", 2, -1);
        assert_eq!(board.column_order, strs(&["C", "A", "B"]));
        let board = move_column(&board, "C", 0, 10);
        assert_eq!(board.column_order, strs(&["A", "B", "C"]));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let board = fixture();
        assert_eq!(rename_column(&board, "nope", "x"), board);
        assert_eq!(delete_column(&board, "nope"), board);
        assert_eq!(add_task(&board, "nope", "t9", "x"), board);
        assert_eq!(update_task(&board, "nope", &TaskPatch::title("x")), board);
        assert_eq!(delete_task(&board, "nope"), board);
        assert_eq!(move_task(&board, "nope", "A", 0, "B", 0), board);
        assert_eq!(move_task(&board, "t1", "A", 0, "nope", 0), board);
        assert_eq!(move_column(&board, "nope", 0, 1), board);
        assert_eq!(delete_label(&board, "nope"), board);
        assert_eq!(toggle_checklist_item(&board, "t1", "nope"), board);
    }

    #[test]
    fn test_update_task_fields_are_independent() {
        let board = fixture();
        let due = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let board = update_task(&board, "t1", &TaskPatch::due_date(Some(due)));
        let board = update_task(
            &board,
            "t1",
            &TaskPatch::description(Some("Q2 launch".into())),
        );
        let task = &board.tasks["t1"];
        assert_eq!(task.due_date, Some(due));
        assert_eq!(task.description.as_deref(), Some("Q2 launch"));
        assert_eq!(task.label_ids, strs(&["L2"]));

        let cleared = update_task(&board, "t1", &TaskPatch::due_date(None));
        assert_eq!(cleared.tasks["t1"].due_date, None);

        let again = update_task(&board, "t1", &TaskPatch::due_date(Some(due)));
        assert_eq!(again, board);
    }

    #[test]
    fn test_update_task_drops_unknown_labels() {
        let board = update_task(
            &fixture(),
            "t1",
            &TaskPatch::label_ids(strs(&["L1", "ghost", "L1"])),
        );
        assert_eq!(board.tasks["t1"].label_ids, strs(&["L1"]));
    }

    #[test]
    fn test_blank_title_patch_rejected() {
        let board = fixture();
        assert_eq!(update_task(&board, "t1", &TaskPatch::title(" ")), board);
    }

    #[test]
    fn test_update_label() {
        let board = fixture();
        let patch = LabelPatch {
            name: Some("Blocker".into()),
            color: Some(LabelColor::Orange),
        };
        let after = update_label(&board, "L1", &patch);
        assert_eq!(after.labels["L1"].name, "Blocker");
        assert_eq!(after.labels["L1"].color, LabelColor::Orange);

        let blank = LabelPatch {
            name: Some("".into()),
            color: Some(LabelColor::Pink),
        };
        assert_eq!(update_label(&board, "L1", &blank), board);
    }

    #[test]
    fn test_checklist_operations() {
        let board = add_checklist_item(&fixture(), "t1", "i1", "Draft");
        let board = add_checklist_item(&board, "t1", "i2", "Review");
        let board = toggle_checklist_item(&board, "t1", "i1");
        let progress = board.tasks["t1"].checklist_progress();
        assert_eq!((progress.completed, progress.total), (1, 2));

        let board = remove_checklist_item(&board, "t1", "i1");
        assert_eq!(board.tasks["t1"].checklist.len(), 1);
        assert_eq!(add_checklist_item(&board, "t1", "i3", "  "), board);
    }

    #[test]
    fn test_oversized_attachment_rejected_before_mutation() {
        use base64::Engine;
        let board = fixture();
        let big = vec![0u8; MAX_ATTACHMENT_BYTES + 1];
        let data_url = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&big)
        );
        let attachment = Attachment::file("a1".into(), "dump.bin", &data_url, ts());
        assert!(matches!(
            validate_attachment(&attachment),
            Err(ValidationError::AttachmentTooLarge { .. })
        ));
        assert_eq!(add_attachment(&board, "t1", &attachment), board);

        let small = format!(
            "data:text/plain;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"brief")
        );
        let ok = Attachment::file("a2".into(), "brief.txt", &small, ts());
        let after = add_attachment(&board, "t1", &ok);
        assert_eq!(after.tasks["t1"].attachments, vec![ok]);
        let removed = remove_attachment(&after, "t1", "a2");
        assert!(removed.tasks["t1"].attachments.is_empty());
    }

    #[test]
    fn test_link_attachment_validation() {
        let good = Attachment::link("a1".into(), "Site", "https://example.com/brief", ts());
        assert!(validate_attachment(&good).is_ok());
        let bad = Attachment::link("a2".into(), "Site", "ftp://example.com", ts());
        assert!(matches!(
            validate_attachment(&bad),
            Err(ValidationError::InvalidLink(_))
        ));
    }

    #[test]
    fn test_store_dispatch_tracks_revisions() {
        let mut store = BoardStore::new(fixture());
        assert_eq!(store.revision(), 0);

        assert_eq!(store.dispatch(&BoardCommand::add_task("B", "Report")), Ok(true));
        assert_eq!(store.revision(), 1);

        let noop = BoardCommand::DeleteTask { task_id: "nope".into() };
        assert_eq!(store.dispatch(&noop), Ok(false));
        assert_eq!(store.revision(), 1);

        let blank = BoardCommand::RenameColumn {
            column_id: "A".into(),
            title: "".into(),
        };
        assert_eq!(store.dispatch(&blank), Err(ValidationError::BlankColumnTitle));
        assert_eq!(store.board().columns["A"].title, "Backlog");
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_command_wire_format() {
        let cmd: BoardCommand = serde_json::from_str(
            r#"{"type":"moveTask","taskId":"t1","sourceColumnId":"A","sourceIndex":0,"destColumnId":"B","destIndex":0}"#,
        )
        .unwrap();
        assert_eq!(cmd.task_id(), Some("t1"));

        let cmd: BoardCommand =
            serde_json::from_str(r#"{"type":"addTask","columnId":"A","title":"New"}"#).unwrap();
        match cmd {
            BoardCommand::AddTask { id, .. } => assert!(!id.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invariants_hold_across_random_sequences() {
        // Deterministic pseudo-random walk over the operation set.
        let mut board = fixture();
        let mut seed: u64 = 0x5eed;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        for step in 0..500 {
            let cols: Vec<String> = board.column_order.clone();
            let tasks: Vec<String> = board.tasks.keys().cloned().collect();
            let labels: Vec<String> = board.labels.keys().cloned().collect();
            let pick = |list: &[String], n: u64| -> String {
                if list.is_empty() {
                    "missing".to_string()
                } else {
                    list[(n % list.len() as u64) as usize].clone()
                }
            };
            let idx = (next() % 7) as i64 - 2;
            board = match next() % 10 {
                0 => add_column(&board, &format!("c{}", step), "Col"),
                1 => delete_column(&board, &pick(&cols, next())),
                2 | 3 => add_task(&board, &pick(&cols, next()), &format!("t{}", step), "Task"),
                4 => delete_task(&board, &pick(&tasks, next())),
                5 | 6 => {
                    let task = pick(&tasks, next());
                    let src = board.column_of(&task).unwrap_or("missing").to_string();
                    move_task(&board, &task, &src, idx, &pick(&cols, next()), idx + 1)
                }
                7 => move_column(&board, &pick(&cols, next()), idx, idx - 1),
                8 => create_label(&board, &format!("l{}", step), "Label", LabelColor::Gray),
                _ => {
                    let board = update_task(
                        &board,
                        &pick(&tasks, next()),
                        &TaskPatch::label_ids(vec![pick(&labels, next())]),
                    );
                    delete_label(&board, &pick(&labels, next()))
                }
            };
            assert!(
                board.check_invariants().is_empty(),
                "step {}: {:?}",
                step,
                board.check_invariants()
            );
        }
    }
}
