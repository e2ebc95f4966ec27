use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// File attachments are capped at 1 MiB of decoded payload.
pub const MAX_ATTACHMENT_BYTES: usize = 1024 * 1024;

/// Title used when a column is added without one.
pub const DEFAULT_COLUMN_TITLE: &str = "New Column";

/// Column titles of a freshly seeded board, in rendering order.
pub const SEED_COLUMNS: &[&str] = &["To Do", "In Progress", "Done"];

/// Labels every freshly seeded board starts with.
pub const SEED_LABELS: &[(&str, LabelColor)] = &[
    ("High Priority", LabelColor::Red),
    ("Client Review", LabelColor::Purple),
    ("Design", LabelColor::Blue),
    ("Content", LabelColor::Green),
];

/// Generate a fresh entity identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    #[default]
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: LabelColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Link,
    File,
}

/// A link or an embedded file hanging off a task.
///
/// For `Link` the `url` is an external http(s) URL, for `File` it is a
/// base64 `data:` URL carrying the payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn link(id: String, name: &str, url: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            url: url.trim().to_string(),
            kind: AttachmentKind::Link,
            created_at,
        }
    }

    pub fn file(id: String, name: &str, data_url: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            url: data_url.to_string(),
            kind: AttachmentKind::File,
            created_at,
        }
    }

    /// Base64 body of a `data:` URL, if this is one.
    pub fn data_payload(&self) -> Option<&str> {
        let rest = self.url.strip_prefix("data:")?;
        let (meta, body) = rest.split_once(',')?;
        meta.ends_with(";base64").then_some(body)
    }
}

/// Derived checklist completion, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistProgress {
    pub completed: usize,
    pub total: usize,
}

/// A task record. Membership and order live in the owning column's
/// `task_ids`; the task itself holds no back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Task {
    pub fn new(id: String, title: &str) -> Self {
        Self {
            id,
            title: title.trim().to_string(),
            description: None,
            label_ids: Vec::new(),
            due_date: None,
            checklist: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn checklist_progress(&self) -> ChecklistProgress {
        ChecklistProgress {
            completed: self.checklist.iter().filter(|i| i.completed).count(),
            total: self.checklist.len(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

impl Column {
    pub fn new(id: String, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            task_ids: Vec::new(),
        }
    }
}

/// Root aggregate and the unit of persistence: one document per board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, Label>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Empty board with no columns, tasks or labels.
    pub fn empty(id: String, name: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            columns: BTreeMap::new(),
            tasks: BTreeMap::new(),
            column_order: Vec::new(),
            labels: BTreeMap::new(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Default board created the first time a user has none.
    pub fn seed(id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        let mut board = Self::empty(id, "My Board", user_id, now);
        for title in SEED_COLUMNS {
            let column = Column::new(new_id(), title);
            board.column_order.push(column.id.clone());
            board.columns.insert(column.id.clone(), column);
        }
        for (name, color) in SEED_LABELS {
            let label = Label {
                id: new_id(),
                name: name.to_string(),
                color: *color,
            };
            board.labels.insert(label.id.clone(), label);
        }
        board
    }

    /// Columns in rendering order. Ids without a column are skipped.
    pub fn ordered_columns(&self) -> Vec<&Column> {
        self.column_order
            .iter()
            .filter_map(|id| self.columns.get(id))
            .collect()
    }

    /// Column currently listing `task_id`.
    pub fn column_of(&self, task_id: &str) -> Option<&str> {
        self.columns
            .values()
            .find(|col| col.task_ids.iter().any(|id| id == task_id))
            .map(|col| col.id.as_str())
    }

    /// Labels attached to a task, in the task's order.
    pub fn task_labels(&self, task: &Task) -> Vec<&Label> {
        task.label_ids
            .iter()
            .filter_map(|id| self.labels.get(id))
            .collect()
    }

    /// Every dangling or duplicated reference in the board.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let mut seen_columns = BTreeSet::new();
        for id in &self.column_order {
            if !self.columns.contains_key(id) {
                violations.push(InvariantViolation::MissingColumn(id.clone()));
            }
            if !seen_columns.insert(id.as_str()) {
                violations.push(InvariantViolation::DuplicateColumn(id.clone()));
            }
        }
        for id in self.columns.keys() {
            if !seen_columns.contains(id.as_str()) {
                violations.push(InvariantViolation::UnorderedColumn(id.clone()));
            }
        }

        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for col in self.columns.values() {
            for task_id in &col.task_ids {
                if !self.tasks.contains_key(task_id) {
                    violations.push(InvariantViolation::MissingTask {
                        column_id: col.id.clone(),
                        task_id: task_id.clone(),
                    });
                }
                if owners.insert(task_id.as_str(), col.id.as_str()).is_some() {
                    violations.push(InvariantViolation::DuplicateTask(task_id.clone()));
                }
            }
        }

        for task in self.tasks.values() {
            if !owners.contains_key(task.id.as_str()) {
                violations.push(InvariantViolation::OrphanTask(task.id.clone()));
            }
            for label_id in &task.label_ids {
                if !self.labels.contains_key(label_id) {
                    violations.push(InvariantViolation::MissingLabel {
                        task_id: task.id.clone(),
                        label_id: label_id.clone(),
                    });
                }
            }
        }

        violations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("column order references missing column {0}")]
    MissingColumn(String),

    #[error("column {0} appears more than once in column order")]
    DuplicateColumn(String),

    #[error("column {0} is not listed in column order")]
    UnorderedColumn(String),

    #[error("column {column_id} references missing task {task_id}")]
    MissingTask { column_id: String, task_id: String },

    #[error("task {0} is listed in more than one place")]
    DuplicateTask(String),

    #[error("task {0} is not listed in any column")]
    OrphanTask(String),

    #[error("task {task_id} references missing label {label_id}")]
    MissingLabel { task_id: String, label_id: String },
}

/// Field-wise partial update of a task. `None` leaves a field untouched;
/// for the nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<ChecklistItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl TaskPatch {
    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn description(description: Option<String>) -> Self {
        Self {
            description: Some(description),
            ..Self::default()
        }
    }

    pub fn label_ids(label_ids: Vec<String>) -> Self {
        Self {
            label_ids: Some(label_ids),
            ..Self::default()
        }
    }

    pub fn due_date(due_date: Option<NaiveDate>) -> Self {
        Self {
            due_date: Some(due_date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
}

/// Distinguishes an explicit `null` (clear) from a missing field (keep).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
