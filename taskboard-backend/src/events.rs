/// Per-user events fanned out to `GET /events` subscribers.
use serde::Serialize;
use taskboard_core::notify::{LogNotifier, Notification, Notifier};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardEvent {
    BoardChanged { user_id: String, revision: u64 },
    Notification {
        user_id: String,
        #[serde(flatten)]
        notification: Notification,
    },
    SignedOut { user_id: String },
}

impl BoardEvent {
    pub fn user_id(&self) -> &str {
        match self {
            BoardEvent::BoardChanged { user_id, .. }
            | BoardEvent::Notification { user_id, .. }
            | BoardEvent::SignedOut { user_id } => user_id,
        }
    }
}

/// Routes a session's notifications to its own user's event stream and
/// to the log.
pub struct UserNotifier {
    user_id: String,
    tx: broadcast::Sender<BoardEvent>,
}

impl UserNotifier {
    pub fn new(user_id: &str, tx: broadcast::Sender<BoardEvent>) -> Self {
        Self {
            user_id: user_id.to_string(),
            tx,
        }
    }
}

impl Notifier for UserNotifier {
    fn notify(&self, notification: Notification) {
        LogNotifier.notify(notification.clone());
        // No subscribers is fine; toasts are not queued.
        let _ = self.tx.send(BoardEvent::Notification {
            user_id: self.user_id.clone(),
            notification,
        });
    }
}
