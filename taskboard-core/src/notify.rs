/// Fire-and-forget user notifications (toasts).
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.to_string(),
            description: description.into(),
        }
    }

    pub fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Destructive,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

/// Sink for notifications. Delivery is never acknowledged.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => log::info!("[taskboard.notify] {}: {}", n.title, n.description),
            Severity::Destructive => {
                log::warn!("[taskboard.notify] {}: {}", n.title, n.description)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects notifications for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub seen: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn taken(&self) -> Vec<Notification> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[test]
    fn test_constructors_set_severity() {
        assert_eq!(Notification::info("a", "b").severity, Severity::Info);
        assert_eq!(
            Notification::destructive("a", "b").severity,
            Severity::Destructive
        );
    }

    #[test]
    fn test_recording_notifier_drains() {
        let notifier = RecordingNotifier::default();
        notifier.notify(Notification::info("Saved", "Board saved"));
        LogNotifier.notify(Notification::destructive("Oops", "logged only"));
        assert_eq!(notifier.taken().len(), 1);
        assert!(notifier.taken().is_empty());
    }
}
