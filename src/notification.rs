use std::time::Duration;

use serde::Serialize;

use crate::clock::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Notification {
    pub fn new(
        message: impl Into<String>,
        level: NotificationLevel,
        now: Timestamp,
        duration: Duration,
    ) -> Self {
        Self {
            message: message.into(),
            level,
            created_at: now,
            expires_at: now + duration,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    pub fn time_remaining(&self, now: Timestamp) -> Duration {
        self.expires_at.since(now)
    }
}

/// Toasts, newest first.
#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(5))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(
        &mut self,
        message: impl Into<String>,
        level: NotificationLevel,
        now: Timestamp,
    ) -> &Notification {
        self.notify_for(message, level, now, self.default_duration)
    }

    pub fn notify_for(
        &mut self,
        message: impl Into<String>,
        level: NotificationLevel,
        now: Timestamp,
        duration: Duration,
    ) -> &Notification {
        self.notifications
            .insert(0, Notification::new(message, level, now, duration));
        &self.notifications[0]
    }

    pub fn info(&mut self, message: impl Into<String>, now: Timestamp) -> &Notification {
        self.notify(message, NotificationLevel::Info, now)
    }

    pub fn warn(&mut self, message: impl Into<String>, now: Timestamp) -> &Notification {
        self.notify(message, NotificationLevel::Warning, now)
    }

    pub fn error(&mut self, message: impl Into<String>, now: Timestamp) -> &Notification {
        self.notify(message, NotificationLevel::Error, now)
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self, now: Timestamp) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired(now));
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn has_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_expiration() {
        let notification = Notification::new(
            "test",
            NotificationLevel::Info,
            Timestamp(1_000),
            Duration::from_millis(50),
        );
        assert!(!notification.is_expired(Timestamp(1_049)));
        assert_eq!(
            notification.time_remaining(Timestamp(1_020)),
            Duration::from_millis(30)
        );
        assert!(notification.is_expired(Timestamp(1_050)));
    }

    #[test]
    fn manager_adds_and_retrieves() {
        let mut manager = NotificationManager::new();

        manager.info("First", Timestamp(0));
        manager.warn("Second", Timestamp(1));
        manager.error("Third", Timestamp(2));

        assert_eq!(manager.count(), 3);

        let current = manager.current().unwrap();
        assert_eq!(current.message, "Third");
        assert_eq!(current.level, NotificationLevel::Error);
    }

    #[test]
    fn manager_removes_expired() {
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(50));

        manager.info("Short-lived", Timestamp(0));
        manager.notify_for(
            "Long-lived",
            NotificationLevel::Info,
            Timestamp(0),
            Duration::from_secs(10),
        );
        assert!(!manager.update(Timestamp(10)));

        assert!(manager.update(Timestamp(60)));
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.current().unwrap().message, "Long-lived");
    }

    #[test]
    fn manager_dismiss_current() {
        let mut manager = NotificationManager::new();

        manager.info("First", Timestamp(0));
        manager.info("Second", Timestamp(0));

        assert!(manager.dismiss_current());
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.current().unwrap().message, "First");
        assert!(manager.dismiss_current());
        assert!(!manager.dismiss_current());
        assert!(!manager.has_notifications());
    }
}
