//! In-app notifications pushed over the stream.

use memeshare_shared::Notification;

#[derive(Debug, Default)]
pub struct NotificationStore {
    /// Newest first.
    pub items: Vec<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a pushed notification, deduplicating by id.
    /// Returns `false` for a duplicate delivery.
    pub fn apply(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|existing| existing.id == notification.id) {
            return false;
        }
        self.items.insert(0, notification);
        true
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|item| !item.read).count()
    }

    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.read = true;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
