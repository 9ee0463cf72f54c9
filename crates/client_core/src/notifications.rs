use shared::{domain::NotificationId, protocol::Notification};

/// Unread counter shown on the notification bell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationBadge {
    unread: usize,
}

impl NotificationBadge {
    pub fn from_items(items: &[Notification]) -> Self {
        Self {
            unread: items.iter().filter(|item| !item.read).count(),
        }
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// `None` hides the badge.
    pub fn label(&self) -> Option<String> {
        (self.unread > 0).then(|| self.unread.to_string())
    }
}

pub fn unread_ids(items: &[Notification]) -> Vec<NotificationId> {
    items
        .iter()
        .filter(|item| !item.read)
        .map(|item| item.id)
        .collect()
}
