//! User-facing notifications.
//!
//! Tasks report noteworthy events (failures, anchors going live, free apps,
//! unread messages) through a [`NotificationSink`]. Delivery is
//! fire-and-forget: a sink never reports failure back to the task.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Maximum number of action buttons on one notification.
pub const MAX_ACTIONS: usize = 2;

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: String,
    /// Page opened when the action is chosen; `None` just dismisses.
    pub url: Option<String>,
}

/// One notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Icon name, usually the site id.
    pub icon: Option<String>,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            icon: None,
            actions: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Add a button. Buttons beyond [`MAX_ACTIONS`] are dropped.
    pub fn with_action(mut self, label: impl Into<String>, url: Option<String>) -> Self {
        let label = label.into();
        if self.actions.len() >= MAX_ACTIONS {
            tracing::warn!(title = %self.title, %label, "dropping notification action over limit");
            return self;
        }
        self.actions.push(NotificationAction { label, url });
        self
    }

    /// The common "open / dismiss" pair.
    pub fn with_open(self, url: impl Into<String>) -> Self {
        self.with_action("打开", Some(url.into()))
            .with_action("取消", None)
    }

    /// URL of the first action that opens a page.
    pub fn open_url(&self) -> Option<&str> {
        self.actions.iter().find_map(|a| a.url.as_deref())
    }
}

/// Destination for notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Shared sink handle passed to tasks.
pub type SharedSink = Arc<dyn NotificationSink>;

/// Logs notifications at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        tracing::info!(
            title = %n.title,
            icon = n.icon.as_deref().unwrap_or_default(),
            open = n.open_url().unwrap_or_default(),
            "{}",
            n.message
        );
    }
}

/// Forwards notifications to a host loop over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, n: Notification) {
        if self.tx.send(n).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn notifications(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.notifications().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, n: Notification) {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(n),
            Err(poisoned) => poisoned.into_inner().push(n),
        }
    }
}
