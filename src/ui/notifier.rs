use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use crate::utils::throttle::Throttle;

const REPEAT_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A short, transient, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Anything that can show a notice to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log, collapsing repeats of the same message.
pub struct TracingNotifier {
    throttle: Throttle,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::with_window(REPEAT_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            throttle: Throttle::new(window),
        }
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let Some(suppressed_count) = self.throttle.should_emit(&notice.message) else {
            return;
        };
        match notice.level {
            NoticeLevel::Success => info!(
                event_name = "ui.notice",
                suppressed_count,
                "{}",
                notice.message
            ),
            NoticeLevel::Error => warn!(
                event_name = "ui.notice",
                suppressed_count,
                "{}",
                notice.message
            ),
        }
    }
}

/// Keeps every notice, in order. Useful for consumers that render their own
/// list and for assertions.
#[derive(Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }

    pub fn count_of(&self, message: &str) -> usize {
        self.notices()
            .iter()
            .filter(|n| n.message == message)
            .count()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
