//! User-visible status notices: plan adjustments, progress milestones and
//! failures. Diagnostic logging goes through `tracing` directly; a
//! [`StatusSink`] is the channel a host shows to its user.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
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
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

pub trait StatusSink {
    fn notify(&mut self, notice: Notice);
}

/// Forwards notices to `tracing` under the `hires_capture::notice` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(target: "hires_capture::notice", "{}", notice.message),
            NoticeLevel::Warning => tracing::warn!(target: "hires_capture::notice", "{}", notice.message),
            NoticeLevel::Error => tracing::error!(target: "hires_capture::notice", "{}", notice.message),
        }
    }
}

/// Records notices in a shared list. Clones share the same list, so a host can
/// keep one handle and give another to a task.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn contains(&self, level: NoticeLevel, needle: &str) -> bool {
        self.notices
            .borrow()
            .iter()
            .any(|n| n.level == level && n.message.contains(needle))
    }
}

impl StatusSink for CollectingSink {
    fn notify(&mut self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_shares_notices_between_clones() {
        let sink = CollectingSink::new();
        let mut handle = sink.clone();
        handle.notify(Notice::warning("scale reduced"));
        handle.notify(Notice::info("done"));

        assert_eq!(sink.notices().len(), 2);
        assert!(sink.contains(NoticeLevel::Warning, "scale"));
        assert!(!sink.contains(NoticeLevel::Error, "scale"));
        assert_eq!(sink.notices()[0].to_string(), "[warning] scale reduced");
    }
}
