//! Telemetry utilities for command timing and update correlation.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for handling one update.
    pub fn update(update_id: i64, chat_id: i64) -> Span {
        info_span!("update", update_id, chat_id)
    }

    /// Span for a command execution.
    pub fn command(name: &str, chat_id: i64, user_id: Option<i64>) -> Span {
        if let Some(user_id) = user_id {
            info_span!("command", name = %name, chat_id, user_id)
        } else {
            info_span!("command", name = %name, chat_id)
        }
    }

    /// Span for one feed refresh.
    pub fn feed(url: &str) -> Span {
        info_span!("feed", url = %url)
    }
}
