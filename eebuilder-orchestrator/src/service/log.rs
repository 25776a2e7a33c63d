//! Build Log Sink
//!
//! Ordered, append-only log capture for a single build. Every append goes
//! through the registry's atomic mutation, so readers see lines in the order
//! they were produced and never see a line once the build is terminal.

use std::sync::Arc;
use uuid::Uuid;

use crate::repository::JobRegistry;

/// Longest line kept verbatim; anything longer is truncated
pub const MAX_LINE_LENGTH: usize = 10_000;

/// Append handle for one build's log
#[derive(Clone)]
pub struct LogSink {
    registry: Arc<JobRegistry>,
    build_id: Uuid,
    tag: Option<Arc<str>>,
}

impl LogSink {
    pub fn new(registry: Arc<JobRegistry>, build_id: Uuid) -> Self {
        Self {
            registry,
            build_id,
            tag: None,
        }
    }

    /// Returns a sink that prefixes every line with `[environment] `
    pub fn for_environment(&self, environment: &str) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            build_id: self.build_id,
            tag: Some(Arc::from(environment)),
        }
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Appends one line
    ///
    /// Returns `false` if the build is gone or already terminal.
    pub async fn append(&self, line: impl AsRef<str>) -> bool {
        let line = self.format_line(line.as_ref());

        tracing::debug!(build_id = %self.build_id, "{}", line);

        self.registry
            .mutate(self.build_id, move |job| job.append_log(line))
            .await
            .unwrap_or(false)
    }

    fn format_line(&self, line: &str) -> String {
        let line = truncate_line(line);
        match &self.tag {
            Some(tag) => format!("[{}] {}", tag, line),
            None => line.to_string(),
        }
    }
}

fn truncate_line(line: &str) -> &str {
    if line.len() <= MAX_LINE_LENGTH {
        return line;
    }

    let mut end = MAX_LINE_LENGTH;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
