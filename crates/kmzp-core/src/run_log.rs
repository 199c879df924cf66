use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub status: LogStatus,
    pub message: String,
}

/// Append-only audit trail of one extraction run.
///
/// Every entry is mirrored to `tracing` as it is recorded.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, status: LogStatus, message: impl Into<String>) {
        let message = message.into();
        match status {
            LogStatus::Info | LogStatus::Success => tracing::info!("{}", message),
            LogStatus::Warning => tracing::warn!("{}", message),
            LogStatus::Error => tracing::error!("{}", message),
        }
        self.entries.push(LogEntry { status, message });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogStatus::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(LogStatus::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(LogStatus::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogStatus::Error, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
