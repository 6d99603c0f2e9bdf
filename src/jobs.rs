use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    DiscoverPrograms,
    DiscoverCourses,
    Program,
    Course,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::DiscoverPrograms => "discover-programs",
            JobType::DiscoverCourses => "discover-courses",
            JobType::Program => "program",
            JobType::Course => "course",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discover-programs" => Some(JobType::DiscoverPrograms),
            "discover-courses" => Some(JobType::DiscoverCourses),
            "program" => Some(JobType::Program),
            "course" => Some(JobType::Course),
            _ => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status transitions monotonically:
/// pending → processing → {completed | failed}. Retries re-enter at
/// processing via queue redelivery; there is no separate retrying state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub url: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The sink rejected the scraped payload (no id returned).
    Validation,
    /// Fetch-level failure: connect, timeout, non-success status.
    Network,
    /// Anything not already classified.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified job failure, recorded as exactly one error-log row before the
/// message goes back to the queue.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
}

impl JobError {
    pub fn validation(message: impl Into<String>) -> Self {
        JobError { kind: ErrorKind::Validation, message: message.into(), stack: None }
    }

    pub fn network(message: impl Into<String>) -> Self {
        JobError { kind: ErrorKind::Network, message: message.into(), stack: None }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        JobError { kind: ErrorKind::Unknown, message: message.into(), stack: None }
    }

    /// Fold an arbitrary error into the taxonomy. Already-classified errors
    /// pass through; reqwest failures become `network`; everything else is
    /// `unknown` with the full chain kept as the stack.
    pub fn classify(err: anyhow::Error) -> Self {
        let err = match err.downcast::<JobError>() {
            Ok(job_err) => return job_err,
            Err(other) => other,
        };
        let stack = Some(format!("{err:?}"));
        let message = format!("{err:#}");
        if err.chain().any(|c| c.is::<reqwest::Error>()) {
            JobError { kind: ErrorKind::Network, message, stack }
        } else {
            JobError { kind: ErrorKind::Unknown, message, stack }
        }
    }
}

// ── Tests ──
