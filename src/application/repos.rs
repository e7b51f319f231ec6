//! Repository traits describing persistence adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{entities::IdiomRecord, types::JobType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to idioms and their implementations.
#[async_trait]
pub trait IdiomsRepo: Send + Sync {
    /// Loads the current idiom with its full implementation list.
    async fn find_idiom(&self, id: i32) -> Result<IdiomRecord, RepoError>;
}

/// A job ready for submission to the task queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    /// Time from submission until the job becomes runnable.
    pub delay: Duration,
    pub max_attempts: i32,
    pub priority: i32,
}

/// Submission side of the background task queue.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Submits every job of `jobs` atomically: either all are queued or none.
    /// Returns the assigned job ids in submission order.
    async fn enqueue_jobs(&self, jobs: Vec<NewJobRecord>) -> Result<Vec<String>, RepoError>;

    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut ids = self.enqueue_jobs(vec![job]).await?;
        ids.pop()
            .ok_or_else(|| RepoError::from_persistence("queue returned no job id"))
    }
}
