use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::types::PgInterval;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

const PENDING: &str = "Pending";

/// Postgres interval for a job delay, truncated to whole microseconds.
fn delay_interval(delay: Duration) -> Result<PgInterval, RepoError> {
    let microseconds = i64::try_from(delay.as_micros()).map_err(|err| RepoError::InvalidInput {
        message: format!("job delay out of range: {err}"),
    })?;
    Ok(PgInterval {
        months: 0,
        days: 0,
        microseconds,
    })
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_jobs(&self, jobs: Vec<NewJobRecord>) -> Result<Vec<String>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut ids = Vec::with_capacity(jobs.len());

        for job in jobs {
            let id: String = sqlx::query_scalar(
                r#"
                SELECT (apalis.push_job($1, $2::json, $3, now() + $4::interval, $5, $6)).id
                "#,
            )
            .bind(job.job_type.as_str())
            .bind(&job.payload)
            .bind(PENDING)
            .bind(delay_interval(job.delay)?)
            .bind(job.max_attempts)
            .bind(job.priority)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            ids.push(id);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(ids)
    }
}
