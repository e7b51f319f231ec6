use std::time::Duration;

use metrics::counter;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::registry::JobSpec;

/// Build a queue record for `payload` under the job kind described by `spec`.
pub fn new_job_record<P>(
    spec: &JobSpec,
    payload: &P,
    delay: Duration,
) -> Result<NewJobRecord, RepoError>
where
    P: serde::Serialize,
{
    let payload = serde_json::to_value(payload)
        .map_err(|err| RepoError::from_persistence(err.to_string()))?;
    Ok(NewJobRecord {
        job_type: spec.job_type,
        payload,
        delay,
        max_attempts: spec.max_attempts,
        priority: spec.priority,
    })
}

/// Enqueue a single job with the provided payload, returning the assigned id.
pub async fn enqueue_job<J, P>(
    repo: &J,
    spec: &JobSpec,
    payload: &P,
    delay: Duration,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
    P: serde::Serialize,
{
    let record = new_job_record(spec, payload, delay)?;
    let id = repo.enqueue_job(record).await?;
    counter!("recache_jobs_enqueued_total", "job_type" => spec.job_type.as_str()).increment(1);
    Ok(id)
}

/// Submit `records` as one batch; either every job is queued or none is.
pub async fn enqueue_batch<J>(
    repo: &J,
    records: Vec<NewJobRecord>,
) -> Result<Vec<String>, RepoError>
where
    J: JobsRepo + ?Sized,
{
    let kinds: Vec<&'static str> = records.iter().map(|r| r.job_type.as_str()).collect();
    let ids = repo.enqueue_jobs(records).await?;
    for kind in kinds {
        counter!("recache_jobs_enqueued_total", "job_type" => kind).increment(1);
    }
    Ok(ids)
}
