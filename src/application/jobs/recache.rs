use std::{sync::Arc, time::Duration};

use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    application::{
        render::{PageRenderer, RenderError, RenderParams},
        repos::{IdiomsRepo, JobsRepo, RepoError},
    },
    cache::{CacheKey, PageCache},
    domain::{entities::IdiomRecord, types::JobType},
};

use super::{
    context::{JobWorkerContext, job_failed},
    queue::{enqueue_batch, enqueue_job, new_job_record},
    registry::JobRegistry,
};

const SOURCE: &str = "application::jobs::recache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecacheIdiomJobPayload {
    pub idiom_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecacheImplJobPayload {
    /// Cache key of the implementation page, computed when the parent job ran.
    pub impl_path: String,
    pub idiom_id: i32,
    pub idiom_title: String,
    pub impl_id: i32,
    pub impl_lang: String,
}

#[derive(Debug, Error)]
#[error("failed to schedule refresh of idiom {idiom_id}")]
pub struct SchedulingError {
    pub idiom_id: i32,
    #[source]
    pub source: RepoError,
}

#[derive(Debug, Error)]
pub enum RecacheError {
    #[error("lookup of idiom {idiom_id} failed")]
    Lookup {
        idiom_id: i32,
        #[source]
        source: RepoError,
    },
    #[error("implementation {impl_id} of idiom {idiom_id} no longer exists")]
    MissingImplementation { idiom_id: i32, impl_id: i32 },
    #[error("rendering `{key}` failed")]
    Render {
        key: String,
        #[source]
        source: RenderError,
    },
    #[error("invalid `{job_type}` payload: {message}")]
    InvalidPayload {
        job_type: &'static str,
        message: String,
    },
    #[error("unknown job type `{0}`")]
    UnknownJobType(String),
}

/// What one finished regeneration job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecacheOutcome {
    pub key: CacheKey,
    pub bytes: usize,
    /// Whether the cache write succeeded; a failed write still completes the job.
    pub cached: bool,
    pub children_enqueued: usize,
    pub children_failed: usize,
}

/// Submits the "now" and "keep warm" regeneration jobs for an idiom.
#[derive(Clone)]
pub struct RegenerationScheduler {
    jobs: Arc<dyn JobsRepo>,
    registry: Arc<JobRegistry>,
    keep_warm_delay: Duration,
}

impl RegenerationScheduler {
    pub fn new(
        jobs: Arc<dyn JobsRepo>,
        registry: Arc<JobRegistry>,
        keep_warm_delay: Duration,
    ) -> Self {
        Self {
            jobs,
            registry,
            keep_warm_delay,
        }
    }

    pub fn keep_warm_delay(&self) -> Duration {
        self.keep_warm_delay
    }

    /// Enqueues two idiom jobs, immediate and delayed by the keep-warm delay,
    /// as one batch. Returns the queue ids in that order.
    pub async fn schedule_refresh(&self, idiom_id: i32) -> Result<Vec<String>, SchedulingError> {
        let spec = self.registry.spec(JobType::RecacheIdiom);
        let payload = RecacheIdiomJobPayload { idiom_id };
        let fail = |source: RepoError| SchedulingError { idiom_id, source };

        let records = vec![
            new_job_record(spec, &payload, Duration::ZERO).map_err(fail)?,
            new_job_record(spec, &payload, self.keep_warm_delay).map_err(fail)?,
        ];

        match enqueue_batch(self.jobs.as_ref(), records).await {
            Ok(ids) => {
                info!(
                    target = SOURCE,
                    idiom_id,
                    jobs = ?ids,
                    keep_warm_secs = self.keep_warm_delay.as_secs(),
                    "scheduled idiom refresh"
                );
                Ok(ids)
            }
            Err(source) => {
                let err = fail(source);
                error!(target = SOURCE, idiom_id, error = %err, "could not schedule idiom refresh");
                Err(err)
            }
        }
    }
}

/// Executes regeneration jobs: render, write back, and fan out to children.
pub struct RegenerationWorker {
    idioms: Arc<dyn IdiomsRepo>,
    jobs: Arc<dyn JobsRepo>,
    renderer: Arc<dyn PageRenderer>,
    cache: PageCache,
    registry: Arc<JobRegistry>,
}

impl RegenerationWorker {
    pub fn new(
        idioms: Arc<dyn IdiomsRepo>,
        jobs: Arc<dyn JobsRepo>,
        renderer: Arc<dyn PageRenderer>,
        cache: PageCache,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            idioms,
            jobs,
            renderer,
            cache,
            registry,
        }
    }

    /// Re-renders the idiom page, then queues one job per current implementation.
    pub async fn recache_idiom(
        &self,
        payload: &RecacheIdiomJobPayload,
    ) -> Result<RecacheOutcome, RecacheError> {
        let idiom = self.lookup(payload.idiom_id).await?;
        let key = CacheKey::for_idiom(&idiom);
        let params = RenderParams::idiom_page(idiom.id, &idiom.title);

        let (bytes, cached) = self.render_and_store(&key, &params).await?;
        let (children_enqueued, children_failed) = self.fan_out(&idiom).await;

        info!(
            target = SOURCE,
            idiom_id = idiom.id,
            key = %key,
            bytes,
            cached,
            children_enqueued,
            children_failed,
            "recached idiom page"
        );

        Ok(RecacheOutcome {
            key,
            bytes,
            cached,
            children_enqueued,
            children_failed,
        })
    }

    /// Re-renders one implementation page.
    pub async fn recache_impl(
        &self,
        payload: &RecacheImplJobPayload,
    ) -> Result<RecacheOutcome, RecacheError> {
        let idiom = self.lookup(payload.idiom_id).await?;
        if idiom.implementation(payload.impl_id).is_none() {
            let err = RecacheError::MissingImplementation {
                idiom_id: payload.idiom_id,
                impl_id: payload.impl_id,
            };
            warn!(target = SOURCE, error = %err, "dropping orphaned implementation job");
            return Err(err);
        }

        let key = CacheKey::from_path(&payload.impl_path);
        let params = RenderParams::impl_page(
            payload.idiom_id,
            &payload.idiom_title,
            payload.impl_id,
            &payload.impl_lang,
        );
        let (bytes, cached) = self.render_and_store(&key, &params).await?;

        info!(
            target = SOURCE,
            idiom_id = payload.idiom_id,
            impl_id = payload.impl_id,
            key = %key,
            bytes,
            cached,
            "recached implementation page"
        );

        Ok(RecacheOutcome {
            key,
            bytes,
            cached,
            children_enqueued: 0,
            children_failed: 0,
        })
    }

    async fn lookup(&self, idiom_id: i32) -> Result<IdiomRecord, RecacheError> {
        self.idioms.find_idiom(idiom_id).await.map_err(|source| {
            let err = RecacheError::Lookup { idiom_id, source };
            error!(target = SOURCE, idiom_id, error = %err, "idiom lookup failed");
            err
        })
    }

    async fn render_and_store(
        &self,
        key: &CacheKey,
        params: &RenderParams,
    ) -> Result<(usize, bool), RecacheError> {
        let page = self.renderer.render(params).await.map_err(|source| {
            let err = RecacheError::Render {
                key: key.to_string(),
                source,
            };
            error!(target = SOURCE, key = %key, error = %err, "page render failed");
            err
        })?;

        let bytes = page.len();
        // Write failures are already logged by the cache; readers fall back to rendering.
        let cached = self.cache.write_page(key, page).await.is_ok();
        Ok((bytes, cached))
    }

    async fn fan_out(&self, idiom: &IdiomRecord) -> (usize, usize) {
        let spec = self.registry.spec(JobType::RecacheImpl);
        let mut enqueued = 0;
        let mut failed = 0;

        for imp in &idiom.implementations {
            let payload = RecacheImplJobPayload {
                impl_path: CacheKey::for_implementation(idiom, imp).to_string(),
                idiom_id: idiom.id,
                idiom_title: idiom.title.clone(),
                impl_id: imp.id,
                impl_lang: imp.language_name.clone(),
            };

            match enqueue_job(self.jobs.as_ref(), spec, &payload, Duration::ZERO).await {
                Ok(_) => enqueued += 1,
                Err(err) => {
                    failed += 1;
                    warn!(
                        target = SOURCE,
                        idiom_id = idiom.id,
                        impl_id = imp.id,
                        error = %err,
                        "could not enqueue implementation job"
                    );
                }
            }
        }

        (enqueued, failed)
    }
}

pub async fn process_recache_idiom_job(
    payload: RecacheIdiomJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    context
        .worker
        .recache_idiom(&payload)
        .await
        .map(|_| ())
        .map_err(job_failed)
}

pub async fn process_recache_impl_job(
    payload: RecacheImplJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    context
        .worker
        .recache_impl(&payload)
        .await
        .map(|_| ())
        .map_err(job_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_serialize_as_plain_values() {
        let payload = RecacheImplJobPayload {
            impl_path: "/idiom/42/reverse-a-list/go".to_string(),
            idiom_id: 42,
            idiom_title: "Reverse a list".to_string(),
            impl_id: 7,
            impl_lang: "Go".to_string(),
        };

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["impl_path"], "/idiom/42/reverse-a-list/go");
        assert_eq!(value["impl_lang"], "Go");

        let back: RecacheImplJobPayload = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, payload);
    }

    #[test]
    fn scheduling_error_keeps_the_queue_cause() {
        let err = SchedulingError {
            idiom_id: 42,
            source: RepoError::Timeout,
        };
        assert_eq!(err.to_string(), "failed to schedule refresh of idiom 42");
        assert!(std::error::Error::source(&err).is_some());
    }
}
