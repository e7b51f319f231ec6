//! Explicit table of background job kinds.
//!
//! Built once at process start from [`JobsSettings`] and passed by reference
//! to the scheduler, the workers and the apalis monitor.

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use sqlx::PgPool;

use crate::{config::JobsSettings, domain::types::JobType};

use super::{
    context::JobWorkerContext,
    recache::{
        RecacheError, RecacheIdiomJobPayload, RecacheImplJobPayload, RecacheOutcome,
        process_recache_idiom_job, process_recache_impl_job,
    },
};

const DEFAULT_MAX_ATTEMPTS: i32 = 5;
const IDIOM_PRIORITY: i32 = 10;
const IMPL_PRIORITY: i32 = 20;

/// How one job kind is queued and executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub job_type: JobType,
    pub worker_name: &'static str,
    pub concurrency: usize,
    pub max_attempts: i32,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRegistry {
    recache_idiom: JobSpec,
    recache_impl: JobSpec,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self {
            recache_idiom: JobSpec {
                job_type: JobType::RecacheIdiom,
                worker_name: "recache-idiom-worker",
                concurrency: 2,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                priority: IDIOM_PRIORITY,
            },
            recache_impl: JobSpec {
                job_type: JobType::RecacheImpl,
                worker_name: "recache-impl-worker",
                concurrency: 4,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                priority: IMPL_PRIORITY,
            },
        }
    }
}

impl From<&JobsSettings> for JobRegistry {
    fn from(settings: &JobsSettings) -> Self {
        let defaults = Self::default();
        let max_attempts = i32::try_from(settings.recache_max_attempts.get()).unwrap_or(i32::MAX);
        Self {
            recache_idiom: JobSpec {
                concurrency: settings.recache_idiom_concurrency.get() as usize,
                max_attempts,
                ..defaults.recache_idiom
            },
            recache_impl: JobSpec {
                concurrency: settings.recache_impl_concurrency.get() as usize,
                max_attempts,
                ..defaults.recache_impl
            },
        }
    }
}

impl JobRegistry {
    pub fn spec(&self, job_type: JobType) -> &JobSpec {
        match job_type {
            JobType::RecacheIdiom => &self.recache_idiom,
            JobType::RecacheImpl => &self.recache_impl,
        }
    }

    pub fn specs(&self) -> impl Iterator<Item = &JobSpec> {
        JobType::ALL.into_iter().map(|job_type| self.spec(job_type))
    }

    /// Runs one job in-process from its queue name and JSON payload.
    pub async fn dispatch(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        ctx: &JobWorkerContext,
    ) -> Result<RecacheOutcome, RecacheError> {
        let kind = JobType::try_from(job_type)
            .map_err(|_| RecacheError::UnknownJobType(job_type.to_string()))?;
        let invalid = |err: serde_json::Error| RecacheError::InvalidPayload {
            job_type: kind.as_str(),
            message: err.to_string(),
        };

        match kind {
            JobType::RecacheIdiom => {
                let payload: RecacheIdiomJobPayload =
                    serde_json::from_value(payload).map_err(invalid)?;
                ctx.worker.recache_idiom(&payload).await
            }
            JobType::RecacheImpl => {
                let payload: RecacheImplJobPayload =
                    serde_json::from_value(payload).map_err(invalid)?;
                ctx.worker.recache_impl(&payload).await
            }
        }
    }

    /// Registers one apalis worker per job kind, each polling the Postgres
    /// storage namespaced by the kind's name.
    pub fn build_monitor(&self, pool: &PgPool, ctx: JobWorkerContext) -> Monitor {
        let idiom_storage: PostgresStorage<RecacheIdiomJobPayload> =
            PostgresStorage::new_with_config(
                pool.clone(),
                ApalisSqlConfig::new(JobType::RecacheIdiom.as_str()),
            );
        let impl_storage: PostgresStorage<RecacheImplJobPayload> =
            PostgresStorage::new_with_config(
                pool.clone(),
                ApalisSqlConfig::new(JobType::RecacheImpl.as_str()),
            );

        let idiom_worker = WorkerBuilder::new(self.recache_idiom.worker_name)
            .concurrency(self.recache_idiom.concurrency)
            .data(ctx.clone())
            .backend(idiom_storage)
            .build_fn(process_recache_idiom_job);
        let impl_worker = WorkerBuilder::new(self.recache_impl.worker_name)
            .concurrency(self.recache_impl.concurrency)
            .data(ctx)
            .backend(impl_storage)
            .build_fn(process_recache_impl_job);

        Monitor::new().register(idiom_worker).register(impl_worker)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    #[test]
    fn every_job_type_has_a_spec() {
        let registry = JobRegistry::default();
        for job_type in JobType::ALL {
            assert_eq!(registry.spec(job_type).job_type, job_type);
        }
        assert_eq!(registry.specs().count(), JobType::ALL.len());
    }

    #[test]
    fn settings_drive_concurrency_and_attempts() {
        let settings = JobsSettings {
            recache_idiom_concurrency: NonZeroU32::new(3).expect("non-zero"),
            recache_impl_concurrency: NonZeroU32::new(12).expect("non-zero"),
            recache_max_attempts: NonZeroU32::new(7).expect("non-zero"),
        };
        let registry = JobRegistry::from(&settings);

        let idiom = registry.spec(JobType::RecacheIdiom);
        assert_eq!(idiom.concurrency, 3);
        assert_eq!(idiom.max_attempts, 7);
        assert_eq!(idiom.worker_name, "recache-idiom-worker");

        let imp = registry.spec(JobType::RecacheImpl);
        assert_eq!(imp.concurrency, 12);
        assert_eq!(imp.max_attempts, 7);
    }
}
