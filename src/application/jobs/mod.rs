mod context;
mod queue;
mod recache;
mod registry;

pub use context::{JobWorkerContext, job_failed};
pub use queue::{enqueue_batch, enqueue_job, new_job_record};
pub use recache::{
    RecacheError, RecacheIdiomJobPayload, RecacheImplJobPayload, RecacheOutcome,
    RegenerationScheduler, RegenerationWorker, SchedulingError, process_recache_idiom_job,
    process_recache_impl_job,
};
pub use registry::{JobRegistry, JobSpec};
