//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::Error as SqlxError;
use time::OffsetDateTime;

use recache::{
    application::{
        jobs::{
            JobRegistry, JobWorkerContext, RecacheOutcome, RegenerationScheduler,
            RegenerationWorker,
        },
        page_cache::PageCacheService,
        render::{IdiomPageRenderer, PageRenderer, RenderError, RenderParams},
        repos::{IdiomsRepo, JobsRepo, NewJobRecord, RepoError},
    },
    cache::{BackendError, CacheConfig, KvBackend, MemoryKvStore, PageCache},
    domain::entities::{IdiomRecord, ImplementationRecord},
    infra::http::HealthProbe,
};

pub const KEEP_WARM: Duration = Duration::from_secs(24 * 3600 + 600);

pub fn implementation(id: i32, idiom_id: i32, lang: &str, code: &str) -> ImplementationRecord {
    ImplementationRecord {
        id,
        idiom_id,
        language_name: lang.to_string(),
        imports_block: None,
        code_block: code.to_string(),
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

/// Idiom 42 with a Go and a Rust implementation.
pub fn reverse_a_list() -> IdiomRecord {
    IdiomRecord {
        id: 42,
        title: "Reverse a list".to_string(),
        lead_paragraph: "Reverse the order of the elements of the list x.".to_string(),
        version: 3,
        implementations: vec![
            implementation(7, 42, "Go", "slices.Reverse(x)"),
            implementation(8, 42, "Rust", "x.reverse();"),
        ],
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[derive(Default)]
pub struct InMemoryIdioms {
    idioms: Mutex<HashMap<i32, IdiomRecord>>,
    lookups: AtomicUsize,
}

impl InMemoryIdioms {
    pub fn with(idioms: impl IntoIterator<Item = IdiomRecord>) -> Self {
        let repo = Self::default();
        for idiom in idioms {
            repo.insert(idiom);
        }
        repo
    }

    pub fn insert(&self, idiom: IdiomRecord) {
        self.idioms
            .lock()
            .expect("idioms lock")
            .insert(idiom.id, idiom);
    }

    pub fn remove(&self, id: i32) {
        self.idioms.lock().expect("idioms lock").remove(&id);
    }

    pub fn remove_implementation(&self, idiom_id: i32, impl_id: i32) {
        if let Some(idiom) = self.idioms.lock().expect("idioms lock").get_mut(&idiom_id) {
            idiom.implementations.retain(|imp| imp.id != impl_id);
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdiomsRepo for InMemoryIdioms {
    async fn find_idiom(&self, id: i32) -> Result<IdiomRecord, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.idioms
            .lock()
            .expect("idioms lock")
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }
}

/// Queue fake that records every accepted batch.
#[derive(Default)]
pub struct RecordingJobs {
    batches: Mutex<Vec<Vec<NewJobRecord>>>,
    down: AtomicBool,
    rejected_impls: Mutex<Vec<i32>>,
    next_id: AtomicUsize,
}

impl RecordingJobs {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Rejects any batch holding a job for implementation `impl_id`.
    pub fn reject_impl(&self, impl_id: i32) {
        self.rejected_impls
            .lock()
            .expect("rejected lock")
            .push(impl_id);
    }

    pub fn batches(&self) -> Vec<Vec<NewJobRecord>> {
        self.batches.lock().expect("batches lock").clone()
    }

    pub fn jobs(&self) -> Vec<NewJobRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl JobsRepo for RecordingJobs {
    async fn enqueue_jobs(&self, jobs: Vec<NewJobRecord>) -> Result<Vec<String>, RepoError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let rejected = self.rejected_impls.lock().expect("rejected lock").clone();
        let hits_rejected = jobs.iter().any(|job| {
            job.payload["impl_id"]
                .as_i64()
                .is_some_and(|id| rejected.iter().any(|r| i64::from(*r) == id))
        });
        if hits_rejected {
            return Err(RepoError::from_persistence("queue refused job"));
        }

        let ids = jobs
            .iter()
            .map(|_| format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect();
        self.batches.lock().expect("batches lock").push(jobs);
        Ok(ids)
    }
}

/// Key-value backend that records TTLs and can be switched off.
pub struct TestBackend {
    inner: MemoryKvStore,
    down: AtomicBool,
    puts: Mutex<Vec<(String, Duration)>>,
}

impl TestBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: MemoryKvStore::new(config),
            down: AtomicBool::new(false),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn puts(&self) -> Vec<(String, Duration)> {
        self.puts.lock().expect("puts lock").clone()
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            Err(BackendError::unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvBackend for TestBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), BackendError> {
        self.check()?;
        self.puts
            .lock()
            .expect("puts lock")
            .push((key.to_string(), ttl));
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.check()?;
        self.inner.delete(key).await
    }
}

/// Renderer that always fails.
pub struct BrokenRenderer;

#[async_trait]
impl PageRenderer for BrokenRenderer {
    async fn render(&self, _params: &RenderParams) -> Result<Bytes, RenderError> {
        Err(RenderError::Template("template exploded".to_string()))
    }
}

pub struct HealthyDb;

#[async_trait]
impl HealthProbe for HealthyDb {
    async fn health_check(&self) -> Result<(), SqlxError> {
        Ok(())
    }
}

/// Wires the page cache pipeline over in-memory collaborators.
pub struct Harness {
    pub idioms: Arc<InMemoryIdioms>,
    pub jobs: Arc<RecordingJobs>,
    pub backend: Arc<TestBackend>,
    pub cache: PageCache,
    pub registry: Arc<JobRegistry>,
    pub pages: Arc<PageCacheService>,
    pub context: JobWorkerContext,
    dispatched: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(CacheConfig::default(), None)
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_renderer(renderer: Arc<dyn PageRenderer>) -> Self {
        Self::build(CacheConfig::default(), Some(renderer))
    }

    fn build(config: CacheConfig, renderer: Option<Arc<dyn PageRenderer>>) -> Self {
        let idioms = Arc::new(InMemoryIdioms::with([reverse_a_list()]));
        let jobs = Arc::new(RecordingJobs::default());
        let backend = Arc::new(TestBackend::new(&config));
        let cache = PageCache::new(backend.clone(), &config);
        let registry = Arc::new(JobRegistry::default());

        let idioms_repo: Arc<dyn IdiomsRepo> = idioms.clone();
        let jobs_repo: Arc<dyn JobsRepo> = jobs.clone();
        let renderer: Arc<dyn PageRenderer> = match renderer {
            Some(renderer) => renderer,
            None => Arc::new(IdiomPageRenderer::new(idioms_repo.clone())),
        };

        let scheduler = RegenerationScheduler::new(
            jobs_repo.clone(),
            registry.clone(),
            config.keep_warm_delay(),
        );
        let pages = Arc::new(PageCacheService::new(
            idioms_repo.clone(),
            renderer.clone(),
            cache.clone(),
            scheduler,
        ));
        let worker = Arc::new(RegenerationWorker::new(
            idioms_repo,
            jobs_repo,
            renderer,
            cache.clone(),
            registry.clone(),
        ));

        Self {
            idioms,
            jobs,
            backend,
            cache,
            registry,
            pages,
            context: JobWorkerContext::new(worker),
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Executes queued jobs that are due now, including the ones they enqueue,
    /// the way a worker pool would.
    pub async fn run_due_jobs(&self) -> Vec<RecacheOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let jobs = self.jobs.jobs();
            let start = self.dispatched.load(Ordering::SeqCst);
            if start >= jobs.len() {
                return outcomes;
            }
            self.dispatched.store(jobs.len(), Ordering::SeqCst);

            for job in &jobs[start..] {
                if !job.delay.is_zero() {
                    continue;
                }
                let outcome = self
                    .registry
                    .dispatch(job.job_type.as_str(), job.payload.clone(), &self.context)
                    .await
                    .expect("job succeeds");
                outcomes.push(outcome);
            }
        }
    }
}
