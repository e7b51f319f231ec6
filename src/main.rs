use std::{process, sync::Arc};

use recache::{
    application::{
        error::AppError,
        jobs::{JobRegistry, JobWorkerContext, RegenerationScheduler, RegenerationWorker},
        page_cache::PageCacheService,
        render::{IdiomPageRenderer, PageRenderer},
        repos::{IdiomsRepo, JobsRepo},
    },
    cache::{CacheConfig, KvBackend, MemoryKvStore, PageCache},
    config,
    infra::{
        admin_client::AdminClient,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HealthProbe, HttpState},
        telemetry,
    },
};
use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Recache(args) => run_recache(settings, args).await,
    }
}

struct ApplicationContext {
    pages: Arc<PageCacheService>,
    registry: Arc<JobRegistry>,
    worker_context: JobWorkerContext,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(
        http_repositories.clone(),
        job_repositories.clone(),
        &settings,
    );

    let monitor = app
        .registry
        .build_monitor(job_repositories.pool(), app.worker_context.clone())
        .shutdown_timeout(settings.server.graceful_shutdown);
    let monitor_handle = tokio::spawn(async move {
        monitor
            .run_with_signal(tokio::signal::ctrl_c())
            .await
            .map_err(|err| InfraError::jobs(err.to_string()))
    });

    let db: Arc<dyn HealthProbe> = http_repositories;
    let http_state = HttpState {
        pages: app.pages.clone(),
        db: db.clone(),
    };
    let admin_state = AdminState {
        pages: app.pages,
        db,
    };

    let served = serve_http(&settings, http_state, admin_state).await;

    let monitored = match monitor_handle.await {
        Ok(result) => result.map_err(AppError::from),
        Err(err) => Err(AppError::from(InfraError::jobs(format!(
            "job monitor task panicked: {err}"
        )))),
    };
    served.and(monitored)
}

async fn run_recache(
    settings: config::Settings,
    args: config::RecacheArgs,
) -> Result<(), AppError> {
    if args.direct {
        return run_direct_recache(settings, args.idiom_id).await;
    }

    let admin_url = args
        .admin_url
        .unwrap_or_else(|| format!("http://{}", settings.server.admin_addr));
    let client = AdminClient::new(&admin_url).map_err(InfraError::from)?;
    let accepted = client
        .refresh_idiom(args.idiom_id)
        .await
        .map_err(InfraError::from)?;
    info!(
        idiom_id = accepted.idiom_id,
        admin = %client.base(),
        evicted = accepted.evicted,
        eviction_failures = accepted.eviction_failures.len(),
        jobs = ?accepted.jobs,
        "idiom refresh accepted by server"
    );
    Ok(())
}

/// Schedules the refresh without a server. This process holds no page cache,
/// so nothing served is evicted until the queued jobs overwrite it.
async fn run_direct_recache(settings: config::Settings, idiom_id: i32) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings);

    let report = app.pages.invalidate_and_schedule_refresh(idiom_id).await?;
    info!(
        idiom_id,
        jobs = ?report.job_ids,
        "idiom refresh queued without server eviction"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let cache_config = CacheConfig::from(&settings.cache);
    let backend: Arc<dyn KvBackend> = Arc::new(MemoryKvStore::new(&cache_config));
    let page_cache = PageCache::new(backend, &cache_config);
    let registry = Arc::new(JobRegistry::from(&settings.jobs));

    let idioms_repo: Arc<dyn IdiomsRepo> = http_repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = http_repositories;
    let renderer: Arc<dyn PageRenderer> = Arc::new(IdiomPageRenderer::new(idioms_repo.clone()));
    let scheduler = RegenerationScheduler::new(
        jobs_repo,
        registry.clone(),
        cache_config.keep_warm_delay(),
    );
    let pages = Arc::new(PageCacheService::new(
        idioms_repo,
        renderer,
        page_cache.clone(),
        scheduler,
    ));

    let worker_idioms: Arc<dyn IdiomsRepo> = job_repositories.clone();
    let worker_jobs: Arc<dyn JobsRepo> = job_repositories;
    let worker_renderer: Arc<dyn PageRenderer> =
        Arc::new(IdiomPageRenderer::new(worker_idioms.clone()));
    let worker = Arc::new(RegenerationWorker::new(
        worker_idioms,
        worker_jobs,
        worker_renderer,
        page_cache,
        registry.clone(),
    ));

    ApplicationContext {
        pages,
        worker_context: JobWorkerContext::new(worker),
        registry,
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|source| {
            AppError::from(InfraError::Bind {
                addr: public_addr,
                source,
            })
        })?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|source| {
            AppError::from(InfraError::Bind {
                addr: admin_addr,
                source,
            })
        })?;

    info!(public = %public_addr, admin = %admin_addr, "listening");

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
