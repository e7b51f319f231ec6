//! End-to-end regeneration flow over in-memory collaborators.

mod support;

use std::{sync::Arc, time::Duration};

use recache::{
    application::{
        jobs::{RecacheError, RecacheIdiomJobPayload, RecacheImplJobPayload, RecacheOutcome},
        page_cache::PageCacheError,
    },
    cache::{CacheConfig, CacheKey, decompress},
    domain::types::JobType,
};
use serde_json::json;

use support::{BrokenRenderer, Harness, KEEP_WARM, implementation, reverse_a_list};

const FRESHNESS: Duration = Duration::from_secs(24 * 3600);

fn scenario_keys() -> Vec<CacheKey> {
    vec![
        CacheKey::from_path("/idiom/42/reverse-a-list"),
        CacheKey::from_path("/idiom/42/reverse-a-list/go"),
        CacheKey::from_path("/idiom/42/reverse-a-list/rust"),
    ]
}

async fn recache_idiom_42(harness: &Harness) -> Result<RecacheOutcome, RecacheError> {
    harness
        .registry
        .dispatch(
            JobType::RecacheIdiom.as_str(),
            json!({ "idiom_id": 42 }),
            &harness.context,
        )
        .await
}

#[tokio::test]
async fn refresh_evicts_parent_and_children_then_schedules_two_jobs() {
    let harness = Harness::new();
    for key in scenario_keys() {
        harness
            .cache
            .write_page(&key, bytes::Bytes::from_static(b"stale"))
            .await
            .expect("seed");
    }

    let report = harness
        .pages
        .invalidate_and_schedule_refresh(42)
        .await
        .expect("refresh");

    assert_eq!(report.invalidation.attempted, scenario_keys());
    assert_eq!(report.invalidation.evicted(), 3);
    for key in scenario_keys() {
        assert_eq!(harness.pages.read_cached(&key).await, None);
    }

    let batches = harness.jobs.batches();
    assert_eq!(batches.len(), 1, "both jobs go out in one batch");
    let batch = &batches[0];
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|job| job.job_type == JobType::RecacheIdiom));
    assert!(batch.iter().all(|job| job.payload == json!({ "idiom_id": 42 })));
    assert_eq!(batch[0].delay, Duration::ZERO);
    assert_eq!(batch[1].delay, KEEP_WARM);
    assert_eq!(report.job_ids.len(), 2);
}

#[tokio::test]
async fn queue_failure_surfaces_as_scheduling_error() {
    let harness = Harness::new();
    harness.jobs.set_down(true);

    let err = harness
        .pages
        .invalidate_and_schedule_refresh(42)
        .await
        .expect_err("queue is down");

    assert!(matches!(err, PageCacheError::Scheduling(ref e) if e.idiom_id == 42));
    assert!(harness.jobs.batches().is_empty());
}

#[tokio::test]
async fn refreshing_an_unknown_idiom_schedules_nothing() {
    let harness = Harness::new();

    let err = harness
        .pages
        .invalidate_and_schedule_refresh(99)
        .await
        .expect_err("unknown idiom");

    assert!(matches!(err, PageCacheError::IdiomNotFound(99)));
    assert!(harness.jobs.batches().is_empty());
}

#[tokio::test]
async fn parent_job_renders_writes_and_fans_out_before_done() {
    let harness = Harness::new();

    let outcome = recache_idiom_42(&harness).await.expect("parent job");

    assert_eq!(outcome.key, CacheKey::from_path("/idiom/42/reverse-a-list"));
    assert!(outcome.cached);
    assert_eq!(outcome.children_enqueued, 2);
    assert_eq!(outcome.children_failed, 0);

    let page = harness
        .pages
        .read_cached(&outcome.key)
        .await
        .expect("parent page cached");
    assert!(String::from_utf8_lossy(&page).contains("Reverse a list"));
    assert_eq!(
        harness.backend.puts(),
        vec![("/idiom/42/reverse-a-list".to_string(), FRESHNESS)]
    );

    let children = harness.jobs.jobs();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|job| job.job_type == JobType::RecacheImpl));
    assert!(children.iter().all(|job| job.delay.is_zero()));

    let payloads: Vec<RecacheImplJobPayload> = children
        .into_iter()
        .map(|job| serde_json::from_value(job.payload).expect("impl payload"))
        .collect();
    assert_eq!(
        payloads,
        vec![
            RecacheImplJobPayload {
                impl_path: "/idiom/42/reverse-a-list/go".to_string(),
                idiom_id: 42,
                idiom_title: "Reverse a list".to_string(),
                impl_id: 7,
                impl_lang: "Go".to_string(),
            },
            RecacheImplJobPayload {
                impl_path: "/idiom/42/reverse-a-list/rust".to_string(),
                idiom_id: 42,
                idiom_title: "Reverse a list".to_string(),
                impl_id: 8,
                impl_lang: "Rust".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn draining_the_queue_warms_every_page() {
    let harness = Harness::new();
    harness
        .pages
        .invalidate_and_schedule_refresh(42)
        .await
        .expect("refresh");

    let outcomes = harness.run_due_jobs().await;

    // The immediate parent job plus one job per implementation; the keep-warm
    // job is not due yet.
    assert_eq!(outcomes.len(), 3);
    for key in scenario_keys() {
        assert!(harness.pages.read_cached(&key).await.is_some(), "{key} warm");
    }
    assert!(
        harness
            .backend
            .puts()
            .iter()
            .all(|(_, ttl)| *ttl == FRESHNESS)
    );

    let rust = harness
        .pages
        .read_cached(&CacheKey::from_path("/idiom/42/reverse-a-list/rust"))
        .await
        .expect("rust page");
    let rust = String::from_utf8_lossy(&rust);
    let selected = rust.find("x.reverse();").expect("rust code");
    let other = rust.find("slices.Reverse(x)").expect("go code");
    assert!(selected < other, "selected implementation comes first");
}

#[tokio::test]
async fn running_the_same_job_twice_caches_the_same_bytes() {
    let harness = Harness::new();
    let key = CacheKey::from_path("/idiom/42/reverse-a-list");

    recache_idiom_42(&harness).await.expect("first run");
    let first = harness.pages.read_cached(&key).await.expect("first page");
    recache_idiom_42(&harness).await.expect("second run");
    let second = harness.pages.read_cached(&key).await.expect("second page");

    assert_eq!(first, second);
}

#[tokio::test]
async fn one_child_enqueue_failure_does_not_stop_its_siblings() {
    let harness = Harness::new();
    harness.jobs.reject_impl(7);

    let outcome = recache_idiom_42(&harness).await.expect("parent job");

    assert_eq!(outcome.children_enqueued, 1);
    assert_eq!(outcome.children_failed, 1);
    let queued = harness.jobs.jobs();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload["impl_id"], 8);
}

#[tokio::test]
async fn child_job_for_a_removed_implementation_fails_at_lookup() {
    let harness = Harness::new();
    recache_idiom_42(&harness).await.expect("parent job");
    harness.idioms.remove_implementation(42, 8);

    let payload = harness
        .jobs
        .jobs()
        .into_iter()
        .find(|job| job.payload["impl_id"] == 8)
        .expect("rust job")
        .payload;
    let err = harness
        .registry
        .dispatch(JobType::RecacheImpl.as_str(), payload, &harness.context)
        .await
        .expect_err("orphaned child");

    assert!(matches!(
        err,
        RecacheError::MissingImplementation {
            idiom_id: 42,
            impl_id: 8
        }
    ));
    assert_eq!(
        harness
            .pages
            .read_cached(&CacheKey::from_path("/idiom/42/reverse-a-list/rust"))
            .await,
        None
    );
}

#[tokio::test]
async fn job_for_a_deleted_idiom_fails_without_writing() {
    let harness = Harness::new();
    harness.idioms.remove(42);

    let err = recache_idiom_42(&harness).await.expect_err("deleted idiom");

    assert!(matches!(err, RecacheError::Lookup { idiom_id: 42, .. }));
    assert!(harness.backend.puts().is_empty());
    assert!(harness.jobs.batches().is_empty());
}

#[tokio::test]
async fn render_failure_fails_the_job_and_skips_fan_out() {
    let harness = Harness::with_renderer(Arc::new(BrokenRenderer));

    let err = recache_idiom_42(&harness).await.expect_err("render fails");

    assert!(matches!(err, RecacheError::Render { .. }));
    assert!(harness.backend.puts().is_empty());
    assert!(harness.jobs.batches().is_empty());
}

#[tokio::test]
async fn cache_outage_does_not_fail_the_job() {
    let harness = Harness::new();
    harness.backend.set_down(true);

    let outcome = recache_idiom_42(&harness).await.expect("parent job");

    assert!(!outcome.cached);
    assert_eq!(outcome.children_enqueued, 2);
    assert_eq!(harness.pages.read_cached(&outcome.key).await, None);
}

#[tokio::test]
async fn compressed_deployment_stores_gzip_and_reads_html() {
    let harness = Harness::with_config(CacheConfig {
        compress_pages: true,
        ..Default::default()
    });

    let outcome = recache_idiom_42(&harness).await.expect("parent job");

    let raw = harness
        .cache
        .byte_cache()
        .read(&outcome.key)
        .await
        .expect("raw entry");
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    let html = harness
        .pages
        .read_cached(&outcome.key)
        .await
        .expect("decompressed page");
    assert_eq!(decompress(&raw).expect("gunzip"), html.to_vec());
}

#[tokio::test]
async fn mutation_hook_evicts_removed_implementations_too() {
    let harness = Harness::new();
    let mut idiom = reverse_a_list();
    idiom
        .implementations
        .push(implementation(9, 42, "Python", "x.reverse()"));
    harness.idioms.insert(idiom.clone());
    harness.run_due_jobs().await;
    recache_idiom_42(&harness).await.expect("warm");
    harness.run_due_jobs().await;

    let python = CacheKey::from_path("/idiom/42/reverse-a-list/python");
    assert!(harness.pages.read_cached(&python).await.is_some());

    let removed = idiom.implementations.pop().expect("python");
    harness.idioms.insert(idiom.clone());
    let report = harness
        .pages
        .refresh_idiom(&idiom, &[removed])
        .await
        .expect("refresh");

    assert_eq!(report.invalidation.attempted.len(), 4);
    assert_eq!(harness.pages.read_cached(&python).await, None);
}

#[tokio::test]
async fn dispatch_rejects_unknown_types_and_bad_payloads() {
    let harness = Harness::new();

    let unknown = harness
        .registry
        .dispatch("render_post", json!({}), &harness.context)
        .await;
    assert!(matches!(unknown, Err(RecacheError::UnknownJobType(ref t)) if t == "render_post"));

    let malformed = harness
        .registry
        .dispatch(
            JobType::RecacheIdiom.as_str(),
            json!({ "idiom": "42" }),
            &harness.context,
        )
        .await;
    assert!(matches!(
        malformed,
        Err(RecacheError::InvalidPayload {
            job_type: "recache_html_idiom",
            ..
        })
    ));
}

#[tokio::test]
async fn worker_entry_points_accept_typed_payloads() {
    let harness = Harness::new();

    let parent = harness
        .context
        .worker
        .recache_idiom(&RecacheIdiomJobPayload { idiom_id: 42 })
        .await
        .expect("parent");
    assert_eq!(parent.children_enqueued, 2);

    let child = harness
        .context
        .worker
        .recache_impl(&RecacheImplJobPayload {
            impl_path: "/idiom/42/reverse-a-list/go".to_string(),
            idiom_id: 42,
            idiom_title: "Reverse a list".to_string(),
            impl_id: 7,
            impl_lang: "Go".to_string(),
        })
        .await
        .expect("child");
    assert_eq!(child.key, CacheKey::from_path("/idiom/42/reverse-a-list/go"));
    assert_eq!(child.children_enqueued, 0);
}
