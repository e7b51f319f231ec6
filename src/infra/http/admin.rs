use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::application::{error::HttpError, page_cache::PageCacheService};

use super::{
    HealthProbe, db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub pages: Arc<PageCacheService>,
    pub db: Arc<dyn HealthProbe>,
}

/// Body of an accepted refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAccepted {
    pub idiom_id: i32,
    pub evicted: usize,
    pub eviction_failures: Vec<String>,
    pub jobs: Vec<String>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/idioms/{id}/refresh", post(refresh_idiom))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn refresh_idiom(State(state): State<AdminState>, Path(idiom_id): Path<i32>) -> Response {
    match state.pages.invalidate_and_schedule_refresh(idiom_id).await {
        Ok(report) => {
            let body = RefreshAccepted {
                idiom_id,
                evicted: report.invalidation.evicted(),
                eviction_failures: report
                    .invalidation
                    .failed
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                jobs: report.job_ids,
            };
            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.db.health_check().await)
}
