use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bytes::Bytes;

use crate::{
    application::{
        error::HttpError,
        page_cache::{PageCacheError, PageCacheService, PageRequest, ServedPage},
    },
    presentation::views::render_not_found_response,
};

use super::{
    CACHE_STATUS_HEADER, HealthProbe, db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub pages: Arc<PageCacheService>,
    pub db: Arc<dyn HealthProbe>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/idiom/{id}/{title}", get(idiom_page))
        .route("/idiom/{id}/{title}/{lang}", get(impl_page))
        .route("/_health/db", get(public_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn idiom_page(
    State(state): State<HttpState>,
    Path((idiom_id, title)): Path<(i32, String)>,
    uri: Uri,
) -> Response {
    let request = PageRequest {
        idiom_id,
        title,
        lang: None,
    };
    serve_page(&state, &request, &uri).await
}

async fn impl_page(
    State(state): State<HttpState>,
    Path((idiom_id, title, lang)): Path<(i32, String, String)>,
    uri: Uri,
) -> Response {
    let request = PageRequest {
        idiom_id,
        title,
        lang: Some(lang),
    };
    serve_page(&state, &request, &uri).await
}

async fn serve_page(state: &HttpState, request: &PageRequest, uri: &Uri) -> Response {
    match state.pages.serve(request).await {
        Ok(ServedPage::Hit(page)) => html_response(page, "hit"),
        Ok(ServedPage::Miss { page, .. }) => html_response(page, "miss"),
        Ok(ServedPage::Redirect(canonical)) => {
            Redirect::permanent(canonical.as_str()).into_response()
        }
        Err(
            err @ (PageCacheError::IdiomNotFound(_)
            | PageCacheError::ImplementationNotFound { .. }),
        ) => render_not_found_response(uri.path(), err.to_string()),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn html_response(page: Bytes, cache_status: &'static str) -> Response {
    let mut response = (StatusCode::OK, page).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=60"));
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status));
    response
}

async fn fallback(uri: Uri) -> Response {
    render_not_found_response(uri.path(), "no route matches the request path")
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}
