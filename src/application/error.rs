use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{application::page_cache::PageCacheError, infra::error::InfraError};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<PageCacheError> for HttpError {
    fn from(error: PageCacheError) -> Self {
        const SOURCE: &str = "application::error::page_cache_error_to_http_error";
        match error {
            PageCacheError::IdiomNotFound(id) => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Idiom not found",
                format!("Idiom {id} does not exist"),
            ),
            PageCacheError::ImplementationNotFound { idiom_id, lang } => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Implementation not found",
                format!("Idiom {idiom_id} has no `{lang}` implementation"),
            ),
            PageCacheError::Scheduling(err) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Refresh could not be scheduled",
                &err,
            ),
            PageCacheError::Repo(err) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                &err,
            ),
            PageCacheError::Render(err) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    PageCache(#[from] PageCacheError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::PageCache(PageCacheError::IdiomNotFound(_))
            | AppError::PageCache(PageCacheError::ImplementationNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            AppError::PageCache(PageCacheError::Scheduling(_))
            | AppError::PageCache(PageCacheError::Repo(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(InfraError::AdminApi(_)) => StatusCode::BAD_GATEWAY,
            AppError::Infra(_) | AppError::PageCache(PageCacheError::Render(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::PageCache(PageCacheError::IdiomNotFound(_))
            | AppError::PageCache(PageCacheError::ImplementationNotFound { .. }) => {
                "Resource not found"
            }
            AppError::PageCache(PageCacheError::Scheduling(_)) => "Refresh could not be scheduled",
            AppError::PageCache(PageCacheError::Repo(_))
            | AppError::Infra(InfraError::Database { .. }) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Bind { .. }) => "Listener could not be bound",
            AppError::Infra(InfraError::Jobs(_)) => "Background jobs unavailable",
            AppError::Infra(InfraError::AdminApi(_)) => "Admin API request failed",
            AppError::PageCache(PageCacheError::Render(_)) | AppError::Unexpected(_) => {
                "Unexpected error occurred"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{jobs::SchedulingError, repos::RepoError};

    #[test]
    fn scheduling_failure_maps_to_service_unavailable() {
        let err = AppError::from(PageCacheError::Scheduling(SchedulingError {
            idiom_id: 42,
            source: RepoError::Timeout,
        }));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "database timeout");
    }

    #[test]
    fn job_monitor_failure_maps_to_internal_error() {
        let response = AppError::from(InfraError::jobs("worker pool stopped")).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");
        assert_eq!(report.messages[0], "job monitor error: worker pool stopped");
    }

    #[test]
    fn unknown_idiom_maps_to_not_found() {
        let response = HttpError::from(PageCacheError::IdiomNotFound(7)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
