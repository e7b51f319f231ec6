use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(path: &str, detail: impl Into<String>) -> Response {
    let view = NotFoundView {
        path: path.to_string(),
    };
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

#[derive(Clone, Debug)]
pub struct ImplementationView {
    pub id: i32,
    pub language: String,
    pub href: String,
    pub imports: String,
    pub has_imports: bool,
    pub code: String,
    pub selected: bool,
}

#[derive(Clone, Debug)]
pub struct IdiomDetailView {
    pub id: i32,
    pub title: String,
    pub lead_paragraph: String,
    pub version: i32,
    pub canonical_path: String,
    pub has_selection: bool,
    pub selected_language: String,
    pub implementations: Vec<ImplementationView>,
}

#[derive(Template)]
#[template(path = "idiom_detail.html")]
pub struct IdiomDetailTemplate {
    pub view: IdiomDetailView,
}

#[derive(Clone, Debug)]
pub struct NotFoundView {
    pub path: String,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub view: NotFoundView,
}
