use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::slug::uri_normalize;

pub const PARAM_IDIOM_ID: &str = "idiomId";
pub const PARAM_IDIOM_TITLE: &str = "idiomTitle";
pub const PARAM_IMPL_ID: &str = "implId";
pub const PARAM_IMPL_LANG: &str = "implLang";

/// Named string parameters identifying one page to render.
///
/// Ordered so that two equal parameter sets always serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderParams(BTreeMap<String, String>);

impl RenderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of an idiom detail page.
    pub fn idiom_page(idiom_id: i32, idiom_title: &str) -> Self {
        Self::new()
            .with(PARAM_IDIOM_ID, idiom_id.to_string())
            .with(PARAM_IDIOM_TITLE, uri_normalize(idiom_title))
    }

    /// Parameters of an implementation page.
    pub fn impl_page(idiom_id: i32, idiom_title: &str, impl_id: i32, impl_lang: &str) -> Self {
        Self::idiom_page(idiom_id, idiom_title)
            .with(PARAM_IMPL_ID, impl_id.to_string())
            .with(PARAM_IMPL_LANG, impl_lang)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn idiom_id(&self) -> Result<i32, RenderError> {
        let raw = self
            .get(PARAM_IDIOM_ID)
            .ok_or(RenderError::MissingParam(PARAM_IDIOM_ID))?;
        parse_id(PARAM_IDIOM_ID, raw)
    }

    pub fn impl_id(&self) -> Result<Option<i32>, RenderError> {
        self.get(PARAM_IMPL_ID)
            .map(|raw| parse_id(PARAM_IMPL_ID, raw))
            .transpose()
    }

    pub fn impl_lang(&self) -> Option<&str> {
        self.get(PARAM_IMPL_LANG)
    }
}

fn parse_id(name: &'static str, raw: &str) -> Result<i32, RenderError> {
    raw.parse().map_err(|_| RenderError::InvalidParam {
        name,
        value: raw.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("missing render parameter `{0}`")]
    MissingParam(&'static str),
    #[error("invalid value `{value}` for render parameter `{name}`")]
    InvalidParam { name: &'static str, value: String },
    #[error("idiom {0} not found")]
    IdiomNotFound(i32),
    #[error("idiom {idiom_id} has no implementation matching `{selector}`")]
    ImplementationNotFound { idiom_id: i32, selector: String },
    #[error("failed to load page data")]
    Repo(#[source] RepoError),
    #[error("template rendering failed: {0}")]
    Template(String),
}

/// Produces the bytes of one page from its parameters.
///
/// Implementations must be side-effect free apart from the returned bytes.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, params: &RenderParams) -> Result<Bytes, RenderError>;
}
