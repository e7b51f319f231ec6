use std::{sync::Arc, time::Instant};

use askama::Template;
use async_trait::async_trait;
use bytes::Bytes;
use metrics::histogram;

use crate::{
    application::repos::{IdiomsRepo, RepoError},
    cache::CacheKey,
    domain::{entities::IdiomRecord, slug::uri_normalize},
    presentation::views::{IdiomDetailTemplate, IdiomDetailView, ImplementationView},
};

use super::types::{PageRenderer, RenderError, RenderParams};

/// Renders idiom detail pages from the current stored idiom.
///
/// Implementation pages are the same detail page with one implementation
/// selected and moved first.
pub struct IdiomPageRenderer {
    idioms: Arc<dyn IdiomsRepo>,
}

impl IdiomPageRenderer {
    pub fn new(idioms: Arc<dyn IdiomsRepo>) -> Self {
        Self { idioms }
    }
}

#[async_trait]
impl PageRenderer for IdiomPageRenderer {
    async fn render(&self, params: &RenderParams) -> Result<Bytes, RenderError> {
        let started = Instant::now();
        let idiom_id = params.idiom_id()?;
        let idiom = self.idioms.find_idiom(idiom_id).await.map_err(|err| match err {
            RepoError::NotFound => RenderError::IdiomNotFound(idiom_id),
            other => RenderError::Repo(other),
        })?;

        let selected = selected_implementation(&idiom, params)?;
        let template = IdiomDetailTemplate {
            view: build_view(&idiom, selected),
        };
        let html = template
            .render()
            .map_err(|err| RenderError::Template(err.to_string()))?;

        histogram!("recache_render_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(Bytes::from(html))
    }
}

/// Resolves the implementation a parameter set points at, by id first and by
/// language label otherwise.
fn selected_implementation(
    idiom: &IdiomRecord,
    params: &RenderParams,
) -> Result<Option<i32>, RenderError> {
    if let Some(impl_id) = params.impl_id()? {
        return idiom
            .implementation(impl_id)
            .map(|imp| Some(imp.id))
            .ok_or_else(|| RenderError::ImplementationNotFound {
                idiom_id: idiom.id,
                selector: impl_id.to_string(),
            });
    }

    match params.impl_lang() {
        None => Ok(None),
        Some(lang) => {
            let wanted = uri_normalize(lang);
            idiom
                .implementations
                .iter()
                .find(|imp| uri_normalize(&imp.language_name) == wanted)
                .map(|imp| Some(imp.id))
                .ok_or_else(|| RenderError::ImplementationNotFound {
                    idiom_id: idiom.id,
                    selector: lang.to_string(),
                })
        }
    }
}

fn build_view(idiom: &IdiomRecord, selected: Option<i32>) -> IdiomDetailView {
    let mut implementations: Vec<ImplementationView> = idiom
        .implementations
        .iter()
        .map(|imp| ImplementationView {
            id: imp.id,
            language: imp.language_name.clone(),
            href: CacheKey::for_implementation(idiom, imp).to_string(),
            imports: imp.imports_block.clone().unwrap_or_default(),
            has_imports: imp
                .imports_block
                .as_deref()
                .is_some_and(|block| !block.trim().is_empty()),
            code: imp.code_block.clone(),
            selected: Some(imp.id) == selected,
        })
        .collect();
    // Selected implementation first, the rest keep their stored order.
    implementations.sort_by_key(|imp| !imp.selected);

    let selected_language = implementations
        .iter()
        .find(|imp| imp.selected)
        .map(|imp| imp.language.clone());

    IdiomDetailView {
        id: idiom.id,
        title: idiom.title.clone(),
        lead_paragraph: idiom.lead_paragraph.clone(),
        version: idiom.version,
        canonical_path: CacheKey::for_idiom(idiom).to_string(),
        has_selection: selected_language.is_some(),
        selected_language: selected_language.unwrap_or_default(),
        implementations,
    }
}
