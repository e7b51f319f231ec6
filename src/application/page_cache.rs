//! Entry points the rest of the application uses to read and refresh cached pages.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        jobs::{RegenerationScheduler, SchedulingError},
        render::{PageRenderer, RenderError, RenderParams},
        repos::{IdiomsRepo, RepoError},
    },
    cache::{CacheInvalidator, CacheKey, InvalidationReport, PageCache},
    domain::{
        entities::{IdiomRecord, ImplementationRecord},
        slug::uri_normalize,
    },
};

const SOURCE: &str = "application::page_cache";

#[derive(Debug, Error)]
pub enum PageCacheError {
    #[error("idiom {0} not found")]
    IdiomNotFound(i32),
    #[error("idiom {idiom_id} has no `{lang}` implementation")]
    ImplementationNotFound { idiom_id: i32, lang: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

/// A page request as it arrives from the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub idiom_id: i32,
    pub title: String,
    pub lang: Option<String>,
}

impl PageRequest {
    pub fn key(&self) -> CacheKey {
        match &self.lang {
            Some(lang) => CacheKey::impl_page(self.idiom_id, &self.title, lang),
            None => CacheKey::idiom_page(self.idiom_id, &self.title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedPage {
    Hit(Bytes),
    /// Rendered on demand; `cached` tells whether the write-back succeeded.
    Miss { page: Bytes, cached: bool },
    /// The request named the idiom under a stale or non-canonical path.
    Redirect(CacheKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub invalidation: InvalidationReport,
    pub job_ids: Vec<String>,
}

#[derive(Clone)]
pub struct PageCacheService {
    idioms: Arc<dyn IdiomsRepo>,
    renderer: Arc<dyn PageRenderer>,
    cache: PageCache,
    invalidator: CacheInvalidator,
    scheduler: RegenerationScheduler,
}

impl PageCacheService {
    pub fn new(
        idioms: Arc<dyn IdiomsRepo>,
        renderer: Arc<dyn PageRenderer>,
        cache: PageCache,
        scheduler: RegenerationScheduler,
    ) -> Self {
        let invalidator = CacheInvalidator::new(cache.byte_cache().clone());
        Self {
            idioms,
            renderer,
            cache,
            invalidator,
            scheduler,
        }
    }

    /// Cached page bytes for `key`; `None` is a normal miss.
    pub async fn read_cached(&self, key: &CacheKey) -> Option<Bytes> {
        self.cache.read_page(key).await
    }

    /// Serves a page from cache, rendering and writing it back on a miss.
    ///
    /// Only canonical keys are written, so every cached entry is one the
    /// invalidator knows how to evict.
    pub async fn serve(&self, request: &PageRequest) -> Result<ServedPage, PageCacheError> {
        let key = request.key();
        if let Some(page) = self.read_cached(&key).await {
            return Ok(ServedPage::Hit(page));
        }

        let idiom = self.find(request.idiom_id).await?;
        let (canonical, params) = match &request.lang {
            None => (
                CacheKey::for_idiom(&idiom),
                RenderParams::idiom_page(idiom.id, &idiom.title),
            ),
            Some(lang) => {
                let imp = find_by_language(&idiom, lang).ok_or_else(|| {
                    PageCacheError::ImplementationNotFound {
                        idiom_id: idiom.id,
                        lang: lang.clone(),
                    }
                })?;
                (
                    CacheKey::for_implementation(&idiom, imp),
                    RenderParams::impl_page(idiom.id, &idiom.title, imp.id, &imp.language_name),
                )
            }
        };

        if canonical != key {
            return Ok(ServedPage::Redirect(canonical));
        }

        let page = self.renderer.render(&params).await?;
        let cached = self.cache.write_page(&key, page.clone()).await.is_ok();
        Ok(ServedPage::Miss { page, cached })
    }

    /// Drops every cached page of the idiom and schedules its regeneration.
    pub async fn invalidate_and_schedule_refresh(
        &self,
        idiom_id: i32,
    ) -> Result<RefreshReport, PageCacheError> {
        let idiom = self.find(idiom_id).await?;
        self.refresh_idiom(&idiom, &[]).await.map_err(PageCacheError::from)
    }

    /// Mutation hook: `idiom` is the state after the change and `removed`
    /// the implementations the change deleted.
    pub async fn refresh_idiom(
        &self,
        idiom: &IdiomRecord,
        removed: &[ImplementationRecord],
    ) -> Result<RefreshReport, SchedulingError> {
        let invalidation = self.invalidator.invalidate_with_removed(idiom, removed).await;
        let job_ids = self.scheduler.schedule_refresh(idiom.id).await?;

        info!(
            target = SOURCE,
            idiom_id = idiom.id,
            evicted = invalidation.evicted(),
            eviction_failures = invalidation.failed.len(),
            jobs = job_ids.len(),
            "idiom pages invalidated and refresh scheduled"
        );

        Ok(RefreshReport {
            invalidation,
            job_ids,
        })
    }

    async fn find(&self, idiom_id: i32) -> Result<IdiomRecord, PageCacheError> {
        self.idioms.find_idiom(idiom_id).await.map_err(|err| match err {
            RepoError::NotFound => PageCacheError::IdiomNotFound(idiom_id),
            other => {
                warn!(target = SOURCE, idiom_id, error = %other, "idiom lookup failed");
                PageCacheError::Repo(other)
            }
        })
    }
}

fn find_by_language<'a>(idiom: &'a IdiomRecord, lang: &str) -> Option<&'a ImplementationRecord> {
    let wanted = uri_normalize(lang);
    idiom
        .implementations
        .iter()
        .find(|imp| uri_normalize(&imp.language_name) == wanted)
}
