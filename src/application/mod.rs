//! Application services: rendering, regeneration jobs and the page cache facade.

pub mod error;
pub mod jobs;
pub mod page_cache;
pub mod render;
pub mod repos;
