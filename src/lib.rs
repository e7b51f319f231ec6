//! Rendered idiom page cache kept warm by cascading background regeneration jobs.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
