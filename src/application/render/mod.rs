//! Page rendering interface.
//!
//! Rendering is kept pure: a parameter set goes in, page bytes come out. Cache
//! writes and job bookkeeping happen in the caller, typically a regeneration
//! worker.

mod idiom_page;
mod types;

pub use idiom_page::IdiomPageRenderer;
pub use types::{
    PARAM_IDIOM_ID, PARAM_IDIOM_TITLE, PARAM_IMPL_ID, PARAM_IMPL_LANG, PageRenderer, RenderError,
    RenderParams,
};
