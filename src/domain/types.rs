//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Background job kinds understood by the regeneration workers.
///
/// The string form doubles as the apalis namespace the jobs are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Re-render an idiom detail page, then fan out to its implementations.
    RecacheIdiom,
    /// Re-render one implementation page of an idiom.
    RecacheImpl,
}

impl JobType {
    pub const ALL: [JobType; 2] = [JobType::RecacheIdiom, JobType::RecacheImpl];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RecacheIdiom => "recache_html_idiom",
            JobType::RecacheImpl => "recache_html_impl",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "recache_html_idiom" => Ok(JobType::RecacheIdiom),
            "recache_html_impl" => Ok(JobType::RecacheImpl),
            _ => Err(()),
        }
    }
}
