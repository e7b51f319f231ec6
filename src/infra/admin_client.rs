//! Client for the admin API of a running server.

use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use super::http::RefreshAccepted;

#[derive(Debug, Error)]
pub enum AdminClientError {
    #[error("invalid admin URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("admin API answered {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("failed to parse admin API response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone, Debug)]
pub struct AdminClient {
    client: Client,
    base: Url,
}

impl AdminClient {
    pub fn new(base: &str) -> Result<Self, AdminClientError> {
        let base = Url::parse(base)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("recache-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Asks the server to evict the idiom's pages and schedule their regeneration.
    pub async fn refresh_idiom(&self, idiom_id: i32) -> Result<RefreshAccepted, AdminClientError> {
        let url = self.base.join(&format!("admin/idioms/{idiom_id}/refresh"))?;
        let response = self.client.post(url).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(AdminClientError::Server {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
