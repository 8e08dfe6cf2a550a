use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::{
    error::{ExplorerError, Result},
    source::EntrySource,
    types::{PathEntriesResponse, PathEntry, PathsResponse},
};

/// Entry source backed by a running path-explorer server
///
/// Uses:
/// - `GET /paths` for the root paths
/// - `GET /path-entries?path=...` for directory listings
#[derive(Clone)]
pub struct HttpEntrySource {
    client: Client,
    base_url: String,
}

impl HttpEntrySource {
    /// Create a new HTTP source
    ///
    /// # Arguments
    /// * `base_url` - Server origin, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("path-explorer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build the URL of an API endpoint
    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

#[async_trait]
impl EntrySource for HttpEntrySource {
    async fn list_entries(&self, path: &str) -> Result<Vec<PathEntry>> {
        let response = self
            .client
            .get(self.endpoint("path-entries"))
            .query(&[("path", path)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => {
                let parsed: PathEntriesResponse = serde_json::from_str(&body)?;
                parsed.entries.ok_or_else(|| ExplorerError::UnexpectedResponse {
                    status: status.as_u16(),
                    message: "response carried no entries".to_string(),
                })
            }
            // Any failure status with a populated `error` is the lister's verdict on the path
            status => match serde_json::from_str::<PathEntriesResponse>(&body) {
                Ok(PathEntriesResponse {
                    error: Some(message),
                    ..
                }) => Err(ExplorerError::NotFound { message }),
                _ => Err(ExplorerError::UnexpectedResponse {
                    status: status.as_u16(),
                    message: body,
                }),
            },
        }
    }

    async fn root_paths(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.endpoint("paths")).send().await?;

        match response.status() {
            StatusCode::OK => {
                let parsed: PathsResponse = response.json().await?;
                Ok(parsed.paths)
            }
            status => Err(ExplorerError::UnexpectedResponse {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    fn identifier(&self) -> String {
        format!("http({})", self.base_url.trim_end_matches('/'))
    }
}
