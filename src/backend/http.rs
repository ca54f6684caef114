use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use uuid::Uuid;

use super::errors::{BackendError, BackendResult};
use super::models::{
    ErrorBody, ExportRequest, QueryRequest, QueryResult, SaveQueryRequest, SavedQuery,
    WorkspaceFile,
};
use super::QueryBackend;
use crate::config::ClientConfig;

/// [`QueryBackend`] over the Deita workspace HTTP API
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    workspace_id: Uuid,
    api_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base().to_string(),
            workspace_id: config.workspace_id,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/workspaces/{}/{}",
            self.base_url, self.workspace_id, path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = self.authorized(request).send().await?;
        check_status(response).await
    }

    async fn post_query(&self, payload: &QueryRequest) -> BackendResult<QueryResult> {
        let endpoint = self.endpoint("query");
        log::debug!(
            "POST {} (page={:?}, count={})",
            endpoint,
            payload.page,
            payload.count
        );

        let response = self.send(self.client.post(&endpoint).json(payload)).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-success response into [`BackendError::Status`], preferring
/// FastAPI's `detail` message over the raw body.
async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.message(),
        Err(_) if text.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => text,
    };

    log::warn!("Deita API returned {}: {}", status.as_u16(), detail);
    Err(BackendError::status(status.as_u16(), detail))
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn execute_page(&self, query: &str, page: u32) -> BackendResult<QueryResult> {
        self.post_query(&QueryRequest::page(query, page)).await
    }

    async fn execute_count(&self, query: &str) -> BackendResult<QueryResult> {
        self.post_query(&QueryRequest::count(query)).await
    }

    async fn export_csv(&self, query: &str) -> BackendResult<Bytes> {
        let endpoint = self.endpoint("query/export");
        log::debug!("POST {}", endpoint);

        let payload = ExportRequest {
            query: query.to_string(),
        };
        let response = self.send(self.client.post(&endpoint).json(&payload)).await?;
        Ok(response.bytes().await?)
    }

    async fn save_query(&self, name: &str, query: &str) -> BackendResult<SavedQuery> {
        let endpoint = self.endpoint("queries");
        log::debug!("POST {} (name={})", endpoint, name);

        let payload = SaveQueryRequest {
            name: name.to_string(),
            query: query.to_string(),
        };
        let response = self.send(self.client.post(&endpoint).json(&payload)).await?;
        Ok(response.json().await?)
    }

    async fn list_saved_queries(&self) -> BackendResult<Vec<SavedQuery>> {
        let endpoint = self.endpoint("queries");
        let response = self.send(self.client.get(&endpoint)).await?;
        Ok(response.json().await?)
    }

    async fn delete_saved_query(&self, id: Uuid) -> BackendResult<()> {
        let endpoint = self.endpoint(&format!("queries/{}", id));
        log::debug!("DELETE {}", endpoint);
        self.send(self.client.delete(&endpoint)).await?;
        Ok(())
    }

    async fn list_files(&self) -> BackendResult<Vec<WorkspaceFile>> {
        // Trailing slash matters: the files router is mounted at `files/`
        let endpoint = self.endpoint("files/");
        let response = self.send(self.client.get(&endpoint)).await?;
        Ok(response.json().await?)
    }
}
