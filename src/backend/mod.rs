//! Query backend collaborator
//!
//! Everything the explorer knows about data comes through [`QueryBackend`]:
//! page execution, the count probe, CSV export, and the saved-query store.
//! [`HttpBackend`] talks to the Deita workspace API; tests substitute their own.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

mod errors;
mod http;
pub mod models;

pub use errors::{BackendError, BackendResult};
pub use http::HttpBackend;
pub use models::{Cell, QueryResult, SavedQuery, WorkspaceFile, NULL_MARKER};

#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute one page (1-indexed) of `query`.
    async fn execute_page(&self, query: &str, page: u32) -> BackendResult<QueryResult>;

    /// Count probe: a single-row, single-column result holding the total.
    async fn execute_count(&self, query: &str) -> BackendResult<QueryResult>;

    /// Full, unpaginated result as CSV bytes.
    async fn export_csv(&self, query: &str) -> BackendResult<Bytes>;

    async fn save_query(&self, name: &str, query: &str) -> BackendResult<SavedQuery>;

    async fn list_saved_queries(&self) -> BackendResult<Vec<SavedQuery>>;

    async fn delete_saved_query(&self, id: Uuid) -> BackendResult<()>;

    /// Uploaded files of the workspace; each is a queryable table.
    async fn list_files(&self) -> BackendResult<Vec<WorkspaceFile>>;
}
