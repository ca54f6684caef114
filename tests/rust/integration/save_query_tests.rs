//! Save gesture call counting with a mocked backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use deita::backend::{
    BackendError, BackendResult, Cell, QueryBackend, QueryResult, SavedQuery, WorkspaceFile,
};
use deita::explorer::{Explorer, ExplorerError, Notification};
use deita::session::SessionError;
use mockall::mock;
use mockall::predicate::eq;
use uuid::Uuid;

mock! {
    pub Backend {}

    #[async_trait]
    impl QueryBackend for Backend {
        async fn execute_page(&self, query: &str, page: u32) -> BackendResult<QueryResult>;
        async fn execute_count(&self, query: &str) -> BackendResult<QueryResult>;
        async fn export_csv(&self, query: &str) -> BackendResult<Bytes>;
        async fn save_query(&self, name: &str, query: &str) -> BackendResult<SavedQuery>;
        async fn list_saved_queries(&self) -> BackendResult<Vec<SavedQuery>>;
        async fn delete_saved_query(&self, id: Uuid) -> BackendResult<()>;
        async fn list_files(&self) -> BackendResult<Vec<WorkspaceFile>>;
    }
}

fn single_page() -> QueryResult {
    QueryResult {
        columns: vec!["one".to_string()],
        rows: vec![vec![Cell::from(1i64)]],
        has_more: false,
        time: 0.0,
    }
}

/// Wait for spawned tasks to release their handles, then verify expectations.
async fn verify(mut backend: Arc<MockBackend>) {
    let mut mock = loop {
        match Arc::try_unwrap(backend) {
            Ok(mock) => break mock,
            Err(shared) => {
                backend = shared;
                tokio::task::yield_now().await;
            }
        }
    };
    mock.checkpoint();
}

#[tokio::test]
async fn test_save_issues_exactly_one_call() {
    let mut mock = MockBackend::new();
    mock.expect_execute_page()
        .with(eq("SELECT 1"), eq(1u32))
        .times(1)
        .returning(|_, _| Ok(single_page()));
    mock.expect_save_query()
        .with(eq("Q1"), eq("SELECT 1"))
        .times(1)
        .returning(|name, query| {
            Ok(SavedQuery {
                id: Uuid::new_v4(),
                name: name.to_string(),
                query: query.to_string(),
                created_at: Utc::now(),
            })
        });

    let dir = tempfile::TempDir::new().unwrap();
    let backend = Arc::new(mock);
    let mut explorer = Explorer::new(backend.clone(), dir.path());

    explorer.run_query("SELECT 1").unwrap();
    explorer.settle().await;

    assert!(matches!(
        explorer.save_query(""),
        Err(ExplorerError::Session(SessionError::EmptySaveName))
    ));
    assert!(matches!(
        explorer.save_query("   "),
        Err(ExplorerError::Session(SessionError::EmptySaveName))
    ));

    explorer.save_query("Q1").unwrap();
    explorer.settle().await;

    let saved: Vec<_> = explorer
        .take_notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::Saved(saved) => Some(saved),
            _ => None,
        })
        .collect();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "Q1");
    assert_eq!(explorer.saved_queries().len(), 1);

    drop(explorer);
    verify(backend).await;
}

#[tokio::test]
async fn test_save_without_query_issues_no_call() {
    let mut mock = MockBackend::new();
    mock.expect_save_query().times(0);

    let dir = tempfile::TempDir::new().unwrap();
    let backend = Arc::new(mock);
    let mut explorer = Explorer::new(backend.clone(), dir.path());

    assert!(matches!(
        explorer.save_query("Q1"),
        Err(ExplorerError::Session(SessionError::NoQuery))
    ));

    drop(explorer);
    verify(backend).await;
}

#[tokio::test]
async fn test_save_failure_is_notified() {
    let mut mock = MockBackend::new();
    mock.expect_execute_page()
        .returning(|_, _| Ok(single_page()));
    mock.expect_save_query()
        .times(1)
        .returning(|_, _| Err(BackendError::status(400, "Disallowed expression: Insert")));

    let dir = tempfile::TempDir::new().unwrap();
    let backend = Arc::new(mock);
    let mut explorer = Explorer::new(backend.clone(), dir.path());

    explorer.run_query("SELECT 1").unwrap();
    explorer.settle().await;
    explorer.take_notifications();

    explorer.save_query("Q1").unwrap();
    explorer.settle().await;

    let notifications = explorer.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].to_string(),
        "save failed: Server returned 400: Disallowed expression: Insert"
    );
    assert!(explorer.session().save_status().failure().is_some());
    // Save may be retried by the user
    assert!(explorer.session().controls().save);

    drop(explorer);
    verify(backend).await;
}
