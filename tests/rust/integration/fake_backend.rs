//! In-memory `QueryBackend` serving a synthetic result of `total_rows` rows
//! for every query, with per-query gates to control response order.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use deita::backend::{
    BackendError, BackendResult, Cell, QueryBackend, QueryResult, SavedQuery, WorkspaceFile,
};
use tokio::sync::oneshot;
use uuid::Uuid;

pub struct FakeBackend {
    page_size: usize,
    total_rows: u64,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    failing_pages: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(page_size: usize, total_rows: u64) -> Self {
        Self {
            page_size,
            total_rows,
            gates: Mutex::new(HashMap::new()),
            failing_pages: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold page responses for `query` until the returned sender fires.
    pub fn gate(&self, query: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    pub fn fail_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn execute_page(&self, query: &str, page: u32) -> BackendResult<QueryResult> {
        self.record(format!("page:{}:{}", page, query));

        let gate = self.gates.lock().unwrap().remove(query);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(BackendError::status(400, "Binder Error: page failed"));
        }

        let size = self.page_size as u64;
        let start = u64::from(page - 1) * size;
        let end = (start + size).min(self.total_rows);
        let rows = (start..end.max(start))
            .map(|n| vec![Cell::from(n as i64 + 1), Cell::from(query)])
            .collect();

        Ok(QueryResult {
            columns: vec!["n".to_string(), "query".to_string()],
            rows,
            has_more: end < self.total_rows,
            time: 0.002,
        })
    }

    async fn execute_count(&self, query: &str) -> BackendResult<QueryResult> {
        self.record(format!("count:{}", query));
        Ok(QueryResult {
            columns: vec!["count".to_string()],
            rows: vec![vec![Cell::from(self.total_rows as i64)]],
            has_more: false,
            time: 0.001,
        })
    }

    async fn export_csv(&self, query: &str) -> BackendResult<Bytes> {
        self.record(format!("export:{}", query));
        Ok(Bytes::from_static(b"n,query\n1,x\n"))
    }

    async fn save_query(&self, name: &str, query: &str) -> BackendResult<SavedQuery> {
        self.record(format!("save:{}:{}", name, query));
        Ok(SavedQuery {
            id: Uuid::new_v4(),
            name: name.to_string(),
            query: query.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn list_saved_queries(&self) -> BackendResult<Vec<SavedQuery>> {
        self.record("list_queries".to_string());
        Ok(vec![SavedQuery {
            id: Uuid::nil(),
            name: "Top orders".to_string(),
            query: "SELECT * FROM \"orders\"".to_string(),
            created_at: Utc::now(),
        }])
    }

    async fn delete_saved_query(&self, id: Uuid) -> BackendResult<()> {
        self.record(format!("delete:{}", id));
        Ok(())
    }

    async fn list_files(&self) -> BackendResult<Vec<WorkspaceFile>> {
        self.record("list_files".to_string());
        let file = |name: &str, columns: &[&str]| WorkspaceFile {
            id: Uuid::new_v4(),
            table_name: name.to_string(),
            filename: format!("{}.csv", name),
            size: 1024,
            uploaded_at: Utc::now(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        };
        Ok(vec![
            file("orders", &["id", "customer_id", "total"]),
            file("customers", &["id", "name"]),
            file("payments", &["id", "order_id"]),
        ])
    }
}
