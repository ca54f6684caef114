//! Explorer event loop
//!
//! Ties a [`JoinGraphBuilder`] and a [`QuerySession`] to a [`QueryBackend`].
//! Gestures validate locally, then spawn the backend call on the tokio
//! runtime; responses come back over an mpsc channel and are applied by
//! [`Explorer::handle`]. Nothing here blocks waiting for a response unless
//! the caller asks for it with [`Explorer::settle`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Local;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::backend::{BackendError, BackendResult, QueryBackend, QueryResult, SavedQuery};
use crate::catalog::{TableCatalog, TableId};
use crate::export;
use crate::join_builder::{
    AddTableOutcome, JoinDialog, JoinError, JoinEvent, JoinGraphBuilder, JoinType,
};
use crate::session::{
    Completion, CountRequest, ExportRequest, LastPageStep, OperationKind, PageRequest,
    QuerySession, SaveRequest, SessionError, Ticket,
};
use crate::sql_guard::{self, Verdict};

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Query rejected: {0}")]
    Rejected(String),
    #[error("No saved query matches `{0}`")]
    UnknownSavedQuery(String),
}

/// A backend call's outcome, tagged with the ticket it was issued under
#[derive(Debug)]
pub enum BackendResponse {
    Page {
        ticket: Ticket,
        result: BackendResult<QueryResult>,
    },
    Count {
        ticket: Ticket,
        result: BackendResult<QueryResult>,
    },
    Export {
        ticket: Ticket,
        result: BackendResult<Bytes>,
    },
    Save {
        ticket: Ticket,
        result: BackendResult<SavedQuery>,
    },
}

/// Transient messages for the user
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PageLoaded { page: u32, rows: usize },
    Counted(u64),
    Exported(PathBuf),
    Saved(SavedQuery),
    Failed { kind: OperationKind, message: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::PageLoaded { page, rows } => {
                write!(f, "Loaded page {} ({} rows)", page, rows)
            }
            Notification::Counted(total) => write!(f, "Query returns {} rows", total),
            Notification::Exported(path) => write!(f, "Exported to {}", path.display()),
            Notification::Saved(saved) => write!(f, "Saved query '{}'", saved.name),
            Notification::Failed { kind, message } => write!(f, "{} failed: {}", kind, message),
        }
    }
}

pub struct Explorer {
    backend: Arc<dyn QueryBackend>,
    catalog: Arc<TableCatalog>,
    builder: JoinGraphBuilder,
    session: QuerySession,
    export_dir: PathBuf,
    saved_queries: Vec<SavedQuery>,
    notifications: Vec<Notification>,
    tx: mpsc::UnboundedSender<BackendResponse>,
    rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Explorer {
    pub fn new(backend: Arc<dyn QueryBackend>, export_dir: impl Into<PathBuf>) -> Self {
        let catalog = Arc::new(TableCatalog::default());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            builder: JoinGraphBuilder::new(catalog.clone()),
            catalog,
            session: QuerySession::new(),
            export_dir: export_dir.into(),
            saved_queries: Vec::new(),
            notifications: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    pub fn builder(&self) -> &JoinGraphBuilder {
        &self.builder
    }

    pub fn session(&self) -> &QuerySession {
        &self.session
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn saved_queries(&self) -> &[SavedQuery] {
        &self.saved_queries
    }

    /// Fetch the workspace file listing; each file becomes a table.
    pub async fn load_catalog(&mut self) -> Result<usize, ExplorerError> {
        let files = self.backend.list_files().await?;
        self.catalog = Arc::new(TableCatalog::from_files(&files));
        self.builder.replace_catalog(self.catalog.clone());
        log::info!("Loaded {} tables", self.catalog.len());
        Ok(self.catalog.len())
    }

    /// Use a catalog obtained elsewhere
    pub fn set_catalog(&mut self, catalog: TableCatalog) {
        self.catalog = Arc::new(catalog);
        self.builder.replace_catalog(self.catalog.clone());
    }

    // Join gestures. Tables are addressed by id or display name.

    pub fn select_table(&mut self, table: &str) -> Result<(), ExplorerError> {
        let id = self.resolve(table)?;
        let event = self.builder.select_table(&id)?;
        self.route(event)
    }

    pub fn enter_join_mode(&mut self) {
        self.builder.enter_join_mode();
    }

    pub fn start_join(&mut self, table: &str) -> Result<(), ExplorerError> {
        let id = self.resolve(table)?;
        Ok(self.builder.start_join(&id)?)
    }

    pub fn add_table_to_join(&mut self, table: &str) -> Result<AddTableOutcome, ExplorerError> {
        let id = self.resolve(table)?;
        Ok(self.builder.add_table_to_join(&id)?)
    }

    pub fn select_join_anchor(
        &mut self,
        existing: &str,
        new_table: &str,
    ) -> Result<JoinDialog, ExplorerError> {
        let existing = self.resolve(existing)?;
        let new_table = self.resolve(new_table)?;
        Ok(self.builder.select_join_anchor(&existing, &new_table)?)
    }

    pub fn confirm_join_edge(
        &mut self,
        left: &str,
        right: &str,
        left_field: &str,
        right_field: &str,
        join_type: JoinType,
    ) -> Result<(), ExplorerError> {
        let left = self.resolve(left)?;
        let right = self.resolve(right)?;
        let event =
            self.builder
                .confirm_join_edge(&left, &right, left_field, right_field, join_type)?;
        self.route(event)
    }

    pub fn cancel_join(&mut self) {
        self.builder.cancel_join();
    }

    pub fn reset_join(&mut self) {
        self.builder.reset_join();
    }

    // Session gestures

    /// Run a typed query after the statement guard accepts it.
    pub fn run_query(&mut self, text: &str) -> Result<(), ExplorerError> {
        if let Verdict::Reject(reason) = sql_guard::check(text) {
            log::warn!("Rejected query: {}", reason);
            return Err(ExplorerError::Rejected(reason));
        }
        let request = self.session.set_query(text)?;
        self.spawn_page(request);
        Ok(())
    }

    /// Returns whether a request was issued
    pub fn next_page(&mut self) -> Result<bool, ExplorerError> {
        let request = self.session.next_page()?;
        Ok(self.spawn_optional_page(request))
    }

    pub fn previous_page(&mut self) -> Result<bool, ExplorerError> {
        let request = self.session.previous_page()?;
        Ok(self.spawn_optional_page(request))
    }

    pub fn first_page(&mut self) -> Result<bool, ExplorerError> {
        let request = self.session.first_page()?;
        Ok(self.spawn_optional_page(request))
    }

    pub fn last_page(&mut self) -> Result<bool, ExplorerError> {
        match self.session.last_page()? {
            LastPageStep::NoOp => Ok(false),
            LastPageStep::AwaitingCount => Ok(true),
            LastPageStep::Count(request) => {
                self.spawn_count(request);
                Ok(true)
            }
            LastPageStep::Page(request) => {
                self.spawn_page(request);
                Ok(true)
            }
        }
    }

    pub fn fetch_count(&mut self) -> Result<(), ExplorerError> {
        let request = self.session.begin_count()?;
        self.spawn_count(request);
        Ok(())
    }

    pub fn export_csv(&mut self) -> Result<(), ExplorerError> {
        let request = self.session.begin_export()?;
        self.spawn_export(request);
        Ok(())
    }

    pub fn save_query(&mut self, name: &str) -> Result<(), ExplorerError> {
        let request = self.session.begin_save(name)?;
        self.spawn_save(request);
        Ok(())
    }

    // Saved queries

    pub async fn refresh_saved_queries(&mut self) -> Result<&[SavedQuery], ExplorerError> {
        self.saved_queries = self.backend.list_saved_queries().await?;
        Ok(&self.saved_queries)
    }

    /// Load a saved query into the session. `key` is a 1-based position in the
    /// last listing, a name, or an id.
    pub fn open_saved_query(&mut self, key: &str) -> Result<(), ExplorerError> {
        let query = self.find_saved(key)?.query.clone();
        self.builder.reset_join();
        self.run_query(&query)
    }

    pub async fn delete_saved_query(&mut self, key: &str) -> Result<SavedQuery, ExplorerError> {
        let saved = self.find_saved(key)?.clone();
        self.backend.delete_saved_query(saved.id).await?;
        self.saved_queries.retain(|q| q.id != saved.id);
        log::info!("Deleted saved query '{}'", saved.name);
        Ok(saved)
    }

    // Response handling

    /// Wait for the next backend response.
    pub async fn next_response(&mut self) -> Option<BackendResponse> {
        self.rx.recv().await
    }

    /// Apply one backend response to the session.
    pub fn handle(&mut self, response: BackendResponse) {
        match response {
            BackendResponse::Page { ticket, result } => {
                match self.session.complete_page(ticket, result) {
                    Completion::Applied(()) => self.notify(Notification::PageLoaded {
                        page: self.session.current_page(),
                        rows: self.session.rows().len(),
                    }),
                    Completion::Failed(e) => self.notify_failure(OperationKind::Execute, e),
                    Completion::Discarded => {}
                }
            }
            BackendResponse::Count { ticket, result } => {
                match self.session.complete_count(ticket, result) {
                    Completion::Applied(follow_up) => {
                        if let Some(total) = self.session.total_count() {
                            self.notify(Notification::Counted(total));
                        }
                        if let Some(request) = follow_up {
                            self.spawn_page(request);
                        }
                    }
                    Completion::Failed(e) => self.notify_failure(OperationKind::Count, e),
                    Completion::Discarded => {}
                }
            }
            BackendResponse::Export { ticket, result } => {
                match self.session.complete_export(ticket, result) {
                    Completion::Applied(blob) => {
                        match export::write_export(&self.export_dir, &blob, Local::now()) {
                            Ok(path) => self.notify(Notification::Exported(path)),
                            Err(e) => {
                                log::warn!("{}", e);
                                self.notify(Notification::Failed {
                                    kind: OperationKind::Export,
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                    Completion::Failed(e) => self.notify_failure(OperationKind::Export, e),
                    Completion::Discarded => {}
                }
            }
            BackendResponse::Save { ticket, result } => {
                match self.session.complete_save(ticket, result) {
                    Completion::Applied(saved) => {
                        self.saved_queries.push(saved.clone());
                        self.notify(Notification::Saved(saved));
                    }
                    Completion::Failed(e) => self.notify_failure(OperationKind::Save, e),
                    Completion::Discarded => {}
                }
            }
        }
    }

    /// Apply responses until no request is in flight.
    pub async fn settle(&mut self) {
        while !self.session.is_idle() {
            match self.rx.recv().await {
                Some(response) => self.handle(response),
                None => break,
            }
        }
    }

    /// Apply whatever responses have already arrived, without waiting.
    pub fn drain(&mut self) {
        while let Ok(response) = self.rx.try_recv() {
            self.handle(response);
        }
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn resolve(&self, key: &str) -> Result<TableId, JoinError> {
        self.catalog
            .resolve(key.trim())
            .map(|t| t.id.clone())
            .ok_or_else(|| JoinError::UnknownTable(TableId::from(key.trim())))
    }

    fn route(&mut self, event: JoinEvent) -> Result<(), ExplorerError> {
        match event {
            JoinEvent::QueryChanged(query) => {
                let request = self.session.set_query(&query)?;
                self.spawn_page(request);
            }
        }
        Ok(())
    }

    fn find_saved(&self, key: &str) -> Result<&SavedQuery, ExplorerError> {
        let key = key.trim();
        let by_position = key
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.saved_queries.get(i));
        by_position
            .or_else(|| self.saved_queries.iter().find(|q| q.name == key))
            .or_else(|| {
                self.saved_queries
                    .iter()
                    .find(|q| q.id.to_string() == key)
            })
            .ok_or_else(|| ExplorerError::UnknownSavedQuery(key.to_string()))
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn notify_failure(&mut self, kind: OperationKind, error: BackendError) {
        self.notify(Notification::Failed {
            kind,
            message: error.to_string(),
        });
    }

    fn spawn_optional_page(&mut self, request: Option<PageRequest>) -> bool {
        match request {
            Some(request) => {
                self.spawn_page(request);
                true
            }
            None => false,
        }
    }

    fn spawn_page(&self, request: PageRequest) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.execute_page(&request.query, request.page).await;
            // Receiver only goes away with the explorer itself
            let _ = tx.send(BackendResponse::Page {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn spawn_count(&self, request: CountRequest) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.execute_count(&request.query).await;
            let _ = tx.send(BackendResponse::Count {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn spawn_export(&self, request: ExportRequest) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.export_csv(&request.query).await;
            let _ = tx.send(BackendResponse::Export {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn spawn_save(&self, request: SaveRequest) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.save_query(&request.name, &request.query).await;
            let _ = tx.send(BackendResponse::Save {
                ticket: request.ticket,
                result,
            });
        });
    }
}
