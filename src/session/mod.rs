//! Paginated Query Session
//!
//! Owns the current query text and everything derived from it: the displayed
//! page, the inferred page size, the lazily fetched total, and one status per
//! request class. The session is a pure state machine. `begin_*` methods
//! validate a gesture and hand back a request description carrying a
//! [`Ticket`]; the caller performs the I/O and feeds the outcome to the
//! matching `complete_*` method. A completion whose ticket is no longer the
//! one its class is waiting for is discarded without touching state.

use bytes::Bytes;

use crate::backend::{BackendError, BackendResult, Cell, QueryResult, SavedQuery};

mod errors;
pub mod pagination;
mod status;

pub use errors::SessionError;
pub use status::{OperationKind, OperationStatus, Ticket};

/// Execute one page of `query`
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub ticket: Ticket,
    pub query: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountRequest {
    pub ticket: Ticket,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub ticket: Ticket,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub ticket: Ticket,
    pub name: String,
    pub query: String,
}

/// What `last_page` needs done next
#[derive(Debug, Clone, PartialEq)]
pub enum LastPageStep {
    /// Already on the last page
    NoOp,
    /// Total unknown: fetch it, the page request follows from `complete_count`
    Count(CountRequest),
    /// A count is already in flight; the page request follows from its completion
    AwaitingCount,
    Page(PageRequest),
}

/// Result of feeding a response back into the session
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Applied(T),
    /// Response belonged to a superseded request
    Discarded,
    Failed(BackendError),
}

/// Which navigation and action controls are usable in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub first: bool,
    pub previous: bool,
    pub next: bool,
    pub last: bool,
    pub count: bool,
    pub export: bool,
    pub save: bool,
}

#[derive(Debug, Default)]
pub struct QuerySession {
    query: Option<String>,
    /// Bumped on every query change; tickets carry it
    generation: u64,
    next_ticket_id: u64,

    current_page: u32,
    /// Page requested by the in-flight execute
    requested_page: u32,
    page_size: Option<usize>,
    has_more: bool,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    elapsed: Option<f64>,
    page_loaded: bool,

    total_count: Option<u64>,
    /// `last_page` is waiting for the count in flight
    last_page_after_count: bool,

    execute: OperationStatus<()>,
    count: OperationStatus<u64>,
    export: OperationStatus<usize>,
    save: OperationStatus<SavedQuery>,
}

impl QuerySession {
    pub fn new() -> Self {
        Self {
            current_page: 1,
            ..Default::default()
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Server-side execution time of the displayed page, in seconds
    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn execute_status(&self) -> &OperationStatus<()> {
        &self.execute
    }

    pub fn count_status(&self) -> &OperationStatus<u64> {
        &self.count
    }

    pub fn export_status(&self) -> &OperationStatus<usize> {
        &self.export
    }

    pub fn save_status(&self) -> &OperationStatus<SavedQuery> {
        &self.save
    }

    pub fn is_idle(&self) -> bool {
        !(self.execute.is_in_flight()
            || self.count.is_in_flight()
            || self.export.is_in_flight()
            || self.save.is_in_flight())
    }

    /// Replace the query text and start loading its first page.
    ///
    /// Never refused as busy: in-flight page and count requests of the old
    /// text become stale. Export and save keep running.
    pub fn set_query(&mut self, text: &str) -> Result<PageRequest, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyQuery);
        }

        self.generation += 1;
        self.query = Some(text.to_string());
        self.current_page = 1;
        self.page_size = None;
        self.has_more = false;
        self.columns.clear();
        self.rows.clear();
        self.elapsed = None;
        self.page_loaded = false;
        self.total_count = None;
        self.last_page_after_count = false;
        self.execute = OperationStatus::Idle;
        self.count = OperationStatus::Idle;

        log::debug!("Query changed (generation {})", self.generation);
        self.begin_page(1)
    }

    pub fn begin_page(&mut self, page: u32) -> Result<PageRequest, SessionError> {
        let query = self.require_query()?;
        if page == 0 {
            return Err(SessionError::InvalidPage);
        }
        if self.execute.is_in_flight() {
            return Err(SessionError::Busy(OperationKind::Execute));
        }

        let ticket = self.issue_ticket();
        self.execute = OperationStatus::InFlight(ticket);
        self.requested_page = page;
        log::debug!("Executing page {} (ticket {})", page, ticket.id);
        Ok(PageRequest {
            ticket,
            query,
            page,
        })
    }

    pub fn complete_page(
        &mut self,
        ticket: Ticket,
        result: BackendResult<QueryResult>,
    ) -> Completion<()> {
        if !self.execute.awaits(ticket) {
            log::debug!("Discarding stale page response (ticket {})", ticket.id);
            return Completion::Discarded;
        }

        match result {
            Ok(result) => {
                if result.has_more && self.page_size.is_none() && !result.rows.is_empty() {
                    self.page_size = Some(result.rows.len());
                }
                self.current_page = self.requested_page;
                self.columns = result.columns;
                self.rows = result.rows;
                self.has_more = result.has_more;
                self.elapsed = Some(result.time);
                self.page_loaded = true;
                self.execute = OperationStatus::Succeeded(());
                log::info!(
                    "Loaded page {} ({} rows, has_more={})",
                    self.current_page,
                    self.rows.len(),
                    self.has_more
                );
                Completion::Applied(())
            }
            Err(e) => {
                log::warn!("Page {} failed: {}", self.requested_page, e);
                self.execute = OperationStatus::Failed(e.to_string());
                Completion::Failed(e)
            }
        }
    }

    /// Issue a count request, even when a total is already cached.
    pub fn begin_count(&mut self) -> Result<CountRequest, SessionError> {
        let query = self.require_query()?;
        if self.count.is_in_flight() {
            return Err(SessionError::Busy(OperationKind::Count));
        }

        let ticket = self.issue_ticket();
        self.count = OperationStatus::InFlight(ticket);
        log::debug!("Counting rows (ticket {})", ticket.id);
        Ok(CountRequest { ticket, query })
    }

    /// Store the total. When `last_page` was waiting on it, the returned
    /// value carries the follow-up page request.
    pub fn complete_count(
        &mut self,
        ticket: Ticket,
        result: BackendResult<QueryResult>,
    ) -> Completion<Option<PageRequest>> {
        if !self.count.awaits(ticket) {
            log::debug!("Discarding stale count response (ticket {})", ticket.id);
            return Completion::Discarded;
        }

        let follow_up = std::mem::take(&mut self.last_page_after_count);
        let total = match result.and_then(|r| r.count_value().ok_or(BackendError::MalformedCount)) {
            Ok(total) => total,
            Err(e) => {
                log::warn!("Count failed: {}", e);
                self.count = OperationStatus::Failed(e.to_string());
                return Completion::Failed(e);
            }
        };

        self.total_count = Some(total);
        self.count = OperationStatus::Succeeded(total);
        log::info!("Query has {} rows", total);

        if !follow_up {
            return Completion::Applied(None);
        }
        match self.begin_page(self.last_page_target(total)) {
            Ok(request) => Completion::Applied(Some(request)),
            Err(e) => {
                log::warn!("Last page not requested: {}", e);
                Completion::Applied(None)
            }
        }
    }

    pub fn first_page(&mut self) -> Result<Option<PageRequest>, SessionError> {
        self.require_query()?;
        self.require_no_pending_jump()?;
        if self.current_page <= 1 {
            return Ok(None);
        }
        self.begin_page(1).map(Some)
    }

    pub fn previous_page(&mut self) -> Result<Option<PageRequest>, SessionError> {
        self.require_query()?;
        self.require_no_pending_jump()?;
        if self.current_page <= 1 {
            return Ok(None);
        }
        self.begin_page(self.current_page - 1).map(Some)
    }

    pub fn next_page(&mut self) -> Result<Option<PageRequest>, SessionError> {
        self.require_query()?;
        self.require_no_pending_jump()?;
        if !self.has_more {
            return Ok(None);
        }
        self.begin_page(self.current_page + 1).map(Some)
    }

    pub fn last_page(&mut self) -> Result<LastPageStep, SessionError> {
        self.require_query()?;
        if !self.has_more {
            return Ok(LastPageStep::NoOp);
        }
        if self.execute.is_in_flight() {
            return Err(SessionError::Busy(OperationKind::Execute));
        }

        match self.total_count {
            Some(total) => {
                let target = self.last_page_target(total);
                self.begin_page(target).map(LastPageStep::Page)
            }
            None if self.count.is_in_flight() => {
                self.last_page_after_count = true;
                Ok(LastPageStep::AwaitingCount)
            }
            None => {
                let request = self.begin_count()?;
                self.last_page_after_count = true;
                Ok(LastPageStep::Count(request))
            }
        }
    }

    /// Page `last_page` would navigate to for `total` rows
    pub fn last_page_target(&self, total: u64) -> u32 {
        pagination::last_page_number(total, self.page_size.unwrap_or(self.rows.len()))
    }

    pub fn begin_export(&mut self) -> Result<ExportRequest, SessionError> {
        let query = self.require_query()?;
        if self.export.is_in_flight() {
            return Err(SessionError::Busy(OperationKind::Export));
        }

        let ticket = self.issue_ticket();
        self.export = OperationStatus::InFlight(ticket);
        log::debug!("Exporting (ticket {})", ticket.id);
        Ok(ExportRequest { ticket, query })
    }

    /// Hand the CSV blob back to the caller for persisting. Pagination is untouched.
    pub fn complete_export(
        &mut self,
        ticket: Ticket,
        result: BackendResult<Bytes>,
    ) -> Completion<Bytes> {
        if !self.export.awaits(ticket) {
            log::debug!("Discarding stale export response (ticket {})", ticket.id);
            return Completion::Discarded;
        }

        match result {
            Ok(blob) => {
                self.export = OperationStatus::Succeeded(blob.len());
                log::info!("Export finished ({} bytes)", blob.len());
                Completion::Applied(blob)
            }
            Err(e) => {
                log::warn!("Export failed: {}", e);
                self.export = OperationStatus::Failed(e.to_string());
                Completion::Failed(e)
            }
        }
    }

    pub fn begin_save(&mut self, name: &str) -> Result<SaveRequest, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptySaveName);
        }
        let query = self.require_query()?;
        if self.save.is_in_flight() {
            return Err(SessionError::Busy(OperationKind::Save));
        }

        let ticket = self.issue_ticket();
        self.save = OperationStatus::InFlight(ticket);
        log::debug!("Saving query as '{}' (ticket {})", name, ticket.id);
        Ok(SaveRequest {
            ticket,
            name: name.to_string(),
            query,
        })
    }

    pub fn complete_save(
        &mut self,
        ticket: Ticket,
        result: BackendResult<SavedQuery>,
    ) -> Completion<SavedQuery> {
        if !self.save.awaits(ticket) {
            log::debug!("Discarding stale save response (ticket {})", ticket.id);
            return Completion::Discarded;
        }

        match result {
            Ok(saved) => {
                log::info!("Saved query '{}' ({})", saved.name, saved.id);
                self.save = OperationStatus::Succeeded(saved.clone());
                Completion::Applied(saved)
            }
            Err(e) => {
                log::warn!("Save failed: {}", e);
                self.save = OperationStatus::Failed(e.to_string());
                Completion::Failed(e)
            }
        }
    }

    /// `None` until a page of the current query has loaded.
    pub fn pagination_message(&self) -> Option<String> {
        if !self.page_loaded {
            return None;
        }
        Some(pagination::pagination_message(
            self.current_page,
            self.rows.len(),
            self.has_more,
            self.total_count,
            self.page_size,
        ))
    }

    pub fn controls(&self) -> Controls {
        if self.query.is_none() {
            return Controls::default();
        }
        let navigable =
            self.page_loaded && !self.execute.is_in_flight() && !self.last_page_after_count;
        Controls {
            first: navigable && self.current_page > 1,
            previous: navigable && self.current_page > 1,
            next: navigable && self.has_more,
            last: navigable && self.has_more,
            count: !self.count.is_in_flight(),
            export: !self.export.is_in_flight(),
            save: !self.save.is_in_flight(),
        }
    }

    /// A last-page jump waiting on its count owns the next page request.
    fn require_no_pending_jump(&self) -> Result<(), SessionError> {
        if self.last_page_after_count {
            return Err(SessionError::Busy(OperationKind::Count));
        }
        Ok(())
    }

    fn require_query(&self) -> Result<String, SessionError> {
        self.query.clone().ok_or(SessionError::NoQuery)
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket_id += 1;
        Ticket {
            id: self.next_ticket_id,
            generation: self.generation,
        }
    }
}
