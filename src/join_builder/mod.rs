//! Join Graph Builder
//!
//! Linearizes table/field gestures into a single join chain:
//!
//! ```text
//! Empty -> AwaitingFirstTable -(start_join)-> AwaitingSecondTable
//!       -(add_table_to_join)-> AwaitingJoinCondition -(confirm_join_edge)-> Resolved
//! Resolved -(add_table_to_join, 1 table)-> AwaitingJoinCondition
//! Resolved -(add_table_to_join, >=2 tables)-> AwaitingAnchorSelection
//!          -(select_join_anchor)-> AwaitingJoinCondition
//! any -(cancel_join / reset_join)-> Empty
//! ```
//!
//! The builder never talks to the network. Each confirmed edge produces a
//! [`JoinEvent::QueryChanged`] for whoever owns the query session.

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{TableCatalog, TableId, TableRef};

mod edge;
mod errors;
pub mod synthesis;

pub use edge::{JoinEdge, JoinType};
pub use errors::JoinError;

/// One-way message from the builder to the query session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinEvent {
    QueryChanged(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinGraphState {
    /// Insertion order; the first element is the FROM table
    pub selected_tables: Vec<TableId>,
    pub edges: Vec<JoinEdge>,
    /// Table the next added table will connect to
    pub anchor: Option<TableId>,
}

impl JoinGraphState {
    /// Every table after the first has exactly one incoming edge
    pub fn is_resolved(&self) -> bool {
        !self.selected_tables.is_empty() && self.edges.len() + 1 == self.selected_tables.len()
    }

    pub fn contains(&self, table: &TableId) -> bool {
        self.selected_tables.contains(table)
    }
}

/// The join-condition dialog: `right` is the table being added, `left` the
/// suggested anchor it attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinDialog {
    pub left: TableId,
    pub right: TableId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinPhase {
    Empty,
    AwaitingFirstTable,
    AwaitingSecondTable,
    AwaitingAnchorSelection { pending: TableId },
    AwaitingJoinCondition(JoinDialog),
    Resolved,
}

/// Outcome of [`JoinGraphBuilder::add_table_to_join`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTableOutcome {
    DialogOpened(JoinDialog),
    /// Chain already has several tables; pick one with `select_join_anchor`
    AnchorRequired { candidates: Vec<TableId> },
}

pub struct JoinGraphBuilder {
    catalog: Arc<TableCatalog>,
    state: JoinGraphState,
    phase: JoinPhase,
}

impl JoinGraphBuilder {
    pub fn new(catalog: Arc<TableCatalog>) -> Self {
        Self {
            catalog,
            state: JoinGraphState::default(),
            phase: JoinPhase::Empty,
        }
    }

    pub fn state(&self) -> &JoinGraphState {
        &self.state
    }

    pub fn phase(&self) -> &JoinPhase {
        &self.phase
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Swap in a freshly loaded catalog. Ids may have disappeared, so the graph is cleared.
    pub fn replace_catalog(&mut self, catalog: Arc<TableCatalog>) {
        self.catalog = catalog;
        self.reset_join();
    }

    /// The "join tables" toggle: discard any graph and wait for a first table.
    pub fn enter_join_mode(&mut self) {
        self.reset_join();
        self.phase = JoinPhase::AwaitingFirstTable;
    }

    /// Direct single-table selection; clears any join.
    pub fn select_table(&mut self, table: &TableId) -> Result<JoinEvent, JoinError> {
        let display_name = self.known(table)?.display_name.clone();
        self.reset_join();
        log::debug!("Selected single table {}", display_name);
        Ok(JoinEvent::QueryChanged(synthesis::render_single_table(
            &display_name,
        )))
    }

    pub fn start_join(&mut self, table: &TableId) -> Result<(), JoinError> {
        self.known(table)?;
        self.state = JoinGraphState {
            selected_tables: vec![table.clone()],
            edges: Vec::new(),
            anchor: Some(table.clone()),
        };
        self.phase = JoinPhase::AwaitingSecondTable;
        log::debug!("Join started from {}", table);
        Ok(())
    }

    pub fn add_table_to_join(&mut self, table: &TableId) -> Result<AddTableOutcome, JoinError> {
        match &self.phase {
            JoinPhase::Empty | JoinPhase::AwaitingFirstTable => {
                return Err(JoinError::NoJoinInProgress)
            }
            JoinPhase::AwaitingAnchorSelection { .. } | JoinPhase::AwaitingJoinCondition(_) => {
                return Err(JoinError::JoinPending)
            }
            JoinPhase::AwaitingSecondTable | JoinPhase::Resolved => {}
        }
        self.check_addable(table)?;

        if self.state.selected_tables.len() >= 2 {
            self.phase = JoinPhase::AwaitingAnchorSelection {
                pending: table.clone(),
            };
            return Ok(AddTableOutcome::AnchorRequired {
                candidates: self.state.selected_tables.clone(),
            });
        }

        let anchor = match &self.state.anchor {
            Some(anchor) => anchor.clone(),
            None => self.state.selected_tables[0].clone(),
        };
        Ok(AddTableOutcome::DialogOpened(self.open_dialog(anchor, table)))
    }

    pub fn select_join_anchor(
        &mut self,
        existing: &TableId,
        new_table: &TableId,
    ) -> Result<JoinDialog, JoinError> {
        match &self.phase {
            JoinPhase::AwaitingAnchorSelection { pending } if pending != new_table => {
                return Err(JoinError::JoinPending)
            }
            JoinPhase::AwaitingAnchorSelection { .. }
            | JoinPhase::AwaitingSecondTable
            | JoinPhase::Resolved => {}
            JoinPhase::AwaitingJoinCondition(_) => return Err(JoinError::JoinPending),
            JoinPhase::Empty | JoinPhase::AwaitingFirstTable => {
                return Err(JoinError::NoJoinInProgress)
            }
        }
        if !self.state.contains(existing) {
            return Err(JoinError::NotInChain(existing.clone()));
        }
        self.check_addable(new_table)?;

        Ok(self.open_dialog(existing.clone(), new_table))
    }

    /// Append the edge for the open dialog and emit the new query text.
    ///
    /// On any error the dialog stays open and the graph is unchanged.
    pub fn confirm_join_edge(
        &mut self,
        left: &TableId,
        right: &TableId,
        left_field: &str,
        right_field: &str,
        join_type: JoinType,
    ) -> Result<JoinEvent, JoinError> {
        let JoinPhase::AwaitingJoinCondition(dialog) = &self.phase else {
            return Err(JoinError::NoOpenDialog);
        };

        let left_field = left_field.trim();
        let right_field = right_field.trim();
        if left_field.is_empty() {
            return Err(JoinError::EmptyField { side: "left" });
        }
        if right_field.is_empty() {
            return Err(JoinError::EmptyField { side: "right" });
        }

        // The new table sits last in the chain; the left side must already be joined before it
        let chain_before = &self.state.selected_tables[..self.state.selected_tables.len() - 1];
        if right != &dialog.right || !chain_before.contains(left) {
            return Err(JoinError::NotAdjacent {
                left: left.clone(),
                right: right.clone(),
                expected: dialog.right.clone(),
            });
        }

        for (table, field) in [(left, left_field), (right, right_field)] {
            let table_ref = self.known(table)?;
            if !table_ref.has_field(field) {
                return Err(JoinError::UnknownField {
                    table: table_ref.display_name.clone(),
                    field: field.to_string(),
                });
            }
        }

        self.state.edges.push(JoinEdge {
            left_table: left.clone(),
            right_table: right.clone(),
            left_field: left_field.to_string(),
            right_field: right_field.to_string(),
            join_type,
        });
        self.state.anchor = Some(right.clone());
        self.phase = JoinPhase::Resolved;

        let query = self.synthesize()?;
        log::info!(
            "Join chain resolved with {} tables",
            self.state.selected_tables.len()
        );
        Ok(JoinEvent::QueryChanged(query))
    }

    /// Abandon the in-progress join. The whole graph is cleared.
    pub fn cancel_join(&mut self) {
        self.reset_join();
    }

    pub fn reset_join(&mut self) {
        self.state = JoinGraphState::default();
        self.phase = JoinPhase::Empty;
    }

    /// Render the current chain; fails while a join condition is pending.
    pub fn synthesize(&self) -> Result<String, JoinError> {
        synthesis::render_join_chain(&self.catalog, &self.state)
    }

    fn open_dialog(&mut self, anchor: TableId, table: &TableId) -> JoinDialog {
        self.state.selected_tables.push(table.clone());
        self.state.anchor = Some(anchor.clone());
        let dialog = JoinDialog {
            left: anchor,
            right: table.clone(),
        };
        self.phase = JoinPhase::AwaitingJoinCondition(dialog.clone());
        dialog
    }

    fn known(&self, table: &TableId) -> Result<&TableRef, JoinError> {
        self.catalog
            .get(table)
            .ok_or_else(|| JoinError::UnknownTable(table.clone()))
    }

    fn check_addable(&self, table: &TableId) -> Result<(), JoinError> {
        self.known(table)?;
        if self.state.contains(table) {
            return Err(JoinError::AlreadyJoined(table.clone()));
        }
        Ok(())
    }
}
