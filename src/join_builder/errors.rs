use thiserror::Error;

use crate::catalog::TableId;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JoinError {
    #[error("Table `{0}` is not in the workspace catalog")]
    UnknownTable(TableId),
    #[error("Table `{0}` is already part of the join chain")]
    AlreadyJoined(TableId),
    #[error("Table `{0}` is not part of the join chain")]
    NotInChain(TableId),
    #[error("No join in progress; start a join with a first table")]
    NoJoinInProgress,
    #[error("Finish or cancel the pending join before adding another table")]
    JoinPending,
    #[error("No join condition is awaiting confirmation")]
    NoOpenDialog,
    #[error("The {side} join field cannot be empty")]
    EmptyField { side: &'static str },
    #[error("Field `{field}` does not exist in table `{table}`")]
    UnknownField { table: String, field: String },
    #[error("Edge {left} -> {right} does not attach the table being added ({expected})")]
    NotAdjacent {
        left: TableId,
        right: TableId,
        expected: TableId,
    },
    #[error("Join chain is unresolved: {tables} tables but {edges} join conditions")]
    Unresolved { tables: usize, edges: usize },
    #[error("Unknown join type `{0}` (expected INNER, LEFT, RIGHT or FULL)")]
    InvalidJoinType(String),
}
