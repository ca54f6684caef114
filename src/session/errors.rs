use thiserror::Error;

use super::status::OperationKind;

/// Gestures the session refuses locally, before any request is issued
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Query cannot be empty")]
    EmptyQuery,
    #[error("No query has been run yet")]
    NoQuery,
    #[error("Page numbers start at 1")]
    InvalidPage,
    #[error("A {0} request is already in progress")]
    Busy(OperationKind),
    #[error("Saved query name cannot be empty")]
    EmptySaveName,
}
