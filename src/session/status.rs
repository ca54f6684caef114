use std::fmt;

/// Identifies one issued request. `generation` is the query-text generation the
/// request was issued under; `id` is unique across the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub id: u64,
    pub generation: u64,
}

/// The four request classes that may be in flight concurrently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Execute,
    Count,
    Export,
    Save,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Execute => "execute",
            OperationKind::Count => "count",
            OperationKind::Export => "export",
            OperationKind::Save => "save",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one operation class
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus<T> {
    Idle,
    /// Request issued, waiting for the response carrying this ticket
    InFlight(Ticket),
    Succeeded(T),
    Failed(String),
}

impl<T> Default for OperationStatus<T> {
    fn default() -> Self {
        OperationStatus::Idle
    }
}

impl<T> OperationStatus<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, OperationStatus::InFlight(_))
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            OperationStatus::InFlight(ticket) => Some(*ticket),
            _ => None,
        }
    }

    /// Whether a response with `ticket` is the one this status is waiting for
    pub fn awaits(&self, ticket: Ticket) -> bool {
        self.ticket() == Some(ticket)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            OperationStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
