use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Rendered in place of SQL NULL so it is never confused with the text "null"
pub const NULL_MARKER: &str = "∅";

/// Body of `POST /workspaces/{id}/query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// 1-indexed page; the server treats a missing page as page 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// If true, the server answers with a single `count` cell instead of rows
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
}

impl QueryRequest {
    pub fn page(query: impl Into<String>, page: u32) -> Self {
        Self {
            query: query.into(),
            page: Some(page),
            count: false,
        }
    }

    pub fn count(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: None,
            count: true,
        }
    }
}

/// A single scalar crossing the API boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Non-negative integer value, accepting numeric strings as some drivers stringify bigints
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Cell::Number(n) => n.as_u64(),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str(NULL_MARKER),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value.into())
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// Response of a page or count execution
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    #[serde(default)]
    pub has_more: bool,
    /// Server-side execution time in seconds
    #[serde(default)]
    pub time: f64,
}

impl QueryResult {
    /// Extract the scalar of a count response: one row, one column.
    pub fn count_value(&self) -> Option<u64> {
        match self.rows.as_slice() {
            [row] => match row.as_slice() {
                [cell] => cell.as_u64(),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Body of `POST /workspaces/{id}/query/export`
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub query: String,
}

/// Body of `POST /workspaces/{id}/queries`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveQueryRequest {
    pub name: String,
    pub query: String,
}

/// A query persisted in the workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: Uuid,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

/// An uploaded CSV file; each one is queryable as a table named `table_name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub id: Uuid,
    pub table_name: String,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Column names, when the server has sniffed them
    #[serde(default)]
    pub columns: Vec<String>,
}

/// FastAPI error envelope. `detail` is a string for handled errors and a
/// list of objects for request validation failures.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
