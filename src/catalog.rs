//! Table catalog
//!
//! Read-only view of the tables a workspace exposes. Each uploaded file is one
//! table; the join builder resolves ids to display names through here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::WorkspaceFile;

/// Identifier of a table, stable for the lifetime of the uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub String);

impl TableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableId {
    fn from(value: &str) -> Self {
        TableId(value.to_string())
    }
}

impl From<String> for TableId {
    fn from(value: String) -> Self {
        TableId(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub id: TableId,
    pub display_name: String,
    /// Column names in file order; empty when unknown
    pub fields: Vec<String>,
}

impl TableRef {
    pub fn new(id: impl Into<TableId>, display_name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Whether `field` is a known column. Tables with no known columns accept anything.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f == field)
    }
}

impl From<&WorkspaceFile> for TableRef {
    fn from(file: &WorkspaceFile) -> Self {
        TableRef {
            id: TableId(file.id.to_string()),
            display_name: file.table_name.clone(),
            fields: file.columns.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    tables: Vec<TableRef>,
}

impl TableCatalog {
    pub fn new(tables: Vec<TableRef>) -> Self {
        Self { tables }
    }

    pub fn from_files(files: &[WorkspaceFile]) -> Self {
        Self::new(files.iter().map(TableRef::from).collect())
    }

    pub fn get(&self, id: &TableId) -> Option<&TableRef> {
        self.tables.iter().find(|t| &t.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TableRef> {
        self.tables.iter().find(|t| t.display_name == name)
    }

    /// Resolve either an id or a display name, id first.
    pub fn resolve(&self, key: &str) -> Option<&TableRef> {
        self.get(&TableId::from(key))
            .or_else(|| self.find_by_name(key))
    }

    pub fn tables(&self) -> &[TableRef] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
