//! Read-only statement guard
//!
//! Local check run on typed queries before they reach the session. The server
//! performs the authoritative validation; this parses the text with the DuckDB
//! dialect and refuses anything that is not a single read-only query.

use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

pub fn check(query: &str) -> Verdict {
    if query.trim().is_empty() {
        return Verdict::Reject("Query cannot be empty".to_string());
    }

    let statements = match Parser::parse_sql(&DuckDbDialect {}, query) {
        Ok(statements) => statements,
        Err(err) => return Verdict::Reject(format!("Could not parse query: {}", err)),
    };

    let statement = match statements.as_slice() {
        [] => return Verdict::Reject("Query cannot be empty".to_string()),
        [single] => single,
        _ => {
            return Verdict::Reject(format!(
                "Only one statement is allowed, found {}",
                statements.len()
            ))
        }
    };

    match statement.visit(&mut ReadOnly) {
        ControlFlow::Continue(()) => Verdict::Accept,
        ControlFlow::Break(kind) => Verdict::Reject(format!("Disallowed statement: {}", kind)),
    }
}

/// Breaks with the kind of the first node that can do more than read.
///
/// Nested statements show up wherever a query body may hold one (`WITH ... DELETE`,
/// data-modifying CTEs), so every statement and every query body is inspected.
struct ReadOnly;

impl Visitor for ReadOnly {
    type Break = String;

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<String> {
        match statement {
            Statement::Query(_) => ControlFlow::Continue(()),
            other => ControlFlow::Break(kind(other)),
        }
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<String> {
        read_only_body(&query.body)
    }
}

fn read_only_body(body: &SetExpr) -> ControlFlow<String> {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Query(_) => ControlFlow::Continue(()),
        SetExpr::SetOperation { left, right, .. } => {
            read_only_body(left)?;
            read_only_body(right)
        }
        other => ControlFlow::Break(kind(other)),
    }
}

/// Leading keyword of the node's rendered SQL, e.g. `INSERT` or `DROP`
fn kind(node: &impl fmt::Display) -> String {
    node.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
}
