//! Rendering of a join chain into query text.
//!
//! Output shape, one clause per line:
//!
//! ```text
//! SELECT * FROM "orders"
//! INNER JOIN "customers" ON "orders"."customer_id" = "customers"."id"
//! ```

use std::fmt::Write;

use super::errors::JoinError;
use super::JoinGraphState;
use crate::catalog::{TableCatalog, TableId};

/// Double-quote an identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn render_single_table(display_name: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(display_name))
}

/// Render a resolved chain. Edges are consumed strictly in chain order: the
/// edge at position `i - 1` must attach `selected_tables[i]`.
pub fn render_join_chain(
    catalog: &TableCatalog,
    state: &JoinGraphState,
) -> Result<String, JoinError> {
    let tables = &state.selected_tables;
    let Some(first) = tables.first() else {
        return Err(JoinError::NoJoinInProgress);
    };
    if state.edges.len() + 1 != tables.len() {
        return Err(JoinError::Unresolved {
            tables: tables.len(),
            edges: state.edges.len(),
        });
    }

    let mut sql = render_single_table(display_name(catalog, first)?);

    for (table, edge) in tables[1..].iter().zip(&state.edges) {
        if &edge.right_table != table {
            return Err(JoinError::NotAdjacent {
                left: edge.left_table.clone(),
                right: edge.right_table.clone(),
                expected: table.clone(),
            });
        }

        let left_name = display_name(catalog, &edge.left_table)?;
        let right_name = display_name(catalog, &edge.right_table)?;

        // Writing into a String cannot fail
        let _ = write!(
            sql,
            "\n{} JOIN {} ON {}.{} = {}.{}",
            edge.join_type,
            quote_ident(right_name),
            quote_ident(left_name),
            quote_ident(&edge.left_field),
            quote_ident(right_name),
            quote_ident(&edge.right_field),
        );
    }

    Ok(sql)
}

fn display_name<'c>(catalog: &'c TableCatalog, id: &TableId) -> Result<&'c str, JoinError> {
    catalog
        .get(id)
        .map(|t| t.display_name.as_str())
        .ok_or_else(|| JoinError::UnknownTable(id.clone()))
}
