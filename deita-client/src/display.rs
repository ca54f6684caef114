//! Plain-text rendering of result pages and catalog listings.

use deita::backend::{Cell, SavedQuery};
use deita::catalog::TableCatalog;

/// Longest cell text shown before truncation
const MAX_CELL_WIDTH: usize = 40;

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    }
}

/// Render columns and rows as an aligned text table.
pub fn render_table(columns: &[String], rows: &[Vec<Cell>]) -> String {
    let header: Vec<String> = columns.iter().map(|c| clip(c)).collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(&cell.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let pad = widths[i].saturating_sub(cell.chars().count());
                format!("{}{}", cell, " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![format_row(&header)];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(body.iter().map(|row| format_row(row)));
    out.join("\n")
}

pub fn render_catalog(catalog: &TableCatalog) -> String {
    if catalog.is_empty() {
        return "No tables in this workspace.".to_string();
    }
    catalog
        .tables()
        .iter()
        .map(|t| {
            if t.fields.is_empty() {
                format!("  {}  [{}]", t.display_name, t.id)
            } else {
                format!("  {}  [{}]: {}", t.display_name, t.id, t.fields.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_saved_queries(queries: &[SavedQuery]) -> String {
    if queries.is_empty() {
        return "No saved queries.".to_string();
    }
    queries
        .iter()
        .enumerate()
        .map(|(i, q)| {
            format!(
                "  {}. {} ({})\n     {}",
                i + 1,
                q.name,
                q.created_at.format("%Y-%m-%d %H:%M"),
                q.query.replace('\n', "\n     ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
