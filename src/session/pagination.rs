//! Pagination arithmetic and the message shown under a result page.

/// Render with `,` as thousands separator.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `ceil(total / page_size)`, never below 1.
pub fn last_page_number(total_count: u64, page_size: usize) -> u32 {
    let size = page_size.max(1) as u64;
    let pages = total_count.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Message for the displayed page.
///
/// `page_size` falls back to the row count of the displayed page when it has
/// not been inferred yet.
pub fn pagination_message(
    current_page: u32,
    row_count: usize,
    has_more: bool,
    total_count: Option<u64>,
    page_size: Option<usize>,
) -> String {
    let size = page_size.unwrap_or(row_count) as u64;
    let start = u64::from(current_page.max(1) - 1) * size + 1;
    let end = (start + row_count as u64).saturating_sub(1);
    let rows = format_thousands(row_count as u64);

    match total_count {
        Some(total) => format!(
            "Showing {} to {} of {}",
            format_thousands(start),
            format_thousands(end),
            format_thousands(total)
        ),
        None if current_page <= 1 => format!("Showing first {} rows of", rows),
        None if has_more => format!(
            "Showing {} to {}",
            format_thousands(start),
            format_thousands(end)
        ),
        None => format!("Showing last {} rows", rows),
    }
}
