//! Page selection: which pages of a document receive the signature.
//!
//! Resolution is a pure function of the mode and the document's page count.
//! It never fails. Malformed tokens in a custom spec are dropped, and the
//! result is always an ascending, duplicate-free subset of `1..=total_pages`.
//!
//! ## Custom spec syntax
//!
//! ```text
//! 1,3,5      → pages 1, 3 and 5
//! 2-4        → pages 2, 3 and 4 (inclusive)
//! 1, 3-5 ,7  → whitespace anywhere is ignored
//! 0-3        → clamped to 1-3
//! 5-2        → empty (start after end)
//! a,1-x,2-3-4 → empty (malformed tokens dropped)
//! ```

use crate::config::PageSelectionMode;

/// Parse a custom page spec against a document of `total_pages` pages.
pub fn resolve_custom_pages(spec: &str, total_pages: u32) -> Vec<u32> {
    let cleaned: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    let total = i64::from(total_pages);
    let mut pages: Vec<u32> = Vec::new();

    for token in cleaned.split(',').filter(|t| !t.is_empty()) {
        if let Some((start, end)) = token.split_once('-') {
            let (Ok(start), Ok(end)) = (start.parse::<i64>(), end.parse::<i64>()) else {
                continue;
            };
            let start = start.max(1);
            let end = end.min(total);
            // Both ends are clamped into 1..=total, so the cast is lossless.
            pages.extend((start..=end).map(|p| p as u32));
        } else if let Ok(page) = token.parse::<i64>() {
            if (1..=total).contains(&page) {
                pages.push(page as u32);
            }
        }
    }

    pages.sort_unstable();
    pages.dedup();
    pages
}

/// Resolve a selection mode to 1-based page numbers.
///
/// `None` behaves like [`PageSelectionMode::FirstOnly`].
pub fn resolve_pages(mode: Option<&PageSelectionMode>, total_pages: u32) -> Vec<u32> {
    if total_pages == 0 {
        return Vec::new();
    }
    match mode.unwrap_or(&PageSelectionMode::FirstOnly) {
        PageSelectionMode::FirstOnly => vec![1],
        PageSelectionMode::LastOnly => vec![total_pages],
        PageSelectionMode::All => (1..=total_pages).collect(),
        PageSelectionMode::Custom(spec) => resolve_custom_pages(spec, total_pages),
    }
}

/// 0-based index of the page to preview: the first selected page.
///
/// Falls back to the first page when nothing valid is selected.
pub fn preview_page_index(mode: Option<&PageSelectionMode>, total_pages: u32) -> usize {
    match resolve_pages(mode, total_pages).first() {
        Some(&page) if page <= total_pages => (page - 1) as usize,
        _ => 0,
    }
}

/// Human-readable description of the pages that will be signed.
pub fn describe_selection(mode: Option<&PageSelectionMode>, total_pages: u32) -> String {
    match mode.unwrap_or(&PageSelectionMode::FirstOnly) {
        PageSelectionMode::FirstOnly => "the first page".to_string(),
        PageSelectionMode::LastOnly => format!("the last page ({total_pages})"),
        PageSelectionMode::All => format!("all pages (1 to {total_pages})"),
        PageSelectionMode::Custom(spec) => match resolve_custom_pages(spec, total_pages).as_slice() {
            [] => "no valid page".to_string(),
            [single] => format!("page {single}"),
            many => format!("pages {}", join_pages(many)),
        },
    }
}

/// Human-readable description of the previewed page.
pub fn describe_preview(mode: Option<&PageSelectionMode>, total_pages: u32) -> String {
    let info = match mode.unwrap_or(&PageSelectionMode::FirstOnly) {
        PageSelectionMode::FirstOnly => "Page 1".to_string(),
        PageSelectionMode::LastOnly => format!("Page {total_pages} (last)"),
        PageSelectionMode::All => "Page 1 (signature on every page)".to_string(),
        PageSelectionMode::Custom(spec) => match resolve_custom_pages(spec, total_pages).as_slice() {
            [] => "Page 1 (no valid page specified)".to_string(),
            [single] => format!("Page {single}"),
            many => format!(
                "Page {} (first of selected pages: {})",
                many[0],
                join_pages(many)
            ),
        },
    };
    if total_pages == 0 {
        "Page 1 (requested page not found)".to_string()
    } else {
        info
    }
}

fn join_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
