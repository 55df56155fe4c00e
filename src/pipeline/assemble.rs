//! Order-preserving reassembly of fanned-out page results.

use crate::config::{OutputFormat, PageSeparator};
use crate::error::PlumaError;
use crate::output::PageResult;

/// Place each `(slot, value)` at its slot.
///
/// `completed` may arrive in any order; the returned vector is in slot order.
/// Every slot in `0..len` must be filled exactly once.
pub fn reassemble<T>(completed: Vec<(usize, T)>, len: usize) -> Result<Vec<T>, PlumaError> {
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(len).collect();

    for (slot, value) in completed {
        let cell = slots.get_mut(slot).ok_or_else(|| {
            PlumaError::Internal(format!("result slot {slot} out of range (expected < {len})"))
        })?;
        if cell.replace(value).is_some() {
            return Err(PlumaError::Internal(format!("result slot {slot} filled twice")));
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(slot, value)| {
            value.ok_or_else(|| PlumaError::Internal(format!("result slot {slot} never filled")))
        })
        .collect()
}

/// Join the text of successful pages, in order, with `separator` between them.
///
/// Failed pages are skipped; the separator before a page carries that page's
/// number.
pub fn join_pages(pages: &[PageResult], separator: &PageSeparator, format: OutputFormat) -> String {
    let mut out = String::new();
    for page in pages.iter().filter(|p| p.is_ok()) {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(&separator.render(page.page_num, format));
        }
        out.push_str(text);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
