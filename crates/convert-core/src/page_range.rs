//! Page range resolution for split, rotate and extraction operations
//!
//! Users write 1-based expressions like `"1, 3, 5-7"`. Resolution turns them
//! into zero-based page indices for a document with a known page count.
//! Unlike a set-based parser, the selection keeps the order the expression
//! implies: `"3,1-2"` selects the third page first.

use crate::error::{ConvertError, Result};

/// One comma-separated piece of a page range expression (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    /// A single page like `"5"`
    Single(u64),
    /// An inclusive range like `"5-7"`
    Range { start: u64, end: u64 },
}

impl RangeToken {
    /// Zero-based indices selected by this token, clipped to `0..total_pages`
    fn indices(self, total_pages: usize) -> impl Iterator<Item = usize> {
        let (start, end) = match self {
            RangeToken::Single(page) => (page, page),
            RangeToken::Range { start, end } => (start, end),
        };

        // Page 0 does not exist, so a start of 0 clips to the first page and
        // an end of 0 selects nothing. Clipping both edges is the same as
        // checking each emitted page, without walking huge out-of-range spans.
        let first = start.max(1) - 1;
        let last = end.min(total_pages as u64);
        (first..last).map(|i| i as usize)
    }
}

/// Ordered, zero-based page indices resolved against a page count
///
/// Indices are always in bounds. They are neither sorted nor deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection(Vec<usize>);

impl PageSelection {
    /// Every page of a document, in document order
    pub fn all(total_pages: usize) -> Self {
        Self((0..total_pages).collect())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }
}

/// Resolve a page range expression against a document's page count.
///
/// * An absent or blank expression selects the first page.
/// * A document with no pages always yields an empty selection.
/// * Out-of-bounds parts of a token are dropped, not reported.
/// * A token with non-numeric text rejects the whole expression.
///
/// # Examples
/// ```
/// use convert_core::page_range::resolve;
///
/// let selection = resolve(Some("2,4-6,11"), 10).unwrap();
/// assert_eq!(selection.indices(), &[1, 3, 4, 5]);
///
/// let selection = resolve(Some("3,1-2"), 5).unwrap();
/// assert_eq!(selection.indices(), &[2, 0, 1]);
///
/// assert_eq!(resolve(None, 4).unwrap().indices(), &[0]);
/// assert!(resolve(Some("1,x"), 4).is_err());
/// ```
pub fn resolve(expression: Option<&str>, total_pages: usize) -> Result<PageSelection> {
    if total_pages == 0 {
        return Ok(PageSelection::default());
    }

    let expression = match expression.map(str::trim) {
        Some(expr) if !expr.is_empty() => expr,
        _ => return Ok(PageSelection(vec![0])),
    };

    let indices = parse_tokens(expression)?
        .into_iter()
        .flat_map(|token| token.indices(total_pages))
        .collect();

    Ok(PageSelection(indices))
}

/// Split an expression into tokens without applying any page bounds.
///
/// Empty pieces between commas are skipped. Whitespace around numbers and
/// around the hyphen is ignored.
pub fn parse_tokens(expression: &str) -> Result<Vec<RangeToken>> {
    let mut tokens = Vec::new();

    for part in expression.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let token = match part.split_once('-') {
            Some((start, end)) => RangeToken::Range {
                start: parse_page_number(start, part)?,
                end: parse_page_number(end, part)?,
            },
            None => RangeToken::Single(parse_page_number(part, part)?),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parse one side of a token: ASCII digits only, no sign
fn parse_page_number(text: &str, token: &str) -> Result<u64> {
    let text = text.trim();
    let digits = !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit());
    digits.then(|| text.parse::<u64>()).and_then(|r| r.ok()).ok_or_else(|| {
        ConvertError::InvalidRange(format!(
            "'{}' is not a page number (in token '{}')",
            text, token
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn indices(expr: Option<&str>, total: usize) -> Vec<usize> {
        resolve(expr, total).unwrap().into_vec()
    }

    #[test]
    fn test_absent_expression_selects_first_page() {
        assert_eq!(indices(None, 10), vec![0]);
    }

    #[test]
    fn test_blank_expression_selects_first_page() {
        assert_eq!(indices(Some(""), 3), vec![0]);
        assert_eq!(indices(Some("   "), 3), vec![0]);
    }

    #[test]
    fn test_zero_pages_is_always_empty() {
        assert!(indices(None, 0).is_empty());
        assert!(indices(Some("1-5"), 0).is_empty());
        assert!(indices(Some("garbage"), 0).is_empty());
    }

    #[test]
    fn test_single_page() {
        assert_eq!(indices(Some("5"), 10), vec![4]);
    }

    #[test]
    fn test_page_range() {
        assert_eq!(indices(Some("2-4"), 10), vec![1, 2, 3]);
    }

    #[test]
    fn test_range_clipped_to_document() {
        assert_eq!(indices(Some("1-100"), 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_range_starting_at_zero_emits_only_valid_indices() {
        assert_eq!(indices(Some("0-3"), 10), vec![0, 1, 2]);
    }

    #[test]
    fn test_token_order_preserved() {
        assert_eq!(indices(Some("3,1"), 5), vec![2, 0]);
        assert_eq!(indices(Some("3,1-2"), 5), vec![2, 0, 1]);
    }

    #[test]
    fn test_duplicates_kept() {
        assert_eq!(indices(Some("2, 2, 1-2"), 5), vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_out_of_range_single_dropped() {
        assert_eq!(indices(Some("2,4-6,11"), 10), vec![1, 3, 4, 5]);
        assert_eq!(indices(Some("0"), 10), Vec::<usize>::new());
    }

    #[test]
    fn test_reversed_range_contributes_nothing() {
        assert_eq!(indices(Some("5-3"), 10), Vec::<usize>::new());
        assert_eq!(indices(Some("5-3, 1"), 10), vec![0]);
    }

    #[test]
    fn test_whitespace_and_empty_tokens() {
        assert_eq!(indices(Some("  1 , 3 ,, "), 10), vec![0, 2]);
        assert_eq!(indices(Some(" 1 - 3 "), 10), vec![0, 1, 2]);
    }

    #[test]
    fn test_non_numeric_token_rejected() {
        let err = resolve(Some("1,abc"), 10).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidRange(_)));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_half_open_ranges_rejected() {
        assert!(resolve(Some("-3"), 10).is_err());
        assert!(resolve(Some("2-"), 10).is_err());
        assert!(resolve(Some("1-2-3"), 10).is_err());
    }

    #[test]
    fn test_huge_range_does_not_walk_every_number() {
        let selection = resolve(Some("1-9000000000000000000"), 3).unwrap();
        assert_eq!(selection.indices(), &[0, 1, 2]);
    }

    #[test]
    fn test_parse_tokens() {
        let tokens = parse_tokens("1, 3-5").unwrap();
        assert_eq!(
            tokens,
            vec![
                RangeToken::Single(1),
                RangeToken::Range { start: 3, end: 5 }
            ]
        );
    }

    #[test]
    fn test_signed_numbers_rejected() {
        for expr in ["1--5", "+3", "1-+2", "1--9223372036854775808", "-0"] {
            let err = resolve(Some(expr), 5).unwrap_err();
            assert!(matches!(err, ConvertError::InvalidRange(_)), "{}", expr);
        }
    }

    #[test]
    fn test_numbers_beyond_u64_rejected() {
        assert!(resolve(Some("1-99999999999999999999999"), 5).is_err());
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let max = u64::MAX.to_string();
        assert_eq!(indices(Some(&max), 5), Vec::<usize>::new());
        assert_eq!(indices(Some(&format!("{}-1", max)), 5), Vec::<usize>::new());
        assert_eq!(indices(Some(&format!("0-{}", max)), 3), vec![0, 1, 2]);
        assert_eq!(indices(Some("0-0"), 3), Vec::<usize>::new());
    }
}
