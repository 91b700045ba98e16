//! String splicing helpers.

use std::ops::Range;

/// Replace `range` of `input` with `replacement`.
///
/// The range is clamped to the string, so an out-of-bounds start appends and an
/// overlong range cuts to the end.
///
/// # Examples
///
/// ```
/// use rewrite_engine::splice;
///
/// let mut s = String::from("<a>1</a><drop/>");
/// splice(&mut s, 8..15, "");
/// assert_eq!(s, "<a>1</a>");
/// ```
pub fn splice(input: &mut String, range: Range<usize>, replacement: &str) {
    let start = range.start.min(input.len());
    let end = range.end.clamp(start, input.len());
    input.replace_range(start..end, replacement);
}

/// End offset of an element after its inner content changed length.
///
/// `end` is the original inclusive end offset; `before` and `after` are the
/// inner content lengths before and after rewriting.
#[must_use]
pub fn shift_end(end: usize, before: usize, after: usize) -> usize {
    (end + after).saturating_sub(before)
}
