pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

/// Split the remainder of a descriptor marker into its `_`-separated
/// segments. Only the first two carry meaning; the rest is a disambiguator.
pub(super) fn segments(rest: &str) -> (Option<&str>, Option<&str>) {
    let Some(rest) = rest.strip_prefix('_') else {
        return (None, None);
    };
    let mut parts = rest.splitn(3, '_');
    let limit = parts.next();
    let term = parts.next();
    (limit, term)
}

/// Whitespace as C's `isspace` sees it in the "C" locale.
pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}
