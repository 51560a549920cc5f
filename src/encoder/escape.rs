use std::io::{self, Write};

use crate::config::EscapeStyle;
use crate::marker::is_space;

/// Whether a value can be written as-is.
///
/// The shell drops whitespace around words, so leading or trailing bytes up
/// to space disqualify a value even though embedded spaces are fine.
#[must_use]
pub fn is_simple(value: &[u8]) -> bool {
    let (Some(&first), Some(&last)) = (value.first(), value.last()) else {
        return true;
    };
    if first <= 0x20 || last <= 0x20 {
        return false;
    }
    !value.iter().any(|&b| b < 0x20 || (0x7f..0xa0).contains(&b))
}

/// Write `value` escaped so the shell can turn it back into the exact bytes.
///
/// `Octal` output is meant for `printf '%b'` or `echo -e`, which read `\0`
/// plus up to three octal digits, so every escape is written as `\0NNN`.
/// `Ansi` output is the body of a bash `$'...'` string, where `\NNN` is
/// at most three digits long.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_escaped(out: &mut impl Write, value: &[u8], style: EscapeStyle) -> io::Result<()> {
    write_escaped_guarding(out, value, style, &[])
}

/// Like [`write_escaped`], additionally escaping every byte in `guard`
/// (used to keep field separators out of field values).
///
/// # Errors
///
/// Propagates write failures.
pub fn write_escaped_guarding(
    out: &mut impl Write,
    value: &[u8],
    style: EscapeStyle,
    guard: &[u8],
) -> io::Result<()> {
    let mut plain = 0;
    for (idx, &b) in value.iter().enumerate() {
        let escape: Option<&[u8]> = match style {
            _ if guard.contains(&b) => Some(b""),
            EscapeStyle::Octal if b <= 0x20 || (0x7f..0xa0).contains(&b) || b == b'\\' => Some(b""),
            EscapeStyle::Ansi if b < 33 || b >= 127 => Some(b""),
            EscapeStyle::Ansi if b == b'\\' => Some(b"\\\\"),
            EscapeStyle::Ansi if b == b'\'' => Some(b"\\'"),
            _ => None,
        };
        let Some(replacement) = escape else {
            continue;
        };
        out.write_all(&value[plain..idx])?;
        if !replacement.is_empty() {
            out.write_all(replacement)?;
        } else if style == EscapeStyle::Octal {
            write!(out, "\\0{b:03o}")?;
        } else {
            write!(out, "\\{b:03o}")?;
        }
        plain = idx + 1;
    }
    out.write_all(&value[plain..])
}

/// Column names are quoted by backslash-prefixing whitespace and backslashes.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_quoted_name(out: &mut impl Write, name: &[u8]) -> io::Result<()> {
    for &b in name {
        if is_space(b) || b == b'\\' {
            out.write_all(b"\\")?;
        }
        out.write_all(&[b])?;
    }
    Ok(())
}
