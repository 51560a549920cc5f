//! Row serialization.
//!
//! Tagged output (the default) is one line per column,
//! `<row> <column> <type> <value>`, meant for `while read -r row col type data`.
//! Type `t` is literal text, `e` needs unescaping, `0` is NULL.

pub mod escape;

use std::io::{self, Write};

use crate::config::{EscapeStyle, Layout, OutputOptions};
use crate::error::SqError;
use crate::types::ColumnValue;

use escape::{is_simple, write_escaped, write_escaped_guarding, write_quoted_name};

pub struct RowEncoder<W: Write> {
    out: W,
    options: OutputOptions,
    /// Raw newline mode separates values, so the very first one goes bare.
    wrote_raw_value: bool,
}

impl<W: Write> RowEncoder<W> {
    pub fn new(out: W, options: OutputOptions) -> Self {
        Self {
            out,
            options,
            wrote_raw_value: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    /// Write one row.
    ///
    /// # Errors
    ///
    /// Returns `SqError::Io` if the output cannot be written.
    pub fn render_row(
        &mut self,
        row_number: u64,
        column_names: &[String],
        values: &[ColumnValue<'_>],
    ) -> Result<(), SqError> {
        self.write_row(row_number, column_names, values)
            .map_err(|e| SqError::io("cannot write to stdout", e))?;
        if self.options.unbuffered {
            self.flush()?;
        }
        Ok(())
    }

    fn write_row(
        &mut self,
        row_number: u64,
        column_names: &[String],
        values: &[ColumnValue<'_>],
    ) -> io::Result<()> {
        let Self {
            out,
            options,
            wrote_raw_value,
        } = self;

        if let Some(begin) = &options.row_begin {
            out.write_all(begin)?;
        }
        match &options.layout {
            Layout::Raw => {
                for value in values {
                    let bytes = value.as_bytes().unwrap_or_default();
                    if options.nul_terminated {
                        out.write_all(bytes)?;
                        out.write_all(b"\0")?;
                        continue;
                    }
                    if *wrote_raw_value {
                        out.write_all(b"\n")?;
                    }
                    *wrote_raw_value = true;
                    out.write_all(bytes)?;
                }
            }
            Layout::Separated(separators) => {
                let guard: Vec<u8> = separators
                    .iter()
                    .flat_map(|sep| sep.bytes())
                    .chain([b'\\'])
                    .collect();
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 && !separators.is_empty() {
                        let sep = &separators[(idx - 1) % separators.len()];
                        out.write_all(sep.as_bytes())?;
                    }
                    if let Some(bytes) = value.as_bytes() {
                        write_field(out, bytes, options.escape, &guard)?;
                    }
                }
                out.write_all(&[options.terminator()])?;
            }
            Layout::Tagged => {
                for (name, value) in column_names.iter().zip(values) {
                    write!(out, "{row_number} ")?;
                    write_quoted_name(out, name.as_bytes())?;
                    match value.as_bytes() {
                        None => out.write_all(b" 0")?,
                        Some(bytes) if is_simple(bytes) => {
                            out.write_all(b" t ")?;
                            out.write_all(bytes)?;
                        }
                        Some(bytes) => {
                            out.write_all(b" e ")?;
                            write_escaped(out, bytes, options.escape)?;
                        }
                    }
                    out.write_all(&[options.terminator()])?;
                }
            }
        }
        if let Some(end) = &options.row_end {
            out.write_all(end)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SqError::Io` if flushing fails.
    pub fn flush(&mut self) -> Result<(), SqError> {
        self.out
            .flush()
            .map_err(|e| SqError::io("cannot write to stdout", e))
    }

    /// Flush and hand back the writer.
    ///
    /// # Errors
    ///
    /// Returns `SqError::Io` if flushing fails.
    pub fn finish(mut self) -> Result<W, SqError> {
        self.flush()?;
        Ok(self.out)
    }
}

/// Separated fields are literal only when nothing in them needs unescaping.
fn write_field(out: &mut impl Write, bytes: &[u8], style: EscapeStyle, guard: &[u8]) -> io::Result<()> {
    if is_simple(bytes) && !bytes.iter().any(|b| guard.contains(b)) {
        out.write_all(bytes)
    } else {
        write_escaped_guarding(out, bytes, style, guard)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::escape::tests::{dollar_quote, printf_b};
    use super::*;

    fn text(s: &[u8]) -> ColumnValue<'_> {
        ColumnValue::Bytes(Cow::Borrowed(s))
    }

    fn render(options: OutputOptions, columns: &[&str], rows: Vec<Vec<ColumnValue<'_>>>) -> Vec<u8> {
        let names: Vec<String> = columns.iter().map(ToString::to_string).collect();
        let mut encoder = RowEncoder::new(Vec::new(), options);
        for (idx, values) in rows.iter().enumerate() {
            encoder.render_row(idx as u64 + 1, &names, values).unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn tagged_rows_carry_row_number_name_and_type() {
        let out = render(
            OutputOptions::default(),
            &["a", "my col"],
            vec![
                vec![text(b"1"), text(b"x y")],
                vec![ColumnValue::Null, text(b" pad")],
            ],
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1 a t 1\n1 my\\ col t x y\n2 a 0\n2 my\\ col e \\0040pad\n"
        );
    }

    #[test]
    fn empty_text_is_simple() {
        let out = render(OutputOptions::default(), &["a"], vec![vec![text(b"")]]);
        assert_eq!(out, b"1 a t \n");
    }

    #[test]
    fn tagged_ansi_escapes() {
        let out = render(
            OutputOptions::default().with_escape(EscapeStyle::Ansi),
            &["v"],
            vec![vec![text(b"it's\n")]],
        );
        assert_eq!(out, b"1 v e it\\'s\\012\n");
    }

    #[test]
    fn tagged_nul_terminated_lines() {
        let out = render(
            OutputOptions::default().with_nul(true),
            &["a", "b"],
            vec![vec![text(b"1"), ColumnValue::Null]],
        );
        assert_eq!(out, b"1 a t 1\x001 b 0\0");
    }

    #[test]
    fn raw_values_are_newline_separated_without_trailer() {
        let out = render(
            OutputOptions::default().with_layout(Layout::Raw),
            &["a", "b"],
            vec![
                vec![text(b"x\0y"), ColumnValue::Null],
                vec![text(b"z"), text(b"\xff")],
            ],
        );
        assert_eq!(out, b"x\0y\n\nz\n\xff");
    }

    #[test]
    fn raw_nul_terminates_every_value() {
        let out = render(
            OutputOptions::default().with_layout(Layout::Raw).with_nul(true),
            &["a", "b"],
            vec![vec![text(b"x"), ColumnValue::Null]],
        );
        assert_eq!(out, b"x\0\0");
    }

    #[test]
    fn separated_fields_cycle_separators() {
        let out = render(
            OutputOptions::default().with_layout(Layout::Separated(vec![",".into(), ";".into()])),
            &["a", "b", "c", "d"],
            vec![vec![text(b"1"), text(b"2"), ColumnValue::Null, text(b"4")]],
        );
        assert_eq!(out, b"1,2;,4\n");
    }

    #[test]
    fn separated_fields_escape_clashing_values() {
        let out = render(
            OutputOptions::default()
                .with_layout(Layout::Separated(vec![",".into()]))
                .with_nul(true),
            &["a", "b", "c"],
            vec![vec![text(b"1,5"), text(b"c:\\tmp"), text(b" x")]],
        );
        assert_eq!(out, b"1\\00545,c:\\0134tmp,\\0040x\0");
        let fields: Vec<Vec<u8>> = out[..out.len() - 1]
            .split(|b| *b == b',')
            .map(printf_b)
            .collect();
        assert_eq!(fields, vec![b"1,5".to_vec(), b"c:\\tmp".to_vec(), b" x".to_vec()]);
    }

    #[test]
    fn escaped_payloads_survive_following_digits() {
        let rows = || vec![vec![text(b" 12")], vec![text(b"\x015")]];
        let payloads = |out: Vec<u8>| -> Vec<Vec<u8>> {
            out.split(|b| *b == b'\n')
                .filter(|line| !line.is_empty())
                .map(|line| line.splitn(4, |b| *b == b' ').nth(3).unwrap_or_default().to_vec())
                .collect()
        };

        let tagged = render(OutputOptions::default(), &["v"], rows());
        assert_eq!(tagged, b"1 v e \\004012\n2 v e \\00015\n");
        let decoded: Vec<Vec<u8>> = payloads(tagged).iter().map(|p| printf_b(p)).collect();
        assert_eq!(decoded, vec![b" 12".to_vec(), b"\x015".to_vec()]);

        let ansi = render(
            OutputOptions::default().with_escape(EscapeStyle::Ansi),
            &["v"],
            rows(),
        );
        let decoded: Vec<Vec<u8>> = payloads(ansi).iter().map(|p| dollar_quote(p)).collect();
        assert_eq!(decoded, vec![b" 12".to_vec(), b"\x015".to_vec()]);

        let separated = render(
            OutputOptions::default().with_layout(Layout::Separated(vec![",".into()])),
            &["a", "b"],
            vec![vec![text(b" 12"), text(b"\x015")]],
        );
        assert_eq!(separated, b"\\004012,\\00015\n");
        let fields: Vec<Vec<u8>> = separated[..separated.len() - 1]
            .split(|b| *b == b',')
            .map(printf_b)
            .collect();
        assert_eq!(fields, vec![b" 12".to_vec(), b"\x015".to_vec()]);
    }

    #[test]
    fn row_markers_wrap_each_row() {
        let out = render(
            OutputOptions::default()
                .with_layout(Layout::Separated(vec![" ".into()]))
                .with_row_markers(Some("["), Some("")),
            &["a", "b"],
            vec![vec![text(b"1"), text(b"2")], vec![text(b"3"), text(b"4")]],
        );
        assert_eq!(out, b"[1 2\n\0[3 4\n\0");
    }

    #[test]
    fn write_failures_are_fatal() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut encoder = RowEncoder::new(Full, OutputOptions::default());
        let err = encoder
            .render_row(1, &["a".to_string()], &[text(b"1")])
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot write to stdout: disk full");
    }
}
