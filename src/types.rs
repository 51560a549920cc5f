use std::borrow::Cow;

use rusqlite::types::ValueRef;

use crate::error::SqError;

/// One column of a fetched row, as bytes.
///
/// The engine's storage classes are flattened the way `sqlite3_column_blob`
/// would see them: integers and reals become their text form, text and blobs
/// are passed through untouched (they may hold any byte, NUL included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    Null,
    Bytes(Cow<'a, [u8]>),
}

impl ColumnValue<'_> {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Bytes(bytes) => Some(bytes),
        }
    }
}

impl<'a> From<ValueRef<'a>> for ColumnValue<'a> {
    fn from(value: ValueRef<'a>) -> Self {
        match value {
            ValueRef::Null => ColumnValue::Null,
            ValueRef::Integer(i) => ColumnValue::Bytes(Cow::Owned(i.to_string().into_bytes())),
            ValueRef::Real(f) => ColumnValue::Bytes(Cow::Owned(format_real(f).into_bytes())),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => ColumnValue::Bytes(Cow::Borrowed(bytes)),
        }
    }
}

/// Extract every column of a `SQLite` row.
///
/// # Errors
///
/// Returns `SqError::Engine` if a column cannot be read.
pub fn extract_row<'r>(
    row: &'r rusqlite::Row<'_>,
    column_count: usize,
) -> Result<Vec<ColumnValue<'r>>, SqError> {
    let mut values = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        let value = row
            .get_ref(idx)
            .map_err(|e| SqError::engine(format!("cannot fetch column {idx}"), &e))?;
        values.push(ColumnValue::from(value));
    }
    Ok(values)
}

/// Render a real the way `SQLite` converts one to text (`%!.15g`).
#[must_use]
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }

    // 15 significant digits, exponent normalised to one leading digit
    let sci = format!("{value:.14e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if mantissa.starts_with('-') { "-" } else { "" };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    if (-4..15).contains(&exp) {
        let (int_part, frac_part) = if exp >= 0 {
            let split = (exp as usize) + 1;
            (digits[..split].to_string(), digits[split..].to_string())
        } else {
            let zeros = "0".repeat((-exp - 1) as usize);
            ("0".to_string(), format!("{zeros}{digits}"))
        };
        let frac = frac_part.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        format!("{sign}{int_part}.{frac}")
    } else {
        let rest = digits[1..].trim_end_matches('0');
        let rest = if rest.is_empty() { "0" } else { rest };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{}.{rest}e{exp_sign}{:02}", &digits[..1], exp.abs())
    }
}
