//! Bind marker classification.
//!
//! `SQLite` hands us the marker names verbatim (`?`, `?3`, `:name`, `$NAME`,
//! `@name`). The first character decides where the value comes from, and a
//! `:fd<N>...` name is a request to read the value from a file descriptor:
//!
//! ```text
//! :fd<N>[_<MAX>[t]][_<TERM>][_<anything>]
//! ```
//!
//! * `MAX`: byte limit, empty or `0` for none. A `t` right after it trims
//!   whitespace around the value.
//! * `TERM`: empty for none, a decimal byte value `0`..=`255`, or `w` for any
//!   whitespace.
//! * Whatever follows a third `_` is ignored. `SQLite` folds identically named
//!   markers into one parameter, so `:fd0__10_a, :fd0__10_b` reads two lines.

mod scanner;

pub(crate) use scanner::is_space;
use scanner::{scan_digits, segments};

use crate::error::SqError;

/// Where a field read from a descriptor ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Read until EOF (or the byte limit).
    None,
    /// Stop at the first whitespace byte.
    Whitespace,
    /// Stop at this exact byte.
    Byte(u8),
}

impl Terminator {
    #[must_use]
    pub fn matches(self, b: u8) -> bool {
        match self {
            Terminator::None => false,
            Terminator::Whitespace => is_space(b),
            Terminator::Byte(t) => t == b,
        }
    }
}

/// Parsed form of a `:fd...` marker; governs one read per bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub fd: usize,
    /// Maximum field length in bytes, `0` for unbounded.
    pub max: usize,
    pub trim: bool,
    pub terminator: Terminator,
}

impl DescriptorSpec {
    /// Unbounded, untrimmed read of the whole stream.
    #[must_use]
    pub fn whole(fd: usize) -> Self {
        Self {
            fd,
            max: 0,
            trim: false,
            terminator: Terminator::None,
        }
    }

    #[must_use]
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    #[must_use]
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Parse a marker name, leading `:` included.
    ///
    /// Returns `Ok(None)` if the name is not a descriptor marker at all.
    ///
    /// # Errors
    ///
    /// Returns `SqError::MalformedMarker` if the name starts like a
    /// descriptor marker (`:fd` and a digit) but does not follow the grammar.
    pub fn parse(name: &str) -> Result<Option<Self>, SqError> {
        let Some(body) = name.strip_prefix(":fd") else {
            return Ok(None);
        };
        let bytes = body.as_bytes();
        let Some((end, digits)) = scan_digits(bytes, 0) else {
            return Ok(None);
        };
        let fd = digits
            .parse::<usize>()
            .map_err(|_| SqError::malformed(name, "descriptor number out of range"))?;

        let rest = &body[end..];
        if !rest.is_empty() && !rest.starts_with('_') {
            return Err(SqError::malformed(
                name,
                format!("unexpected {rest:?} after descriptor number"),
            ));
        }

        let mut spec = Self::whole(fd);
        let (limit, term) = segments(rest);
        if let Some(limit) = limit {
            let (max, trim) = parse_limit(name, limit)?;
            spec = spec.with_max(max).with_trim(trim);
        }
        if let Some(term) = term {
            spec = spec.with_terminator(parse_terminator(name, term)?);
        }
        Ok(Some(spec))
    }
}

fn parse_limit(name: &str, limit: &str) -> Result<(usize, bool), SqError> {
    let (digits, trim) = match limit.strip_suffix('t') {
        Some(digits) => (digits, true),
        None => (limit, false),
    };
    if digits.is_empty() {
        return Ok((0, trim));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SqError::malformed(name, format!("bad length {limit:?}")));
    }
    let max = digits
        .parse::<usize>()
        .map_err(|_| SqError::malformed(name, format!("length {digits} out of range")))?;
    Ok((max, trim))
}

fn parse_terminator(name: &str, term: &str) -> Result<Terminator, SqError> {
    match term {
        "" => Ok(Terminator::None),
        "w" => Ok(Terminator::Whitespace),
        digits if digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse::<u8>()
            .map(Terminator::Byte)
            .map_err(|_| SqError::malformed(name, format!("terminator {digits} is not a byte"))),
        other => Err(SqError::malformed(
            name,
            format!("bad terminator {other:?}"),
        )),
    }
}

/// Source of one bind marker's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSource<'a> {
    /// Next command line argument.
    Positional,
    /// Environment variable of this name; unset binds NULL.
    Environment(&'a str),
    /// Next field of a file descriptor, bound as a blob.
    DescriptorStream(DescriptorSpec),
}

impl<'a> BindSource<'a> {
    /// Classify a marker by the name the engine reports for it.
    ///
    /// # Errors
    ///
    /// Returns `SqError::MalformedMarker` for a broken `:fd` marker and
    /// `SqError::Internal` for a marker shape we do not handle.
    pub fn classify(name: Option<&'a str>) -> Result<Self, SqError> {
        let name = name.unwrap_or("");
        match name.as_bytes().first() {
            None | Some(b'?') => Ok(BindSource::Positional),
            Some(b':') => Ok(match DescriptorSpec::parse(name)? {
                Some(spec) => BindSource::DescriptorStream(spec),
                None => BindSource::Positional,
            }),
            Some(b'$') => Ok(BindSource::Environment(&name[1..])),
            Some(_) => Err(SqError::Internal(format!("unsupported bind marker {name}"))),
        }
    }
}
