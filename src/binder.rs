use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

use rusqlite::Statement;
use rusqlite::types::{Null, ToSqlOutput, ValueRef};

use crate::error::SqError;
use crate::marker::BindSource;
use crate::reader::Descriptors;

/// Outcome of binding every marker of a statement once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindReport {
    /// Markers fed from a file descriptor.
    pub descriptor_markers: usize,
    /// Descriptor markers that got a field; the rest hit EOF.
    pub fields_read: usize,
    /// Positional cursor after the last positional marker.
    pub next_arg: usize,
}

impl BindReport {
    /// Every descriptor stream of the statement came up empty.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.descriptor_markers > 0 && self.fields_read == 0
    }
}

/// Bind markers `1..=n` of `stmt`, positional ones from `args[start..]`.
///
/// Arguments and environment values are bound as text, descriptor fields as
/// blobs. An exhausted descriptor binds an empty blob.
///
/// # Errors
///
/// Returns `SqError::Usage` when the command line runs out of arguments,
/// `SqError::Engine` if the engine rejects a value, and whatever the marker
/// classification or the descriptor read reports.
pub fn bind_parameters(
    stmt: &mut Statement<'_>,
    args: &[OsString],
    start: usize,
    descriptors: &mut Descriptors,
) -> Result<BindReport, SqError> {
    let mut report = BindReport {
        next_arg: start,
        ..BindReport::default()
    };

    for idx in 1..=stmt.parameter_count() {
        let name = stmt.parameter_name(idx).map(str::to_owned);
        let label = name.as_deref().unwrap_or("?");
        let bound = match BindSource::classify(name.as_deref())? {
            BindSource::Positional => {
                let Some(arg) = args.get(report.next_arg) else {
                    // 1-based like argv, after database and script
                    return Err(SqError::Usage(format!(
                        "missing argument on commandline: {}",
                        report.next_arg + 3
                    )));
                };
                report.next_arg += 1;
                let bytes = arg.as_bytes();
                tracing::debug!(ordinal = idx, name = label, value = %arg.to_string_lossy(), "bind argument");
                stmt.raw_bind_parameter(idx, ToSqlOutput::Borrowed(ValueRef::Text(bytes)))
            }
            BindSource::Environment(var) => match std::env::var_os(var) {
                Some(value) => {
                    tracing::debug!(ordinal = idx, name = label, value = %value.to_string_lossy(), "bind environment");
                    stmt.raw_bind_parameter(idx, ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())))
                }
                None => {
                    tracing::debug!(ordinal = idx, name = label, "bind environment: unset, NULL");
                    stmt.raw_bind_parameter(idx, Null)
                }
            },
            BindSource::DescriptorStream(spec) => {
                report.descriptor_markers += 1;
                let field = descriptors.read_field(&spec)?;
                if field.is_some() {
                    report.fields_read += 1;
                }
                let bytes = field.unwrap_or_default();
                tracing::debug!(ordinal = idx, name = label, bytes = bytes.len(), eof = field.is_none(), "bind descriptor");
                stmt.raw_bind_parameter(idx, ToSqlOutput::Borrowed(ValueRef::Blob(bytes)))
            }
        };
        bound.map_err(|e| SqError::engine(format!("cannot bind parm {idx}: {label}"), &e))?;
    }

    Ok(report)
}
