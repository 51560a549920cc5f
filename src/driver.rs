//! Statement loop.
//!
//! The script is prepared one statement at a time. Each statement is bound
//! and executed once, or in looping mode once per round of descriptor fields
//! until its streams run dry (possibly zero times).

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection, Statement};

use crate::binder::bind_parameters;
use crate::config::{Config, OutputOptions};
use crate::encoder::RowEncoder;
use crate::error::SqError;
use crate::reader::Descriptors;
use crate::types::extract_row;

/// Counters for a finished script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub statements: u64,
    pub executions: u64,
    pub rows: u64,
}

/// Everything a run needs besides the connection.
struct Runner<W: Write> {
    args: Vec<OsString>,
    next_arg: usize,
    descriptors: Descriptors,
    encoder: RowEncoder<W>,
    looping: bool,
    busy_timeout: Duration,
    summary: RunSummary,
}

impl<W: Write> Runner<W> {
    fn run_statement(&mut self, conn: &Connection, stmt: &mut Statement<'_>) -> Result<(), SqError> {
        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        let start = self.next_arg;
        let mut executions = 0u64;

        loop {
            let report = bind_parameters(stmt, &self.args, start, &mut self.descriptors)?;
            self.next_arg = report.next_arg;
            if self.looping && report.exhausted() {
                break;
            }

            conn.busy_timeout(self.busy_timeout).map_err(|e| {
                SqError::engine(
                    format!("cannot set timeout to {}", self.busy_timeout.as_millis()),
                    &e,
                )
            })?;
            self.execute(stmt, &column_names)?;
            executions += 1;

            if !(self.looping && report.descriptor_markers > 0) {
                break;
            }
        }

        tracing::debug!(executions, sql = ?stmt.expanded_sql(), "statement done");
        self.summary.statements += 1;
        self.summary.executions += executions;
        Ok(())
    }

    fn execute(&mut self, stmt: &mut Statement<'_>, column_names: &[String]) -> Result<(), SqError> {
        let step_error = |stmt: &Statement<'_>, e: &rusqlite::Error| {
            SqError::engine(format!("cannot step statement: {}", statement_text(stmt)), e)
        };

        let mut rows = stmt.raw_query();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    drop(rows);
                    return Err(step_error(stmt, &e));
                }
            };
            let values = extract_row(row, column_names.len())?;
            self.summary.rows += 1;
            self.encoder
                .render_row(self.summary.rows, column_names, &values)?;
        }
        Ok(())
    }
}

/// Statement text with the current bindings substituted.
fn statement_text(stmt: &Statement<'_>) -> String {
    stmt.expanded_sql().unwrap_or_default()
}

/// The part of the script the engine refused, falling back to all of it.
fn unparsed_text<'a>(err: &'a rusqlite::Error, script: &'a str) -> &'a str {
    match err {
        #[cfg(feature = "bundled")]
        rusqlite::Error::SqlInputError { sql, .. } => sql.trim_start(),
        _ => script,
    }
}

/// Process-wide state: the database handle, descriptor buffers, output and
/// the positional argument cursor.
pub struct Session<W: Write> {
    conn: Connection,
    database: PathBuf,
    runner: Runner<W>,
}

impl<W: Write> Session<W> {
    /// Open the configured database and write rows to `out`.
    ///
    /// # Errors
    ///
    /// Returns `SqError::Engine` if the database cannot be opened.
    pub fn open(config: &Config, out: W) -> Result<Self, SqError> {
        let conn = Connection::open(&config.database).map_err(|e| {
            SqError::engine(format!("cannot open db {}", config.database.display()), &e)
        })?;
        Ok(Self::new(conn, config, out).with_database(&config.database))
    }

    /// Wrap an already open connection.
    pub fn new(conn: Connection, config: &Config, out: W) -> Self {
        Self::with_options(
            conn,
            config.output.clone(),
            config.args.clone(),
            out,
        )
        .with_looping(config.looping)
        .with_busy_timeout(config.busy_timeout())
    }

    pub fn with_options(conn: Connection, output: OutputOptions, args: Vec<OsString>, out: W) -> Self {
        Self {
            conn,
            database: PathBuf::from(":memory:"),
            runner: Runner {
                args,
                next_arg: 0,
                descriptors: Descriptors::new(),
                encoder: RowEncoder::new(out, output),
                looping: false,
                busy_timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
                summary: RunSummary::default(),
            },
        }
    }

    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.runner.looping = looping;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.runner.busy_timeout = timeout;
        self
    }

    fn with_database(mut self, database: &Path) -> Self {
        self.database = database.to_path_buf();
        self
    }

    /// Descriptor table, e.g. to attach in-memory streams.
    pub fn descriptors_mut(&mut self) -> &mut Descriptors {
        &mut self.runner.descriptors
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.runner.summary
    }

    /// Run every statement of `script` in order.
    ///
    /// The next statement is only prepared once the previous one finished, so
    /// a failure leaves the rest of the script untouched.
    ///
    /// # Errors
    ///
    /// Returns the first error hit; nothing is retried.
    pub fn run_script(&mut self, script: &str) -> Result<RunSummary, SqError> {
        let mut batch = Batch::new(&self.conn, script);
        loop {
            let next = batch.next().map_err(|e| {
                SqError::engine(format!("invalid sql: {}", unparsed_text(&e, script)), &e)
            })?;
            let Some(mut stmt) = next else {
                break;
            };
            self.runner.run_statement(&self.conn, &mut stmt)?;
            let sql = statement_text(&stmt);
            stmt.finalize()
                .map_err(|e| SqError::engine(format!("cannot finalize statement: {sql}"), &e))?;
        }
        Ok(self.runner.summary)
    }

    /// Flush the output and close the database.
    ///
    /// # Errors
    ///
    /// Returns `SqError::Io` if flushing fails and `SqError::Engine` if the
    /// database does not close cleanly.
    pub fn close(self) -> Result<W, SqError> {
        let out = self.runner.encoder.finish()?;
        let database = self.database;
        self.conn.close().map_err(|(_, e)| {
            SqError::engine(format!("cannot close db {}", database.display()), &e)
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_text_shows_bound_values() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("select ?1 || 'x'").unwrap();
        stmt.raw_bind_parameter(1, "abc").unwrap();
        assert_eq!(statement_text(&stmt), "select 'abc' || 'x'");
    }

    #[cfg(feature = "bundled")]
    #[test]
    fn refused_text_starts_at_the_failing_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let script = "select 1; selec 2";
        let mut batch = Batch::new(&conn, script);
        assert!(batch.next().unwrap().is_some());
        let err = batch.next().unwrap_err();
        assert_eq!(unparsed_text(&err, script), "selec 2");
    }
}
