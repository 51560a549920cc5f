use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

/// Default busy timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const PARSE_HINT: &str = "\
Bind markers:
  ?  ?N  :name         next argument from the command line
  $NAME                environment variable, NULL if unset
  :fdN[_MAX[t]][_TERM] BLOB read from file descriptor N (0=stdin)
                       MAX  byte limit (empty or 0: none), t trims whitespace
                       TERM byte value 0..255 or w for whitespace (empty: none)
                       a further _suffix is ignored (:fd0__10_a, :fd0__10_b)

Parse the output as follows:
  sqlpipe db 'select * from table' |
  while read -r row col type data
  do case \"$type\" in
  t)  echo \"row=$row col=$col data=$data\";;
  e)  echo -e \"row=$row col=$col data=$data\";;
  0)  echo \"row=$row col=$col NULL\";;
  esac
  done
Real apps use printf '%b' rather than echo -e.";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run SQLite statements with shell friendly output",
    after_help = PARSE_HINT
)]
pub struct Args {
    /// Escape non-simple values for bash $'...' strings
    #[arg(short = 'a', long, conflicts_with = "raw")]
    pub ansi: bool,
    /// Written before the first column of every row (empty: NUL)
    #[arg(short = 'b', long = "begin", value_name = "STR")]
    pub row_begin: Option<String>,
    /// Debug tracing on stderr
    #[arg(short = 'd', long)]
    pub debug: bool,
    /// Written after the last column of every row (empty: NUL)
    #[arg(short = 'e', long = "end", value_name = "STR")]
    pub row_end: Option<String>,
    /// Repeat statements until their :fd streams are exhausted
    #[arg(short = 'l', long = "loop")]
    pub looping: bool,
    /// Terminate records (raw: values) with NUL instead of newline
    #[arg(short = 'n', long)]
    pub nul: bool,
    /// Raw output, values only
    #[arg(short = 'r', long, conflicts_with = "separators")]
    pub raw: bool,
    /// Field separator, give more than once to cycle through them
    #[arg(short = 's', long = "separator", value_name = "SEP")]
    pub separators: Vec<String>,
    /// Busy timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,
    /// Flush stdout after each row
    #[arg(short = 'u', long)]
    pub unbuffered: bool,
    /// Database file
    pub database: PathBuf,
    /// One or more SQL statements
    pub script: String,
    /// Values for positional markers
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<OsString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Layout {
    /// `row column type value` lines.
    Tagged,
    /// Values only.
    Raw,
    /// Values joined by the given separators, cycling.
    Separated(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscapeStyle {
    /// `\NNN` for control, C1, space and backslash.
    Octal,
    /// Body of a bash `$'...'` string.
    Ansi,
}

/// How rows are written; fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputOptions {
    pub layout: Layout,
    pub escape: EscapeStyle,
    /// Ends a record (raw mode: a value).
    pub nul_terminated: bool,
    pub row_begin: Option<Vec<u8>>,
    pub row_end: Option<Vec<u8>>,
    pub unbuffered: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            layout: Layout::Tagged,
            escape: EscapeStyle::Octal,
            nul_terminated: false,
            row_begin: None,
            row_end: None,
            unbuffered: false,
        }
    }
}

impl OutputOptions {
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_escape(mut self, escape: EscapeStyle) -> Self {
        self.escape = escape;
        self
    }

    #[must_use]
    pub fn with_nul(mut self, nul_terminated: bool) -> Self {
        self.nul_terminated = nul_terminated;
        self
    }

    #[must_use]
    pub fn with_row_markers(mut self, begin: Option<&str>, end: Option<&str>) -> Self {
        self.row_begin = begin.map(marker_bytes);
        self.row_end = end.map(marker_bytes);
        self
    }

    #[must_use]
    pub fn with_unbuffered(mut self, unbuffered: bool) -> Self {
        self.unbuffered = unbuffered;
        self
    }

    #[must_use]
    pub fn terminator(&self) -> u8 {
        if self.nul_terminated { 0 } else { b'\n' }
    }
}

/// An empty marker stands for a single NUL.
fn marker_bytes(marker: &str) -> Vec<u8> {
    if marker.is_empty() {
        vec![0]
    } else {
        marker.as_bytes().to_vec()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub database: PathBuf,
    pub script: String,
    #[serde(skip)]
    pub args: Vec<OsString>,
    pub output: OutputOptions,
    pub looping: bool,
    pub busy_timeout_ms: u64,
    pub debug: bool,
}

impl Config {
    #[must_use]
    pub fn from_args(args: Args) -> Self {
        let layout = if args.raw {
            Layout::Raw
        } else if args.separators.is_empty() {
            Layout::Tagged
        } else {
            Layout::Separated(args.separators)
        };
        let escape = if args.ansi {
            EscapeStyle::Ansi
        } else {
            EscapeStyle::Octal
        };
        let output = OutputOptions::default()
            .with_layout(layout)
            .with_escape(escape)
            .with_nul(args.nul)
            .with_row_markers(args.row_begin.as_deref(), args.row_end.as_deref())
            .with_unbuffered(args.unbuffered);

        Config {
            database: args.database,
            script: args.script,
            args: args.args,
            output,
            looping: args.looping,
            busy_timeout_ms: args.timeout,
            debug: args.debug,
        }
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
