//! Run SQLite statements from the shell.
//!
//! Bind markers pull their values from the command line (`?`, `:name`), the
//! environment (`$NAME`) or file descriptors (`:fd0`, `:fd0__10`, ...), and
//! rows come out in a format a shell `read` loop can take apart.

pub mod binder;
pub mod config;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod marker;
pub mod reader;
pub mod types;

pub use binder::{BindReport, bind_parameters};
pub use config::{Args, Config, EscapeStyle, Layout, OutputOptions};
pub use driver::{RunSummary, Session};
pub use encoder::RowEncoder;
pub use error::SqError;
pub use marker::{BindSource, DescriptorSpec, Terminator};
pub use reader::{DescriptorBuffer, Descriptors};
pub use types::ColumnValue;
