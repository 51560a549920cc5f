use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use tracing::Level;

use sqlpipe::error::EXIT_USAGE;
use sqlpipe::{Args, Config, Session, SqError};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };
    let config = Config::from_args(args);

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(if config.debug { Level::DEBUG } else { Level::WARN })
        .init();

    if config.debug {
        let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
        tracing::debug!("config: {}", config_json);
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ SqError::Usage(_)) => {
            eprintln!("{err}\n\n{}", Args::command().render_usage());
            ExitCode::from(err.exit_code())
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(config: &Config) -> Result<(), SqError> {
    let out = BufWriter::new(io::stdout().lock());
    let mut session = Session::open(config, out)?;
    let summary = session.run_script(&config.script)?;
    tracing::debug!(
        statements = summary.statements,
        executions = summary.executions,
        rows = summary.rows,
        "script done"
    );
    session.close()?;
    Ok(())
}
