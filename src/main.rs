//! dedupe - replace duplicate files with links
//!
//! Entry point for the dedupe CLI application.

use clap::Parser;
use dedupe::{
    cli::Cli,
    config::ConfigError,
    dedupe::DedupeError,
    error::{ExitCode, StructuredError},
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match dedupe::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let is_usage = err.downcast_ref::<DedupeError>().is_some()
                || err.downcast_ref::<ConfigError>().is_some();
            let exit_code = if is_usage {
                ExitCode::Usage
            } else {
                ExitCode::GeneralError
            };

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
