// SPDX-License-Identifier: GPL-3.0-or-later

//! The Archipelago host process (component, §4.12): loads an input
//! file, builds a context registry, and runs the file's instruction
//! list against it.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::error;

use archi_context::Registry;
use archi_core::params::ParameterList;
use archi_core::status::Status;
use archi_core::Pointer;
use archi_instr::Interpreter;
use archi_log::LogContext;
use archi_loader::InputFile;

/// When to colour log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Color {
    /// Colour iff stdout is a terminal.
    Auto,
    /// Always colour.
    Always,
    /// Never colour.
    Never,
}

/// Load and run an Archipelago input file.
#[derive(Debug, Parser)]
#[command(name = "archipelago", version, about)]
struct Cli {
    /// Path to the input file to load and run.
    path: PathBuf,

    /// Increase logging verbosity (repeatable, clamped to the maximum level).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// When to colour log output.
    #[arg(long, value_enum, default_value_t = Color::Auto)]
    color: Color,

    /// Override a module parameter (`key=value`), highest precedence.
    /// Repeatable.
    #[arg(short = 'D', value_name = "key=value")]
    define: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("malformed override {0:?}, expected key=value")]
    MalformedOverride(String),
}

fn parse_overrides(defines: &[String]) -> Result<ParameterList, CliError> {
    let mut overrides = ParameterList::new();
    for define in defines {
        let Some((key, value)) = define.split_once('=') else {
            return Err(CliError::MalformedOverride(define.clone()));
        };
        overrides.push(key.to_string(), archi_context::scalar::pointer_from_string(value.to_string()));
    }
    Ok(overrides)
}

fn resolve_color(choice: Color) -> bool {
    match choice {
        Color::Always => true,
        Color::Never => false,
        Color::Auto => std::io::stdout().is_terminal(),
    }
}

fn report_failure(context: &str, status: Status) {
    error!(
        module = status.module_id(),
        info = format!("{:#x}", status.info_bits()),
        "{context} failed: {status}"
    );
    eprintln!(
        "archipelago: {context} failed: {status} (module {}, info 0x{:x})",
        status.module_id(),
        status.info_bits()
    );
}

fn run(cli: &Cli) -> Status {
    let overrides = match parse_overrides(&cli.define) {
        Ok(overrides) => overrides,
        Err(err) => {
            eprintln!("archipelago: {err}");
            return Status::MISUSE;
        }
    };

    let input = match InputFile::open(&cli.path) {
        Ok(input) => input,
        Err(err) => {
            let status = Status::from(err);
            report_failure("loading input file", status);
            return status;
        }
    };

    let merged_params = input.params().override_with(&overrides);

    let registry = Registry::new();
    let status = registry.init_parameters("params", &merged_params);
    if status != Status::OK {
        report_failure("seeding module parameters", status);
        return status;
    }

    let interpreter = Interpreter::new(true);
    let status = interpreter.execute(&registry, input.instructions());
    if status != Status::OK {
        report_failure("running instruction list", status);
    }
    status
}

/// Map a [`Status`] to a process exit code: `0` for success, a non-zero
/// byte otherwise. Per §6/§7, "errors produce non-zero"; since negative
/// error codes and positive condition codes both represent an aborted
/// run here, the magnitude of either is what the shell sees (clamped to
/// fit a byte, since that's all POSIX exit statuses carry).
fn exit_code(status: Status) -> u8 {
    if status.is_ok() {
        return 0;
    }
    u8::try_from(status.0.unsigned_abs().min(u32::from(u8::MAX))).unwrap_or(u8::MAX).max(1)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    LogContext::init(cli.verbose, resolve_color(cli.color));

    let status = run(&cli);
    ExitCode::from(exit_code(status))
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;

    #[test]
    fn ok_status_exits_zero() {
        assert_eq!(exit_code(Status::OK), 0);
    }

    #[test]
    fn negative_error_status_exits_non_zero() {
        assert_eq!(exit_code(Status::MISUSE), 2);
    }

    #[test]
    fn positive_condition_status_exits_non_zero() {
        assert_eq!(exit_code(Status::KEY_NOT_FOUND), 1);
    }
}
