// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Command-line driver: a file runner and a line-at-a-time REPL.
//!
//! Thin plumbing only, as called out in the module's own doc comment: no
//! parsing, compiling or execution happens here, just argument handling,
//! I/O, and translating [`lox::LoxError`] into the process exit codes.

use std::io::Write as _;
use std::process::ExitCode;

use lox::LoxError;

const EXIT_OK: u8 = 0;
const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

fn main() -> ExitCode {
    let args: Vec<std::string::String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => repl(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: lox [path]");
            ExitCode::from(EXIT_IO_ERROR)
        }
    }
}

/// Run one source file, reporting its outcome as a process exit code.
fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file \"{path}\": {err}");
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    match lox::run_source(&source) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(LoxError::Compile(err)) => {
            eprint!("{err}");
            ExitCode::from(EXIT_COMPILE_ERROR)
        }
        Err(LoxError::Runtime(err)) => {
            eprint!("{err}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

/// A read-eval-print loop over stdin, one line at a time.
///
/// Each line is compiled and run in isolation: there is no persisted
/// session state (no shared globals table, no shared heap) across lines,
/// matching the language's own lack of a notion of an interactive session
/// distinct from a one-shot script.
fn repl() -> ExitCode {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = std::string::String::new();

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            return ExitCode::from(EXIT_IO_ERROR);
        }

        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                println!();
                return ExitCode::from(EXIT_OK);
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("Could not read from stdin: {err}");
                return ExitCode::from(EXIT_IO_ERROR);
            }
        }

        if let Err(err) = lox::run_source(&line) {
            eprint!("{err}");
        }
    }
}
