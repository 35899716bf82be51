// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! # Lox
//!
//! A single-pass bytecode compiler and stack-based virtual machine for the
//! Lox scripting language.
//!
//! This crate provides:
//! - A hand-written scanner (`scanner`) producing a flat token stream
//! - A Pratt compiler (`compiler`) turning tokens directly into bytecode,
//!   with no intermediate AST
//! - A bytecode chunk format (`chunk`) with a run-length-encoded line map
//! - A heap arena for interned strings and compiled functions (`object`)
//! - An open-addressed hash table used for globals and string interning
//!   (`table`)
//! - A tagged runtime value (`value`)
//! - A stack-based dispatch-loop VM with call frames (`vm`)
//! - A disassembler for human-readable bytecode listings (`disassemble`)
//!
//! The CLI driver, file reading, and REPL loop are thin plumbing layered on
//! top of [`run_source`] and live in `src/bin/lox.rs`.

pub mod chunk;
pub mod compiler;
pub mod disassemble;
pub mod object;
pub mod scanner;
pub mod table;
pub mod value;
pub mod vm;

use object::Heap;
use vm::{RuntimeErrorReport, Vm};

/// Why a source string failed to run, distinguishing the two outcomes the
/// CLI maps to distinct exit codes.
#[derive(Debug)]
pub enum LoxError {
    /// Compilation failed; one diagnostic line per accumulated error.
    Compile(compiler::CompileError),
    /// Compilation succeeded but execution raised a runtime error.
    Runtime(RuntimeErrorReport),
}

impl std::fmt::Display for LoxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compile(e) => write!(f, "{e}"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoxError {}

impl From<compiler::CompileError> for LoxError {
    fn from(e: compiler::CompileError) -> Self {
        Self::Compile(e)
    }
}

impl From<RuntimeErrorReport> for LoxError {
    fn from(e: RuntimeErrorReport) -> Self {
        Self::Runtime(e)
    }
}

/// Compile and run one source string against a fresh heap and VM.
///
/// This is the single entry point the CLI uses for both file and REPL
/// input: a file is one call, a REPL line is another (each line sees its
/// own heap and globals table, since the language has no notion of a
/// persistent top-level session beyond the process itself).
///
/// # Errors
///
/// Returns [`LoxError::Compile`] if the source fails to compile, or
/// [`LoxError::Runtime`] if it compiles but raises an error while running.
pub fn run_source(source: &str) -> Result<(), LoxError> {
    let mut heap = Heap::new();
    let function = compiler::compile(source, &mut heap)?;
    let mut vm = Vm::new(heap);
    vm.interpret(function)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_well_formed_program_runs_to_completion() {
        assert!(run_source("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn a_syntax_error_is_reported_as_a_compile_error() {
        match run_source("print ;") {
            Err(LoxError::Compile(_)) => {}
            other => panic!("expected a compile error, got {other:?}"),
        }
    }

    #[test]
    fn an_undefined_variable_is_reported_as_a_runtime_error() {
        match run_source("print undefined_var;") {
            Err(LoxError::Runtime(_)) => {}
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }
}
