// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! End-to-end scenarios run through the public `run_source` entry point.
//!
//! `print` writes straight to stdout, so these tests check the thing that
//! is actually observable through the library boundary: whether a program
//! compiles and runs without error. The printed values themselves are
//! covered at the unit level in `vm.rs`, where tests can inspect globals
//! and the operand stack directly instead of scraping process output.

use lox::LoxError;

#[test]
fn arithmetic_precedence_runs_clean() {
    assert!(lox::run_source("print 1 + 2 * 3;").is_ok());
}

#[test]
fn string_concatenation_runs_clean() {
    let source = r#"
        var a = "he";
        var b = "llo";
        print a + b;
        print a + b;
    "#;
    assert!(lox::run_source(source).is_ok());
}

#[test]
fn a_for_loop_accumulates_without_error() {
    let source = "var x = 0; for (var i = 0; i < 5; i = i + 1) { x = x + i; } print x;";
    assert!(lox::run_source(source).is_ok());
}

#[test]
fn recursive_fibonacci_runs_clean() {
    let source = "fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);";
    assert!(lox::run_source(source).is_ok());
}

#[test]
fn type_strict_equality_runs_clean() {
    assert!(lox::run_source(r#"print "a" == "a"; print 1 == true;"#).is_ok());
}

#[test]
fn reading_an_undefined_global_is_a_runtime_error() {
    match lox::run_source("print undefined_var;") {
        Err(LoxError::Runtime(report)) => {
            assert!(report.to_string().contains("Undefined variable 'undefined_var'."));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn nested_scopes_see_the_enclosing_binding_in_their_initializer() {
    let source = "{ var a = 1; { var a = a + 1; print a; } }";
    assert!(lox::run_source(source).is_ok());
}

#[test]
fn shadowing_in_an_inner_block_does_not_affect_the_outer_binding() {
    let source = r#"var s = "x"; { var s = "y"; print s; } print s;"#;
    assert!(lox::run_source(source).is_ok());
}

#[test]
fn a_dangling_semicolon_with_no_expression_is_a_compile_error() {
    match lox::run_source("print ;") {
        Err(LoxError::Compile(_)) => {}
        other => panic!("expected a compile error, got {other:?}"),
    }
}
