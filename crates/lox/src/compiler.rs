// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Single-pass Pratt compiler: tokens straight into bytecode, no AST.
//!
//! The reference material's rule table is a static map of function
//! pointers; its own design notes call a switch inside `parse_precedence`
//! an equivalent reimplementation, which is what this module does — one
//! fewer lifetime-infected function-pointer type to carry around.

use crate::chunk::{Chunk, OpCode};
use crate::object::{FunctionRef, Heap, ObjFunction};
use crate::scanner::{Scanner, Token, TokenKind};
use crate::value::Value;

const MAX_LOCALS: usize = 256;
const MAX_SWITCH_CASES: usize = 100;
const MAX_PARAMETERS: usize = 255;
const MAX_ARGUMENTS: usize = 255;
const MAX_JUMP: usize = u16::MAX as usize;

/// A compile-time diagnostic, formatted exactly as it should appear on
/// stderr: `[line N] Error[ at '<lexeme>'|at end]: <message>`.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub messages: Vec<std::string::String>,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Precedence {
    None,
    Assignment,
    Ternary,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    const fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Ternary,
            Self::Ternary => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

#[derive(Clone, Copy)]
enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    StringLit,
    Literal,
    Variable,
    And,
    Or,
    Ternary,
    Call,
}

#[derive(Clone, Copy)]
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

const fn rule(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

fn get_rule(kind: TokenKind) -> ParseRule {
    use ParseFn::{And, Binary, Call, Grouping, Literal, Number, Or, StringLit, Ternary, Unary, Variable};
    use Precedence as P;
    match kind {
        TokenKind::LeftParen => rule(Some(Grouping), Some(Call), P::Call),
        TokenKind::Minus => rule(Some(Unary), Some(Binary), P::Term),
        TokenKind::Plus => rule(None, Some(Binary), P::Term),
        TokenKind::Slash | TokenKind::Star => rule(None, Some(Binary), P::Factor),
        TokenKind::Question => rule(None, Some(Ternary), P::Ternary),
        TokenKind::Bang => rule(Some(Unary), None, P::None),
        TokenKind::BangEqual | TokenKind::EqualEqual => rule(None, Some(Binary), P::Equality),
        TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
            rule(None, Some(Binary), P::Comparison)
        }
        TokenKind::Identifier => rule(Some(Variable), None, P::None),
        TokenKind::String => rule(Some(StringLit), None, P::None),
        TokenKind::Number => rule(Some(Number), None, P::None),
        TokenKind::And => rule(None, Some(And), P::And),
        TokenKind::Or => rule(None, Some(Or), P::Or),
        TokenKind::False | TokenKind::Nil | TokenKind::True => rule(Some(Literal), None, P::None),
        _ => rule(None, None, P::None),
    }
}

struct Local<'src> {
    name: &'src str,
    depth: i32,
}

struct LoopContext {
    continue_target: usize,
    scope_depth: i32,
}

struct FunctionState<'src> {
    function: FunctionRef,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
    loops: Vec<LoopContext>,
    enclosing: Option<Box<FunctionState<'src>>>,
}

impl<'src> FunctionState<'src> {
    fn new(function: FunctionRef) -> Self {
        Self {
            function,
            // Slot 0 is reserved for the called function itself (or, at
            // the top level, the synthetic script function); its empty
            // name can never match a real identifier.
            locals: std::vec![Local { name: "", depth: 0 }],
            scope_depth: 0,
            loops: Vec::new(),
            enclosing: None,
        }
    }
}

pub struct Compiler<'a, 'src> {
    heap: &'a mut Heap,
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<std::string::String>,
    state: Box<FunctionState<'src>>,
}

/// Compile a complete program into a top-level script function.
///
/// # Errors
///
/// Returns every accumulated diagnostic if compilation failed at any point;
/// no function is produced in that case.
pub fn compile<'src>(source: &'src str, heap: &mut Heap) -> Result<FunctionRef, CompileError> {
    let script = heap.alloc_function(ObjFunction::new(0, None));
    let mut compiler = Compiler {
        heap,
        scanner: Scanner::new(source),
        current: Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 0,
        },
        previous: Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 0,
        },
        had_error: false,
        panic_mode: false,
        errors: Vec::new(),
        state: Box::new(FunctionState::new(script)),
    };
    compiler.run()
}

impl<'a, 'src> Compiler<'a, 'src> {
    fn run(mut self) -> Result<FunctionRef, CompileError> {
        self.advance();
        while !self.matches(TokenKind::Eof) {
            self.declaration();
        }
        self.emit_implicit_return();
        if self.had_error {
            Err(CompileError {
                messages: self.errors,
            })
        } else {
            Ok(self.state.function)
        }
    }

    // ---- token stream ----------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            self.error_at_current_raw(self.current.lexeme);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    // ---- diagnostics -------------------------------------------------

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    /// Used when the scanner itself produced an error token: its lexeme
    /// already *is* the diagnostic message.
    fn error_at_current_raw(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let location = match token.kind {
            TokenKind::Eof => " at end".to_owned(),
            TokenKind::Error => std::string::String::new(),
            _ => std::format!(" at '{}'", token.lexeme),
        };
        self.errors
            .push(std::format!("[line {}] Error{}: {}", token.line, location, message));
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return
                | TokenKind::Switch => return,
                _ => self.advance(),
            }
        }
    }

    // ---- emission ------------------------------------------------------

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.heap.function_mut(self.state.function).chunk
    }

    fn line(&self) -> u32 {
        self.previous.line
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line();
        self.current_chunk().write_op(op, line);
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.line();
        self.current_chunk().write(byte, line);
    }

    fn emit_implicit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> usize {
        match self.current_chunk().add_constant(value) {
            Ok(index) => index,
            Err(_) => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_pool_ref(index, OpCode::Constant, OpCode::ConstantLong);
    }

    fn emit_pool_ref(&mut self, index: usize, short_op: OpCode, long_op: OpCode) {
        if let Ok(byte) = u8::try_from(index) {
            self.emit_op(short_op);
            self.emit_byte(byte);
        } else {
            self.emit_op(long_op);
            let bytes = (index as u32).to_le_bytes();
            self.emit_byte(bytes[0]);
            self.emit_byte(bytes[1]);
            self.emit_byte(bytes[2]);
        }
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk().code.len() - offset - 2;
        if jump > MAX_JUMP {
            self.error("Too much code to jump over.");
        }
        let chunk = self.current_chunk();
        chunk.code[offset] = (jump >> 8) as u8;
        chunk.code[offset + 1] = jump as u8;
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > MAX_JUMP {
            self.error("Loop body too large.");
        }
        self.emit_byte((offset >> 8) as u8);
        self.emit_byte(offset as u8);
    }

    fn emit_pop_count(&mut self, mut count: usize) {
        while count > 0 {
            let chunk_size = count.min(u8::MAX as usize);
            if chunk_size == 1 {
                self.emit_op(OpCode::Pop);
            } else {
                self.emit_op(OpCode::PopN);
                self.emit_byte(chunk_size as u8);
            }
            count -= chunk_size;
        }
    }

    // ---- scopes & locals -------------------------------------------

    fn begin_scope(&mut self) {
        self.state.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.state.scope_depth -= 1;
        let depth = self.state.scope_depth;
        let mut count = 0usize;
        while matches!(self.state.locals.last(), Some(local) if local.depth > depth) {
            self.state.locals.pop();
            count += 1;
        }
        self.emit_pop_count(count);
    }

    fn add_local(&mut self, name: &'src str) {
        if self.state.locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.state.locals.push(Local { name, depth: -1 });
    }

    fn declare_variable(&mut self) {
        if self.state.scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme;
        let scope_depth = self.state.scope_depth;
        let redeclared = self
            .state
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth == -1 || local.depth == scope_depth)
            .any(|local| local.name == name);
        if redeclared {
            self.error("Already a variable with this name in this scope.");
            return;
        }
        self.add_local(name);
    }

    fn mark_initialized(&mut self) {
        if self.state.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.state.locals.last_mut() {
            local.depth = self.state.scope_depth;
        }
    }

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        for (index, local) in self.state.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(index as u8);
            }
        }
        None
    }

    fn identifier_constant(&mut self, name: &str) -> usize {
        let reference = self.heap.intern(name);
        self.make_constant(Value::String(reference))
    }

    fn parse_variable(&mut self, message: &str) -> usize {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.state.scope_depth > 0 {
            0
        } else {
            self.identifier_constant(self.previous.lexeme)
        }
    }

    fn define_variable(&mut self, global: usize) {
        if self.state.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_pool_ref(global, OpCode::DefineGlobal, OpCode::DefineGlobalLong);
    }

    // ---- expressions -------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        self.apply_prefix(prefix, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix = get_rule(self.previous.kind)
                .infix
                .expect("infix rule must exist for a token with a precedence above NONE");
            self.apply_infix(infix, can_assign);
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn apply_prefix(&mut self, kind: ParseFn, can_assign: bool) {
        match kind {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Number => self.number(),
            ParseFn::StringLit => self.string_literal(),
            ParseFn::Literal => self.literal(),
            ParseFn::Variable => self.variable(can_assign),
            ParseFn::Binary | ParseFn::And | ParseFn::Or | ParseFn::Ternary | ParseFn::Call => {
                unreachable!("not a prefix rule")
            }
        }
    }

    fn apply_infix(&mut self, kind: ParseFn, can_assign: bool) {
        match kind {
            ParseFn::Binary => self.binary(),
            ParseFn::And => self.and(),
            ParseFn::Or => self.or(),
            ParseFn::Ternary => self.ternary(),
            ParseFn::Call => self.call(),
            ParseFn::Grouping
            | ParseFn::Unary
            | ParseFn::Number
            | ParseFn::StringLit
            | ParseFn::Literal
            | ParseFn::Variable => {
                let _ = can_assign;
                unreachable!("not an infix rule")
            }
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary rule only registered for - and !"),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        let rule = get_rule(operator);
        self.parse_precedence(rule.precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::BangEqual => self.emit_op(OpCode::NotEqual),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_op(OpCode::GreaterEqual),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_op(OpCode::LessEqual),
            _ => unreachable!("binary rule only registered for the operators above"),
        }
    }

    fn ternary(&mut self) {
        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Assignment);
        self.consume(TokenKind::Colon, "Expect ':' after then branch of ternary expression.");
        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Ternary);
        self.patch_jump(else_jump);
    }

    fn and(&mut self) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self) {
        // Short-circuit: a truthy left operand jumps straight past the
        // right operand, leaving itself as the result.
        let end_jump = self.emit_jump(OpCode::JumpIfTrue);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn number(&mut self) {
        let value: f64 = self
            .previous
            .lexeme
            .parse()
            .expect("scanner only produces well-formed number lexemes");
        if value == 0.0 {
            self.emit_op(OpCode::Zero);
        } else if value == 1.0 {
            self.emit_op(OpCode::One);
        } else if value == 2.0 {
            self.emit_op(OpCode::Two);
        } else {
            self.emit_constant(Value::Number(value));
        }
    }

    fn string_literal(&mut self) {
        let lexeme = self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let reference = self.heap.intern(contents);
        self.emit_constant(Value::String(reference));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!("literal rule only registered for false/true/nil"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let local_slot = self.resolve_local(name.lexeme);
        let (get_short, get_long, set_short, set_long, arg) = match local_slot {
            Some(slot) => {
                if can_assign && self.matches(TokenKind::Equal) {
                    self.expression();
                    self.emit_op(OpCode::SetLocal);
                    self.emit_byte(slot);
                } else {
                    self.emit_op(OpCode::GetLocal);
                    self.emit_byte(slot);
                }
                return;
            }
            None => {
                let index = self.identifier_constant(name.lexeme);
                (
                    OpCode::GetGlobal,
                    OpCode::GetGlobalLong,
                    OpCode::SetGlobal,
                    OpCode::SetGlobalLong,
                    index,
                )
            }
        };

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            self.emit_pool_ref(arg, set_short, set_long);
        } else {
            self.emit_pool_ref(arg, get_short, get_long);
        }
    }

    fn call(&mut self) {
        let argument_count = self.argument_list();
        self.emit_op(OpCode::Call);
        self.emit_byte(argument_count);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count = 0usize;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count >= MAX_ARGUMENTS {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count as u8
    }

    // ---- statements ----------------------------------------------------

    fn declaration(&mut self) {
        if self.matches(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.compile_function();
        self.define_variable(global);
    }

    fn compile_function(&mut self) {
        let name_lexeme = self.previous.lexeme;
        let name = self.heap.intern(name_lexeme);
        let function_ref = self.heap.alloc_function(ObjFunction::new(0, Some(name)));
        let enclosing = std::mem::replace(&mut self.state, Box::new(FunctionState::new(function_ref)));
        self.state.enclosing = Some(enclosing);

        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                let arity = self.heap.function(self.state.function).arity;
                if usize::from(arity) >= MAX_PARAMETERS {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.heap.function_mut(self.state.function).arity = arity + 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();
        self.emit_implicit_return();

        let enclosing = self
            .state
            .enclosing
            .take()
            .expect("compile_function always pushes an enclosing state");
        let function_ref = self.state.function;
        self.state = enclosing;
        self.emit_constant(Value::Function(function_ref));
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.matches(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.matches(TokenKind::Print) {
            self.print_statement();
        } else if self.matches(TokenKind::For) {
            self.for_statement();
        } else if self.matches(TokenKind::If) {
            self.if_statement();
        } else if self.matches(TokenKind::Return) {
            self.return_statement();
        } else if self.matches(TokenKind::While) {
            self.while_statement();
        } else if self.matches(TokenKind::Switch) {
            self.switch_statement();
        } else if self.matches(TokenKind::Continue) {
            self.continue_statement();
        } else if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn return_statement(&mut self) {
        if self.state.enclosing.is_none() {
            self.error("Can't return from top-level code.");
        }
        if self.matches(TokenKind::Semicolon) {
            self.emit_implicit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.matches(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().code.len();
        self.state.loops.push(LoopContext {
            continue_target: loop_start,
            scope_depth: self.state.scope_depth,
        });

        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
        self.state.loops.pop();
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.matches(TokenKind::Semicolon) {
            // no initializer
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().code.len();
        let mut exit_jump = None;
        if !self.matches(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.check(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code.len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");
            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        } else {
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");
        }

        self.state.loops.push(LoopContext {
            continue_target: loop_start,
            scope_depth: self.state.scope_depth,
        });
        self.statement();
        self.emit_loop(loop_start);
        self.state.loops.pop();

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }
        self.end_scope();
    }

    fn continue_statement(&mut self) {
        self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.");
        let Some(loop_ctx) = self.state.loops.last() else {
            self.error("Can't use 'continue' outside of a loop.");
            return;
        };
        let target = loop_ctx.continue_target;
        let depth = loop_ctx.scope_depth;
        let count = self
            .state
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth > depth)
            .count();
        self.emit_pop_count(count);
        self.emit_loop(target);
    }

    fn switch_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'switch'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after switch discriminant.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before switch body.");

        let mut end_jumps = Vec::new();
        let mut case_count = 0usize;
        while self.matches(TokenKind::Case) {
            case_count += 1;
            if case_count > MAX_SWITCH_CASES {
                self.error("Too many cases in switch statement.");
            }
            self.expression();
            self.consume(TokenKind::Colon, "Expect ':' after case value.");
            let next_case_jump = self.emit_jump(OpCode::JumpNotEqual);

            while !self.check(TokenKind::Case)
                && !self.check(TokenKind::Default)
                && !self.check(TokenKind::RightBrace)
                && !self.check(TokenKind::Eof)
            {
                self.statement();
            }
            end_jumps.push(self.emit_jump(OpCode::Jump));
            self.patch_jump(next_case_jump);
        }

        if self.matches(TokenKind::Default) {
            self.consume(TokenKind::Colon, "Expect ':' after 'default'.");
            self.emit_op(OpCode::Pop);
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                self.statement();
            }
        } else {
            self.emit_op(OpCode::Pop);
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after switch body.");
        for jump in end_jumps {
            self.patch_jump(jump);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::OpCode;

    fn compile_ok(source: &str) -> (FunctionRef, Heap) {
        let mut heap = Heap::new();
        let function = compile(source, &mut heap).expect("source should compile");
        (function, heap)
    }

    fn ops(heap: &Heap, function: FunctionRef) -> std::vec::Vec<OpCode> {
        let chunk = &heap.function(function).chunk;
        let mut out = std::vec::Vec::new();
        let mut offset = 0usize;
        while offset < chunk.code.len() {
            let op = OpCode::try_from(chunk.code[offset]).expect("valid opcode");
            let operand_len = match op {
                OpCode::Constant
                | OpCode::GetGlobal
                | OpCode::SetGlobal
                | OpCode::DefineGlobal
                | OpCode::GetLocal
                | OpCode::SetLocal
                | OpCode::PopN
                | OpCode::Call => 1,
                OpCode::ConstantLong
                | OpCode::GetGlobalLong
                | OpCode::SetGlobalLong
                | OpCode::DefineGlobalLong => 3,
                OpCode::Jump
                | OpCode::JumpIfTrue
                | OpCode::JumpIfFalse
                | OpCode::JumpNotEqual
                | OpCode::Loop => 2,
                _ => 0,
            };
            out.push(op);
            offset += 1 + operand_len;
        }
        out
    }

    #[test]
    fn number_literals_use_dedicated_opcodes_for_small_values() {
        let (function, heap) = compile_ok("0; 1; 2; 3;");
        let code = ops(&heap, function);
        assert_eq!(
            code,
            std::vec![
                OpCode::Zero,
                OpCode::Pop,
                OpCode::One,
                OpCode::Pop,
                OpCode::Two,
                OpCode::Pop,
                OpCode::Constant,
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn global_variable_roundtrips() {
        let (function, heap) = compile_ok("var x = 5; print x;");
        let code = ops(&heap, function);
        assert!(code.contains(&OpCode::DefineGlobal));
        assert!(code.contains(&OpCode::GetGlobal));
        assert!(code.contains(&OpCode::Print));
    }

    #[test]
    fn local_variable_uses_slot_opcodes_not_globals() {
        let (function, heap) = compile_ok("{ var x = 5; print x; }");
        let code = ops(&heap, function);
        assert!(!code.contains(&OpCode::DefineGlobal));
        assert!(code.contains(&OpCode::GetLocal));
    }

    #[test]
    fn redeclaring_a_local_in_the_same_scope_is_an_error() {
        let mut heap = Heap::new();
        let err = compile("{ var x = 1; var x = 2; }", &mut heap).unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("Already a variable")));
    }

    #[test]
    fn shadowing_an_outer_scope_is_allowed() {
        let mut heap = Heap::new();
        assert!(compile("var x = 1; { var x = 2; }", &mut heap).is_ok());
    }

    #[test]
    fn continue_outside_a_loop_is_an_error() {
        let mut heap = Heap::new();
        let err = compile("continue;", &mut heap).unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("outside of a loop")));
    }

    #[test]
    fn return_outside_a_function_is_an_error() {
        let mut heap = Heap::new();
        let err = compile("return 1;", &mut heap).unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("top-level")));
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let mut heap = Heap::new();
        let err = compile("1 + 2 = 3;", &mut heap).unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("Invalid assignment target")));
    }

    #[test]
    fn function_declaration_compiles_a_nested_chunk() {
        let (function, heap) = compile_ok("fun add(a, b) { return a + b; } print add(1, 2);");
        assert_eq!(heap.function(function).chunk.code.is_empty(), false);
        let code = ops(&heap, function);
        assert!(code.contains(&OpCode::Call));
    }
}
