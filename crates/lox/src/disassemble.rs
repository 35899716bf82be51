// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Human-readable bytecode listings.
//!
//! An external collaborator, not part of compilation or execution: one line
//! of text per instruction (opcode name plus decoded operands), followed by
//! the constant pool. Mirrors the shape of the reference material's own
//! `compiler::disassemble` free function for its (different) opcode set.

use crate::chunk::{Chunk, OpCode};
use crate::object::Heap;
use std::fmt::Write as _;

/// Disassemble every instruction in `chunk`, then its constant pool.
#[must_use]
pub fn disassemble_chunk(chunk: &Chunk, heap: &Heap, name: &str) -> std::string::String {
    let mut out = std::string::String::new();
    let _ = writeln!(out, "== {name} ==");

    let mut offset = 0usize;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, heap, offset, &mut out);
    }

    if !chunk.constants.is_empty() {
        let _ = writeln!(out, "\nConstants:");
        for (i, value) in chunk.constants.iter().enumerate() {
            let _ = writeln!(out, "  {i:04} {}", value.display(heap));
        }
    }

    out
}

/// Disassemble the one instruction at `offset`, appending it to `out`.
/// Returns the offset of the following instruction.
fn disassemble_instruction(
    chunk: &Chunk,
    heap: &Heap,
    offset: usize,
    out: &mut std::string::String,
) -> usize {
    let _ = write!(out, "{offset:04} ");
    let line = chunk.get_line(offset);
    if offset > 0 && chunk.get_line(offset - 1) == line {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{line:4} ");
    }

    let byte = chunk.code[offset];
    let Ok(op) = OpCode::try_from(byte) else {
        let _ = writeln!(out, "UNKNOWN {byte:#04x}");
        return offset + 1;
    };

    match op {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, heap, offset, false, out),
        OpCode::ConstantLong => {
            constant_instruction("OP_CONSTANT_LONG", chunk, heap, offset, true, out)
        }
        OpCode::Zero => simple_instruction("OP_ZERO", offset, out),
        OpCode::One => simple_instruction("OP_ONE", offset, out),
        OpCode::Two => simple_instruction("OP_TWO", offset, out),
        OpCode::Nil => simple_instruction("OP_NIL", offset, out),
        OpCode::True => simple_instruction("OP_TRUE", offset, out),
        OpCode::False => simple_instruction("OP_FALSE", offset, out),
        OpCode::Pop => simple_instruction("OP_POP", offset, out),
        OpCode::PopN => byte_operand_instruction("OP_POPN", chunk, offset, out),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, heap, offset, false, out),
        OpCode::GetGlobalLong => {
            constant_instruction("OP_GET_GLOBAL_LONG", chunk, heap, offset, true, out)
        }
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, heap, offset, false, out),
        OpCode::SetGlobalLong => {
            constant_instruction("OP_SET_GLOBAL_LONG", chunk, heap, offset, true, out)
        }
        OpCode::DefineGlobal => {
            constant_instruction("OP_DEFINE_GLOBAL", chunk, heap, offset, false, out)
        }
        OpCode::DefineGlobalLong => {
            constant_instruction("OP_DEFINE_GLOBAL_LONG", chunk, heap, offset, true, out)
        }
        OpCode::GetLocal => byte_operand_instruction("OP_GET_LOCAL", chunk, offset, out),
        OpCode::SetLocal => byte_operand_instruction("OP_SET_LOCAL", chunk, offset, out),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset, out),
        OpCode::NotEqual => simple_instruction("OP_NOT_EQUAL", offset, out),
        OpCode::Greater => simple_instruction("OP_GREATER", offset, out),
        OpCode::GreaterEqual => simple_instruction("OP_GREATER_EQUAL", offset, out),
        OpCode::Less => simple_instruction("OP_LESS", offset, out),
        OpCode::LessEqual => simple_instruction("OP_LESS_EQUAL", offset, out),
        OpCode::Add => simple_instruction("OP_ADD", offset, out),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset, out),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset, out),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset, out),
        OpCode::Not => simple_instruction("OP_NOT", offset, out),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset, out),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset, out),
        OpCode::JumpIfTrue => jump_instruction("OP_JUMP_IF_TRUE", 1, chunk, offset, out),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset, out),
        OpCode::JumpNotEqual => jump_instruction("OP_JUMP_NOT_EQUAL", 1, chunk, offset, out),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset, out),
        OpCode::Call => byte_operand_instruction("OP_CALL", chunk, offset, out),
        OpCode::Print => simple_instruction("OP_PRINT", offset, out),
        OpCode::Return => simple_instruction("OP_RETURN", offset, out),
    }
}

fn simple_instruction(name: &str, offset: usize, out: &mut std::string::String) -> usize {
    let _ = writeln!(out, "{name}");
    offset + 1
}

fn byte_operand_instruction(
    name: &str,
    chunk: &Chunk,
    offset: usize,
    out: &mut std::string::String,
) -> usize {
    let operand = chunk.code[offset + 1];
    let _ = writeln!(out, "{name:<20} {operand:4}");
    offset + 2
}

fn constant_instruction(
    name: &str,
    chunk: &Chunk,
    heap: &Heap,
    offset: usize,
    long: bool,
    out: &mut std::string::String,
) -> usize {
    let (index, consumed) = if long {
        let bytes = &chunk.code[offset + 1..offset + 4];
        (
            usize::from(bytes[0]) | (usize::from(bytes[1]) << 8) | (usize::from(bytes[2]) << 16),
            4,
        )
    } else {
        (usize::from(chunk.code[offset + 1]), 2)
    };
    let _ = writeln!(
        out,
        "{name:<20} {index:4} '{}'",
        chunk.constants[index].display(heap)
    );
    offset + consumed
}

fn jump_instruction(
    name: &str,
    sign: i32,
    chunk: &Chunk,
    offset: usize,
    out: &mut std::string::String,
) -> usize {
    let hi = chunk.code[offset + 1];
    let lo = chunk.code[offset + 2];
    let jump = (u16::from(hi) << 8) | u16::from(lo);
    let target = if sign >= 0 {
        offset as i64 + 3 + i64::from(jump)
    } else {
        offset as i64 + 3 - i64::from(jump)
    };
    let _ = writeln!(out, "{name:<20} {offset:4} -> {target}");
    offset + 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn simple_opcodes_print_their_bare_name() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Return, 1);
        let text = disassemble_chunk(&chunk, &heap, "test");
        assert!(text.contains("OP_NIL"));
        assert!(text.contains("OP_RETURN"));
    }

    #[test]
    fn constant_instruction_shows_the_decoded_value() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        let index = chunk.add_constant(Value::Number(42.0)).unwrap();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(u8::try_from(index).unwrap(), 1);
        let text = disassemble_chunk(&chunk, &heap, "test");
        assert!(text.contains("OP_CONSTANT"));
        assert!(text.contains("42"));
        assert!(text.contains("Constants:"));
    }

    #[test]
    fn jump_instruction_shows_its_resolved_target() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write(0, 1);
        chunk.write(2, 1);
        let text = disassemble_chunk(&chunk, &heap, "test");
        // offset 0, 3-byte instruction, jump of 2 lands at offset 5.
        assert!(text.contains("OP_JUMP") && text.contains("-> 5"));
    }
}
