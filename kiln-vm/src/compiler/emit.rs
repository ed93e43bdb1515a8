// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode emission trait for compilers.
//!
//! The control-flow shapes below only need to emit instructions, patch
//! jumps and compile subexpressions, so they are written once against
//! [`BytecodeEmitter`].

use kiln_ast::{Block, Expr};

use crate::object::Value;
use crate::opcode::{Op, Word};

use super::types::Result;

/// Trait for types that can emit bytecode.
pub trait BytecodeEmitter {
    /// Emit an instruction and return its offset.
    fn emit(&mut self, op: Op, operands: &[Word]) -> usize;

    /// Emit `LoadConst` for a value.
    fn emit_constant(&mut self, value: Value) -> Result<()>;

    /// Emit a forward jump with a placeholder delta and return its offset
    /// for patching.
    fn emit_jump(&mut self, op: Op) -> usize;

    /// Point the forward jump at `pos` to the next instruction emitted.
    fn patch_jump(&mut self, pos: usize) -> Result<()>;

    /// Compile an expression, leaving exactly one value on the stack.
    fn compile_expr(&mut self, expr: &Expr) -> Result<()>;

    /// Compile a block in its own scope, leaving its value on the stack.
    fn compile_block(&mut self, block: &Block) -> Result<()>;
}

/// Control flow compilation using the BytecodeEmitter trait.
pub mod control {
    use kiln_ast::{Block, Expr};

    use super::BytecodeEmitter;
    use crate::compiler::types::Result;
    use crate::opcode::{BinaryOpType, Op};

    /// `if cond { .. } else { .. }`. A missing alternative yields nil.
    pub fn compile_if<E: BytecodeEmitter>(
        emitter: &mut E,
        cond: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Result<()> {
        emitter.compile_expr(cond)?;
        let else_jump = emitter.emit_jump(Op::PopJumpForwardIfFalse);
        emitter.compile_block(consequence)?;
        let end_jump = emitter.emit_jump(Op::JumpForward);
        emitter.patch_jump(else_jump)?;
        match alternative {
            Some(block) => emitter.compile_block(block)?,
            None => {
                emitter.emit(Op::Nil, &[]);
            }
        }
        emitter.patch_jump(end_jump)
    }

    /// `cond ? a : b`
    pub fn compile_ternary<E: BytecodeEmitter>(
        emitter: &mut E,
        cond: &Expr,
        if_true: &Expr,
        if_false: &Expr,
    ) -> Result<()> {
        emitter.compile_expr(cond)?;
        let else_jump = emitter.emit_jump(Op::PopJumpForwardIfFalse);
        emitter.compile_expr(if_true)?;
        let end_jump = emitter.emit_jump(Op::JumpForward);
        emitter.patch_jump(else_jump)?;
        emitter.compile_expr(if_false)?;
        emitter.patch_jump(end_jump)
    }

    /// `a && b`: a falsy left operand is the result without evaluating
    /// the right.
    pub fn compile_and<E: BytecodeEmitter>(emitter: &mut E, left: &Expr, right: &Expr) -> Result<()> {
        short_circuit(emitter, left, right, Op::PopJumpForwardIfFalse, BinaryOpType::And)
    }

    /// `a || b`: a truthy left operand is the result without evaluating
    /// the right.
    pub fn compile_or<E: BytecodeEmitter>(emitter: &mut E, left: &Expr, right: &Expr) -> Result<()> {
        short_circuit(emitter, left, right, Op::PopJumpForwardIfTrue, BinaryOpType::Or)
    }

    fn short_circuit<E: BytecodeEmitter>(
        emitter: &mut E,
        left: &Expr,
        right: &Expr,
        jump: Op,
        op: BinaryOpType,
    ) -> Result<()> {
        emitter.compile_expr(left)?;
        emitter.emit(Op::Copy, &[0]);
        let end_jump = emitter.emit_jump(jump);
        emitter.compile_expr(right)?;
        emitter.emit(Op::BinaryOp, &[op as u16]);
        emitter.patch_jump(end_jump)?;
        emitter.emit(Op::Nop, &[]);
        Ok(())
    }
}
