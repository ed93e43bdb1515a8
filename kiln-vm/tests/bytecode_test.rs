// kiln-vm - Emitted instruction shapes
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::*;
use kiln_vm::{BinaryOpType, CompareOpType, Instruction, Op};
use pretty_assertions::assert_eq;

fn decode(statements: Vec<Statement>) -> Vec<Instruction> {
    let code = Compiler::new().compile(&program(statements)).unwrap();
    code.decode().unwrap()
}

fn at(offset: usize, op: Op, operands: &[u16]) -> Instruction {
    Instruction::new(offset, op, operands)
}

#[test]
fn test_global_declaration() {
    assert_eq!(
        decode(vec![var("x", int(1)), expr(ident("x"))]),
        vec![
            at(0, Op::LoadConst, &[0]),
            at(2, Op::StoreGlobal, &[0]),
            at(4, Op::LoadGlobal, &[0]),
        ]
    );
}

#[test]
fn test_expression_statements_are_popped() {
    assert_eq!(
        decode(vec![expr(int(1)), expr(add(int(2), int(1)))]),
        vec![
            at(0, Op::LoadConst, &[0]),
            at(2, Op::PopTop, &[]),
            at(3, Op::LoadConst, &[1]),
            at(5, Op::LoadConst, &[0]),
            at(7, Op::BinaryOp, &[BinaryOpType::Add as u16]),
        ]
    );
}

#[test]
fn test_infinite_loop_with_break() {
    assert_eq!(
        decode(vec![for_loop(vec![brk()])]),
        vec![
            at(0, Op::JumpForward, &[6]),
            at(2, Op::Nil, &[]),
            at(3, Op::PopTop, &[]),
            at(4, Op::JumpBackward, &[4]),
            at(6, Op::Nop, &[]),
            at(7, Op::Nil, &[]),
        ]
    );
}

#[test]
fn test_if_without_else() {
    assert_eq!(
        decode(vec![expr(if_else(boolean(true), block(vec![expr(int(1))]), None))]),
        vec![
            at(0, Op::True, &[]),
            at(1, Op::PopJumpForwardIfFalse, &[6]),
            at(3, Op::LoadConst, &[0]),
            at(5, Op::JumpForward, &[3]),
            at(7, Op::Nil, &[]),
        ]
    );
}

#[test]
fn test_short_circuit_and() {
    assert_eq!(
        decode(vec![expr(and(boolean(true), boolean(false)))]),
        vec![
            at(0, Op::True, &[]),
            at(1, Op::Copy, &[0]),
            at(3, Op::PopJumpForwardIfFalse, &[5]),
            at(5, Op::False, &[]),
            at(6, Op::BinaryOp, &[BinaryOpType::And as u16]),
            at(8, Op::Nop, &[]),
        ]
    );
}

#[test]
fn test_switch_keeps_subject_until_end() {
    assert_eq!(
        decode(vec![expr(switch(
            int(1),
            vec![case(vec![int(2)], block(vec![expr(int(3))]))],
            None,
        ))]),
        vec![
            at(0, Op::LoadConst, &[0]),
            at(2, Op::Copy, &[0]),
            at(4, Op::LoadConst, &[1]),
            at(6, Op::CompareOp, &[CompareOpType::Equal as u16]),
            at(8, Op::PopJumpForwardIfTrue, &[4]),
            at(10, Op::JumpForward, &[6]),
            at(12, Op::LoadConst, &[2]),
            at(14, Op::JumpForward, &[3]),
            at(16, Op::Nil, &[]),
            at(17, Op::Swap, &[1]),
            at(19, Op::PopTop, &[]),
        ]
    );
}

#[test]
fn test_closure_capture() {
    let code = Compiler::new()
        .compile(&program(vec![func(
            "outer",
            &["a"],
            vec![ret(lambda(&[], vec![ret(ident("a"))]))],
        )]))
        .unwrap();
    let outer = code.constants()[0]
        .as_function()
        .cloned()
        .expect("outer function constant");
    assert_eq!(outer.code().local_count(), 2);
    assert_eq!(
        outer.code().decode().unwrap(),
        vec![
            at(0, Op::MakeCell, &[0, 0]),
            at(3, Op::LoadClosure, &[0, 1]),
            at(6, Op::ReturnValue, &[1]),
        ]
    );
    let inner = outer.code().constants()[0]
        .as_function()
        .cloned()
        .expect("inner function constant");
    assert_eq!(
        inner.code().decode().unwrap(),
        vec![at(0, Op::LoadFree, &[0]), at(2, Op::ReturnValue, &[1])]
    );
}

#[test]
fn test_range_loop_shape() {
    assert_eq!(
        decode(vec![for_range(&["k"], list(vec![]), vec![])]),
        vec![
            at(0, Op::BuildList, &[0]),
            at(2, Op::GetIter, &[]),
            at(3, Op::ForIter, &[10, 1]),
            at(6, Op::StoreGlobal, &[0]),
            at(8, Op::Nil, &[]),
            at(9, Op::PopTop, &[]),
            at(10, Op::JumpBackward, &[7]),
            at(12, Op::PopTop, &[]),
            at(13, Op::Nop, &[]),
            at(14, Op::Nil, &[]),
        ]
    );
}

#[test]
fn test_trailing_return_ends_the_body() {
    let code = Compiler::new()
        .compile(&program(vec![func("f", &["a"], vec![ret(ident("a"))])]))
        .unwrap();
    let f = code.constants()[0]
        .as_function()
        .cloned()
        .expect("function constant");
    assert_eq!(
        f.code().decode().unwrap(),
        vec![at(0, Op::LoadFast, &[0]), at(2, Op::ReturnValue, &[1])]
    );

    // A body ending in a plain statement still yields nil.
    let code = Compiler::new()
        .compile(&program(vec![func("g", &[], vec![var("x", int(1))])]))
        .unwrap();
    let g = code.constants()[0]
        .as_function()
        .cloned()
        .expect("function constant");
    assert_eq!(
        g.code().decode().unwrap(),
        vec![
            at(0, Op::LoadConst, &[0]),
            at(2, Op::StoreFast, &[1]),
            at(4, Op::Nil, &[]),
            at(5, Op::ReturnValue, &[1]),
        ]
    );
}
