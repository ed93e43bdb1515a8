// kiln-vm - Property-based tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::*;
use kiln_ast::Expr;
use proptest::prelude::*;

fn arb_small_int() -> impl Strategy<Value = i64> {
    -1000i64..1000
}

/// A random arithmetic tree over small ints, paired with its expected
/// wrapping result.
fn arb_arith() -> impl Strategy<Value = (Expr, i64)> {
    let leaf = arb_small_int().prop_map(|n| (int(n), n));
    leaf.prop_recursive(4, 32, 2, |inner| {
        (inner.clone(), inner, 0..3usize).prop_map(|((l, a), (r, b), op)| match op {
            0 => (add(l, r), a.wrapping_add(b)),
            1 => (sub(l, r), a.wrapping_sub(b)),
            _ => (mul(l, r), a.wrapping_mul(b)),
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Compiled arithmetic agrees with Rust's wrapping arithmetic.
    #[test]
    fn arithmetic_matches_host((tree, expected) in arb_arith()) {
        let result = run(vec![expr(tree)]);
        prop_assert_eq!(result, Value::Int(expected));
    }

    /// However many expression statements run, the operand stack ends with
    /// exactly the last value.
    #[test]
    fn run_leaves_one_value(values in prop::collection::vec(arb_small_int(), 1..20)) {
        let statements: Vec<Statement> = values.iter().map(|n| expr(int(*n))).collect();
        let code = Compiler::new().compile(&program(statements)).unwrap();
        let mut vm = Vm::new();
        let result = vm.run(&Context::background(), &code).unwrap();
        prop_assert_eq!(result, Value::Int(*values.last().unwrap()));
        prop_assert_eq!(vm.stack_len(), 1);
    }

    /// A range loop visits every list item in order.
    #[test]
    fn range_loop_sums_items(values in prop::collection::vec(arb_small_int(), 0..20)) {
        let items = values.iter().map(|n| int(*n)).collect();
        let result = run(vec![
            var("sum", int(0)),
            for_range(
                &["_", "v"],
                list(items),
                vec![assign_op("sum", AssignOp::Add, ident("v"))],
            ),
            expr(ident("sum")),
        ]);
        prop_assert_eq!(result, Value::Int(values.iter().sum()));
    }

    /// Slicing a list agrees with slicing a Vec.
    #[test]
    fn list_slices_match_vec(
        values in prop::collection::vec(arb_small_int(), 0..10),
        a in 0usize..12,
        b in 0usize..12,
    ) {
        let items = values.iter().map(|n| int(*n)).collect();
        let result = run(vec![expr(slice(list(items), Some(int(a as i64)), Some(int(b as i64))))]);
        if a <= b && b <= values.len() {
            prop_assert_eq!(result, ints(&values[a..b]));
        } else {
            prop_assert!(result.is_error(), "expected a slice error, got {}", result);
        }
    }

    /// Incremental batches see earlier globals.
    #[test]
    fn batches_accumulate(steps in prop::collection::vec(arb_small_int(), 1..10)) {
        let mut compiler = Compiler::new();
        let mut vm = Vm::new();
        let ctx = Context::background();
        let code = compiler.compile(&program(vec![var("acc", int(0))])).unwrap();
        vm.run(&ctx, &code).unwrap();
        for step in &steps {
            let code = compiler
                .compile(&program(vec![assign_op("acc", AssignOp::Add, int(*step))]))
                .unwrap();
            vm.run(&ctx, &code).unwrap();
        }
        let code = compiler.compile(&program(vec![expr(ident("acc"))])).unwrap();
        prop_assert_eq!(vm.run(&ctx, &code).unwrap(), Value::Int(steps.iter().sum()));
    }
}
