// kiln-vm - End to end evaluation tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::*;
use pretty_assertions::assert_eq;

// =============================================================================
// Expressions
// =============================================================================

#[test]
fn test_arithmetic() {
    assert_run!(vec![expr(add(int(2), mul(int(3), int(4))))], Value::Int(14));
    assert_run!(vec![expr(sub(int(2), int(5)))], Value::Int(-3));
    assert_run!(vec![expr(div(int(7), int(2)))], Value::Int(3));
    assert_run!(vec![expr(add(int(1), float(0.5)))], Value::Float(1.5));
    assert_run!(vec![expr(infix(int(7), InfixOp::Mod, int(4)))], Value::Int(3));
    assert_run!(vec![expr(neg(int(5)))], Value::Int(-5));
}

#[test]
fn test_strings() {
    assert_run!(vec![expr(add(string("ab"), string("cd")))], Value::string("abcd"));
    assert_run!(
        vec![expr(template(vec![
            text("x = "),
            hole(add(int(1), int(2))),
            text(", s = "),
            hole(string("raw")),
        ]))],
        Value::string("x = 3, s = raw")
    );
}

#[test]
fn test_error_values_flow_as_data() {
    assert_run!(
        vec![expr(div(int(1), int(0)))],
        Value::error("value error: division by zero")
    );
    let value = run(vec![expr(add(int(1), string("x")))]);
    assert!(value.is_error(), "expected an error value, got {value}");
    // Error values are falsy.
    assert_run!(
        vec![expr(ternary(div(int(1), int(0)), string("yes"), string("no")))],
        Value::string("no")
    );
}

#[test]
fn test_logic() {
    assert_run!(vec![expr(or(int(0), string("x")))], Value::string("x"));
    assert_run!(vec![expr(and(int(1), int(2)))], Value::Int(2));
    // The right operand is never evaluated.
    assert_run!(
        vec![expr(and(boolean(false), div(int(1), int(0))))],
        Value::Bool(false)
    );
    assert_run!(vec![expr(not(int(0)))], Value::Bool(true));
    assert_run!(vec![expr(lt(int(1), float(1.5)))], Value::Bool(true));
    assert_run!(vec![expr(eq(int(2), float(2.0)))], Value::Bool(true));
}

#[test]
fn test_if_expressions() {
    assert_run!(
        vec![expr(if_else(
            lt(int(1), int(2)),
            block(vec![expr(string("yes"))]),
            Some(block(vec![expr(string("no"))])),
        ))],
        Value::string("yes")
    );
    assert_run!(
        vec![expr(if_else(boolean(false), block(vec![expr(int(1))]), None))],
        Value::Nil
    );
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn test_lists() {
    assert_run!(
        vec![expr(index(list(vec![int(10), int(20), int(30)]), int(-1)))],
        Value::Int(30)
    );
    assert_run!(
        vec![
            var("l", list(vec![int(1), int(2)])),
            set_index(ident("l"), int(0), int(9)),
            expr(method(ident("l"), "append", vec![int(3)])),
        ],
        ints(&[9, 2, 3])
    );
    assert_run!(
        vec![expr(contains(int(2), list(vec![int(1), int(2)])))],
        Value::Bool(true)
    );
}

#[test]
fn test_slices() {
    let items = || list(vec![int(1), int(2), int(3), int(4)]);
    assert_run!(vec![expr(slice(items(), Some(int(1)), None))], ints(&[2, 3, 4]));
    assert_run!(vec![expr(slice(items(), None, Some(int(-1))))], ints(&[1, 2, 3]));
    assert_run!(vec![expr(slice(items(), Some(int(4)), None))], ints(&[]));
    assert_run!(
        vec![expr(slice(string("hello"), None, Some(int(2))))],
        Value::string("he")
    );
    assert!(run(vec![expr(slice(items(), Some(int(3)), Some(int(1))))]).is_error());
}

#[test]
fn test_maps_and_sets() {
    let m = || map(vec![(string("a"), int(1)), (string("b"), int(2))]);
    assert_run!(vec![expr(index(m(), string("b")))], Value::Int(2));
    assert_run!(vec![expr(index(m(), string("zz")))], Value::Nil);
    assert_run!(
        vec![expr(method(m(), "keys", vec![]))],
        Value::list([Value::string("a"), Value::string("b")])
    );
    assert_run!(
        vec![expr(contains(int(2), set(vec![int(1), int(2), int(2)])))],
        Value::Bool(true)
    );
    assert_run!(
        vec![expr(contains(float(0.5), set(vec![float(0.5)])))],
        Value::Bool(true)
    );
}

#[test]
fn test_string_methods() {
    assert_run!(
        vec![expr(method(string("abc"), "upper", vec![]))],
        Value::string("ABC")
    );
    assert_run!(
        vec![expr(method(string("a,b"), "split", vec![string(",")]))],
        Value::list([Value::string("a"), Value::string("b")])
    );
}

// =============================================================================
// Variables & Scope
// =============================================================================

#[test]
fn test_globals() {
    assert_run!(
        vec![var("x", int(40)), assign("x", add(ident("x"), int(2))), expr(ident("x"))],
        Value::Int(42)
    );
    assert_run!(
        vec![
            var("x", int(10)),
            assign_op("x", AssignOp::Mul, int(3)),
            assign_op("x", AssignOp::Sub, int(5)),
            expr(ident("x")),
        ],
        Value::Int(25)
    );
    assert_run!(
        vec![var("i", int(0)), inc("i"), inc("i"), dec("i"), expr(ident("i"))],
        Value::Int(1)
    );
}

#[test]
fn test_multi_var() {
    assert_run!(
        vec![
            multi_var(&["a", "b"], list(vec![int(1), int(2)])),
            expr(sub(ident("a"), ident("b"))),
        ],
        Value::Int(-1)
    );
}

#[test]
fn test_block_scopes_shadow() {
    assert_run!(
        vec![
            var("x", int(1)),
            expr(if_else(boolean(true), block(vec![var("x", int(2))]), None)),
            expr(ident("x")),
        ],
        Value::Int(1)
    );
}

#[test]
fn test_statement_only_program_is_nil() {
    assert_run!(vec![var("x", int(1))], Value::Nil);
    assert_run!(vec![], Value::Nil);
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn test_function_calls() {
    assert_run!(
        vec![
            func("add2", &["a", "b"], vec![ret(add(ident("a"), ident("b")))]),
            expr(call(ident("add2"), vec![int(1), int(2)])),
        ],
        Value::Int(3)
    );
}

#[test]
fn test_implicit_return_is_block_value() {
    assert_run!(
        vec![
            func("seven", &[], vec![expr(int(7))]),
            expr(call(ident("seven"), vec![])),
        ],
        Value::Int(7)
    );
    assert_run!(
        vec![
            func("nothing", &[], vec![var("x", int(1))]),
            expr(call(ident("nothing"), vec![])),
        ],
        Value::Nil
    );
    assert_run!(
        vec![
            func("early", &[], vec![ret_nil(), expr(int(1))]),
            expr(call(ident("early"), vec![])),
        ],
        Value::Nil
    );
}

#[test]
fn test_recursion() {
    let fib = func(
        "fib",
        &["n"],
        vec![
            expr(if_else(
                lt(ident("n"), int(2)),
                block(vec![ret(ident("n"))]),
                None,
            )),
            ret(add(
                call(ident("fib"), vec![sub(ident("n"), int(1))]),
                call(ident("fib"), vec![sub(ident("n"), int(2))]),
            )),
        ],
    );
    assert_run!(vec![fib, expr(call(ident("fib"), vec![int(10)]))], Value::Int(55));
}

#[test]
fn test_default_parameters() {
    let f = || {
        func_with(
            "f",
            vec![param("a"), param_default("b", int(10))],
            vec![ret(add(ident("a"), ident("b")))],
        )
    };
    assert_run!(vec![f(), expr(call(ident("f"), vec![int(1)]))], Value::Int(11));
    assert_run!(vec![f(), expr(call(ident("f"), vec![int(1), int(2)]))], Value::Int(3));
    assert_run!(
        vec![
            func_with("g", vec![param_default("x", neg(int(1)))], vec![ret(ident("x"))]),
            expr(call(ident("g"), vec![])),
        ],
        Value::Int(-1)
    );
}

#[test]
fn test_closure_counter() {
    let make = func(
        "make",
        &[],
        vec![
            var("n", int(0)),
            ret(lambda(
                &[],
                vec![assign_op("n", AssignOp::Add, int(1)), ret(ident("n"))],
            )),
        ],
    );
    assert_run!(
        vec![
            make,
            var("c", call(ident("make"), vec![])),
            expr(call(ident("c"), vec![])),
            expr(call(ident("c"), vec![])),
        ],
        Value::Int(2)
    );
}

#[test]
fn test_closures_share_the_variable() {
    let f = func(
        "f",
        &[],
        vec![
            var("x", int(1)),
            var("g", lambda(&[], vec![ret(ident("x"))])),
            assign("x", int(5)),
            ret(call(ident("g"), vec![])),
        ],
    );
    assert_run!(vec![f, expr(call(ident("f"), vec![]))], Value::Int(5));
}

#[test]
fn test_closures_capture_through_levels() {
    let outer = func(
        "outer",
        &["a"],
        vec![ret(lambda(&[], vec![ret(lambda(&[], vec![ret(ident("a"))]))]))],
    );
    assert_run!(
        vec![
            outer,
            expr(call(call(call(ident("outer"), vec![int(5)]), vec![]), vec![])),
        ],
        Value::Int(5)
    );
}

#[test]
fn test_closure_in_block_uses_enclosing_free_index() {
    // `y` is captured first so `x` sits at free index 1 in the middle
    // function; the block inside it must reuse that index.
    let outer = func(
        "outer",
        &[],
        vec![
            var("x", int(10)),
            var("y", int(1)),
            ret(lambda(
                &[],
                vec![
                    var("unused", ident("y")),
                    expr(if_else(
                        boolean(true),
                        block(vec![
                            var("h", lambda(&[], vec![ret(ident("x"))])),
                            ret(call(ident("h"), vec![])),
                        ]),
                        None,
                    )),
                    ret(int(0)),
                ],
            )),
        ],
    );
    assert_run!(
        vec![outer, expr(call(call(ident("outer"), vec![]), vec![]))],
        Value::Int(10)
    );
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn test_condition_loop() {
    assert_run!(
        vec![
            var("i", int(0)),
            var("sum", int(0)),
            for_cond(
                lt(ident("i"), int(5)),
                vec![assign_op("sum", AssignOp::Add, ident("i")), inc("i")],
            ),
            expr(ident("sum")),
        ],
        Value::Int(10)
    );
}

#[test]
fn test_break_and_continue() {
    let body = vec![
        expr(if_else(eq(ident("i"), int(5)), block(vec![brk()]), None)),
        expr(if_else(
            eq(infix(ident("i"), InfixOp::Mod, int(2)), int(0)),
            block(vec![cont()]),
            None,
        )),
        assign_op("total", AssignOp::Add, ident("i")),
    ];
    assert_run!(
        vec![
            var("total", int(0)),
            for_classic(
                Some(var("i", int(0))),
                Some(lt(ident("i"), int(10))),
                Some(inc("i")),
                body,
            ),
            expr(ident("total")),
        ],
        Value::Int(4)
    );
}

#[test]
fn test_break_only_leaves_the_inner_loop() {
    let inner = for_classic(
        Some(var("j", int(0))),
        Some(lt(ident("j"), int(10))),
        Some(inc("j")),
        vec![
            expr(if_else(eq(ident("j"), int(2)), block(vec![brk()]), None)),
            inc("count"),
        ],
    );
    assert_run!(
        vec![
            var("count", int(0)),
            for_classic(
                Some(var("i", int(0))),
                Some(lt(ident("i"), int(3))),
                Some(inc("i")),
                vec![inner],
            ),
            expr(ident("count")),
        ],
        Value::Int(6)
    );
}

#[test]
fn test_range_loops() {
    assert_run!(
        vec![
            var("total", int(0)),
            for_range(
                &["i", "v"],
                list(vec![int(10), int(20), int(30)]),
                vec![assign_op("total", AssignOp::Add, add(ident("i"), ident("v")))],
            ),
            expr(ident("total")),
        ],
        Value::Int(63)
    );
    assert_run!(
        vec![
            var("s", string("")),
            for_range(
                &["k"],
                map(vec![(string("b"), int(2)), (string("a"), int(1))]),
                vec![assign("s", add(ident("s"), ident("k")))],
            ),
            expr(ident("s")),
        ],
        Value::string("ab")
    );
    assert_run!(
        vec![
            var("s", string("")),
            for_range(
                &["_", "c"],
                string("abc"),
                vec![assign("s", add(ident("c"), ident("s")))],
            ),
            expr(ident("s")),
        ],
        Value::string("cba")
    );
}

#[test]
fn test_range_loop_break_drops_the_iterator() {
    let mut vm = Vm::new();
    let code = Compiler::new()
        .compile(&program(vec![
            var("total", int(0)),
            for_range(
                &["_", "v"],
                list(vec![int(1), int(2), int(3), int(4)]),
                vec![
                    expr(if_else(eq(ident("v"), int(3)), block(vec![brk()]), None)),
                    assign_op("total", AssignOp::Add, ident("v")),
                ],
            ),
            expr(ident("total")),
        ]))
        .unwrap();
    assert_eq!(vm.run(&Context::background(), &code).unwrap(), Value::Int(3));
    assert_eq!(vm.stack_len(), 1);
}

// =============================================================================
// Switch & Pipes
// =============================================================================

#[test]
fn test_switch() {
    let switch_on = |value| {
        vec![expr(switch(
            value,
            vec![
                case(vec![int(1)], block(vec![expr(string("one"))])),
                case(vec![int(2), int(3)], block(vec![expr(string("two or three"))])),
            ],
            Some(block(vec![expr(string("other"))])),
        ))]
    };
    assert_run!(switch_on(int(1)), Value::string("one"));
    assert_run!(switch_on(int(3)), Value::string("two or three"));
    assert_run!(switch_on(int(9)), Value::string("other"));
    assert_run!(
        vec![expr(switch(int(9), vec![case(vec![int(1)], block(vec![]))], None))],
        Value::Nil
    );
}

#[test]
fn test_break_inside_switch_leaves_the_loop() {
    let mut vm = Vm::new();
    let code = Compiler::new()
        .compile(&program(vec![
            var("n", int(0)),
            for_loop(vec![
                inc("n"),
                expr(switch(
                    ident("n"),
                    vec![case(vec![int(3)], block(vec![brk()]))],
                    None,
                )),
            ]),
            expr(ident("n")),
        ]))
        .unwrap();
    assert_eq!(vm.run(&Context::background(), &code).unwrap(), Value::Int(3));
    assert_eq!(vm.stack_len(), 1);
}

#[test]
fn test_pipes() {
    let double = func("double", &["x"], vec![ret(mul(ident("x"), int(2)))]);
    let minus = func("minus", &["a", "b"], vec![ret(sub(ident("a"), ident("b")))]);
    assert_run!(
        vec![
            double,
            minus,
            expr(pipe(vec![
                int(10),
                call(ident("minus"), vec![int(3)]),
                ident("double"),
            ])),
        ],
        Value::Int(14)
    );
    // The piped value lands before the bound arguments.
    assert_run!(
        vec![expr(pipe(vec![
            string("b"),
            method(list(vec![]), "append", vec![string("a")]),
        ]))],
        Value::list([Value::string("b"), Value::string("a")])
    );
}

// =============================================================================
// Host integration
// =============================================================================

#[test]
fn test_host_builtins() {
    let mut builtins = Builtins::new();
    builtins.register("double", |_, args| {
        kiln_vm::check_arity("double", args, 1)?;
        Ok(args[0].run_operation(kiln_vm::BinaryOpType::Multiply, &Value::Int(2)))
    });
    builtins.register("apply", |cx, args| {
        let Some((f, rest)) = args.split_first() else {
            return Ok(Value::Nil);
        };
        cx.call(f, rest.to_vec())
    });
    let value = try_run_with(
        builtins,
        &Context::background(),
        vec![expr(call(
            ident("apply"),
            vec![
                lambda(&["x"], vec![ret(add(ident("x"), int(1)))]),
                call(ident("double"), vec![int(20)]),
            ],
        ))],
    )
    .unwrap();
    assert_eq!(value, Value::Int(41));
}

#[test]
fn test_raised_error_aborts_the_run() {
    let mut builtins = Builtins::new();
    builtins.register("fail", |_, _| Ok(Value::from(kiln_vm::ErrorValue::raised("boom"))));
    let err = try_run_with(
        Builtins::new(),
        &Context::background(),
        vec![expr(call(int(1), vec![]))],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "type error: object is not callable (got int)");

    let err = try_run_with(
        builtins,
        &Context::background(),
        vec![expr(call(ident("fail"), vec![])), expr(int(1))],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn test_unraised_builtin_error_is_a_value() {
    let mut builtins = Builtins::new();
    builtins.register("soft", |_, _| Ok(Value::error("soft")));
    let value = try_run_with(
        builtins,
        &Context::background(),
        vec![expr(call(ident("soft"), vec![]))],
    )
    .unwrap();
    assert_eq!(value, Value::error("soft"));
}

#[test]
fn test_host_call_into_script_function() {
    let mut compiler = Compiler::new();
    let mut vm = Vm::new();
    let ctx = Context::background();
    let code = compiler
        .compile(&program(vec![func(
            "square",
            &["x"],
            vec![ret(mul(ident("x"), ident("x")))],
        )]))
        .unwrap();
    vm.run(&ctx, &code).unwrap();
    let slot = compiler.global_index("square").unwrap() as usize;
    let square = vm.global(slot).unwrap();
    assert_eq!(vm.call(&ctx, &square, vec![Value::Int(9)]).unwrap(), Value::Int(81));
    assert_eq!(vm.state(), kiln_vm::VmState::Returned);
}

#[test]
fn test_run_leaves_only_the_result() {
    let mut vm = Vm::new();
    let code = Compiler::new()
        .compile(&program(vec![
            var("x", int(1)),
            expr(int(2)),
            expr(add(ident("x"), int(3))),
        ]))
        .unwrap();
    assert_eq!(vm.run(&Context::background(), &code).unwrap(), Value::Int(4));
    assert_eq!(vm.stack_len(), 1);
    assert_eq!(vm.tos(), Some(Value::Int(4)));
}
