// kiln-vm - Threads, channels, cancellation and limits
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use kiln_vm::{Interrupt, StandardLimits};
use pretty_assertions::assert_eq;

fn run_concurrent(statements: Vec<Statement>) -> Value {
    try_run_with(
        Builtins::new().with_concurrency(),
        &Context::background().with_timeout(Duration::from_secs(10)),
        statements,
    )
    .unwrap_or_else(|err| panic!("run failed: {err}"))
}

// =============================================================================
// Threads & channels
// =============================================================================

#[test]
fn test_spawn_and_wait() {
    let value = run_concurrent(vec![
        var(
            "t",
            call(
                ident("spawn"),
                vec![
                    lambda(&["a", "b"], vec![ret(mul(ident("a"), ident("b")))]),
                    int(6),
                    int(7),
                ],
            ),
        ),
        expr(method(ident("t"), "wait", vec![])),
    ]);
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_threads_share_globals() {
    let value = run_concurrent(vec![
        var("x", int(0)),
        var(
            "t",
            call(ident("spawn"), vec![lambda(&[], vec![assign("x", int(9))])]),
        ),
        expr(method(ident("t"), "wait", vec![])),
        expr(ident("x")),
    ]);
    assert_eq!(value, Value::Int(9));
}

#[test]
fn test_threads_share_captured_cells() {
    let value = run_concurrent(vec![
        func(
            "outer",
            &[],
            vec![
                var("x", int(1)),
                expr(method(
                    call(ident("spawn"), vec![lambda(&[], vec![assign("x", int(9))])]),
                    "wait",
                    vec![],
                )),
                ret(ident("x")),
            ],
        ),
        expr(call(ident("outer"), vec![])),
    ]);
    assert_eq!(value, Value::Int(9));
}

#[test]
fn test_buffered_channel() {
    let value = run_concurrent(vec![
        var("c", call(ident("chan"), vec![int(1)])),
        expr(call(
            ident("spawn"),
            vec![lambda(&[], vec![expr(method(ident("c"), "send", vec![int(5)]))])],
        )),
        expr(method(ident("c"), "recv", vec![])),
    ]);
    assert_eq!(value, Value::Int(5));
}

#[test]
fn test_unbuffered_channel_until_closed() {
    let producer = lambda(
        &[],
        vec![
            for_classic(
                Some(var("i", int(0))),
                Some(lt(ident("i"), int(4))),
                Some(inc("i")),
                vec![expr(method(ident("c"), "send", vec![ident("i")]))],
            ),
            expr(method(ident("c"), "close", vec![])),
        ],
    );
    let value = run_concurrent(vec![
        var("c", call(ident("chan"), vec![])),
        expr(call(ident("spawn"), vec![producer])),
        var("sum", int(0)),
        for_loop(vec![
            var("v", method(ident("c"), "recv", vec![])),
            expr(if_else(eq(ident("v"), nil()), block(vec![brk()]), None)),
            assign_op("sum", AssignOp::Add, ident("v")),
        ]),
        expr(ident("sum")),
    ]);
    assert_eq!(value, Value::Int(6));
}

#[test]
fn test_worker_error_surfaces_on_wait() {
    let err = try_run_with(
        Builtins::new().with_concurrency(),
        &Context::background(),
        vec![expr(method(
            call(ident("spawn"), vec![lambda(&[], vec![expr(call(int(1), vec![]))])]),
            "wait",
            vec![],
        ))],
    )
    .unwrap_err();
    assert_eq!(err, RuntimeError::NotCallable("int"));
}

#[test]
fn test_chan_rejects_bad_size() {
    let value = run_concurrent(vec![expr(call(ident("chan"), vec![int(-1)]))]);
    assert!(value.is_error());
}

// =============================================================================
// Cancellation & deadlines
// =============================================================================

#[test]
fn test_deadline_stops_an_infinite_loop() {
    let ctx = Context::background().with_timeout(Duration::from_millis(20));
    let err = try_run_with(Builtins::new(), &ctx, vec![for_loop(vec![])]).unwrap_err();
    assert_eq!(err, RuntimeError::Interrupted(Interrupt::DeadlineExceeded));
    assert_eq!(err.to_string(), "context deadline exceeded");
}

#[test]
fn test_cancel_from_another_thread() {
    let (ctx, cancel) = Context::background().with_cancel();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();
    });
    let err = try_run_with(Builtins::new(), &ctx, vec![for_loop(vec![])]).unwrap_err();
    canceller.join().unwrap();
    assert_eq!(err, RuntimeError::Interrupted(Interrupt::Cancelled));
}

#[test]
fn test_cancelling_a_parent_cancels_the_child() {
    let (parent, cancel) = Context::background().with_cancel();
    let (child, _child_cancel) = parent.with_cancel();
    cancel.cancel();
    let err = try_run_with(
        Builtins::new().with_concurrency(),
        &child,
        vec![expr(method(call(ident("chan"), vec![]), "recv", vec![]))],
    )
    .unwrap_err();
    assert_eq!(err, RuntimeError::Interrupted(Interrupt::Cancelled));
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_cost_limit() {
    let limits = Arc::new(StandardLimits::new().max_cost(5));
    let ctx = Context::background().with_limits(limits.clone());
    let err = try_run_with(
        Builtins::new(),
        &ctx,
        vec![expr(list(vec![int(1), int(2), int(3), int(4), int(5), int(6)]))],
    )
    .unwrap_err();
    assert!(err.is_limit());
    assert_eq!(err.to_string(), "limit error: reached maximum processing cost (5)");
}

#[test]
fn test_cost_under_the_limit() {
    let limits = Arc::new(StandardLimits::new().max_cost(100));
    let ctx = Context::background().with_limits(limits.clone());
    let value = try_run_with(
        Builtins::new(),
        &ctx,
        vec![expr(add(string("ab"), string("c"))), expr(template(vec![text("xyz")]))],
    )
    .unwrap();
    assert_eq!(value, Value::string("xyz"));
    assert_eq!(limits.cost(), 3);
}
