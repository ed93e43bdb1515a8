// kiln-embed integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests for the kiln-embed embedding API.

use std::collections::HashMap;
use std::time::Duration;

use kiln_ast::build::*;
use kiln_embed::{
    Builtins, CompileError, Context, Engine, Error, ErrorValue, Interrupt, IntoValue,
    RuntimeError, Value, VmConfig,
};

// =============================================================================
// Evaluation
// =============================================================================

mod evaluation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn batches_share_globals() {
        let mut engine = Engine::new();
        assert_eq!(engine.eval(&program(vec![var("x", int(40))])).unwrap(), Value::Nil);
        let result = engine
            .eval(&program(vec![expr(add(ident("x"), int(2)))]))
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn compile_then_run() {
        let mut engine = Engine::new();
        let code = engine
            .compile(&program(vec![expr(string("later"))]))
            .unwrap();
        assert_eq!(engine.run(&code).unwrap(), Value::string("later"));
    }

    #[test]
    fn compile_errors() {
        let mut engine = Engine::new();
        let err = engine
            .eval(&program(vec![expr(ident("missing"))]))
            .unwrap_err();
        assert_eq!(err, Error::Compile(CompileError::Undefined("missing".into())));
    }

    #[test]
    fn runtime_errors() {
        let mut engine = Engine::new();
        let err = engine
            .eval(&program(vec![expr(call(int(1), vec![]))]))
            .unwrap_err();
        assert_eq!(err, Error::Runtime(RuntimeError::NotCallable("int")));

        // The engine stays usable after a failed run.
        assert_eq!(
            engine.eval(&program(vec![expr(int(5))])).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn top_level_error_value_is_a_script_error() {
        let mut engine = Engine::new();
        let err = engine
            .eval(&program(vec![expr(index(list(vec![]), int(0)))]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Script(ErrorValue::new("index error: index out of range: 0"))
        );
    }

    #[test]
    fn error_values_inside_a_script_are_data() {
        let mut engine = Engine::new();
        let result = engine
            .eval(&program(vec![
                var("e", index(list(vec![]), int(0))),
                expr(method(ident("e"), "message", vec![])),
            ]))
            .unwrap();
        assert_eq!(result, Value::string("index error: index out of range: 0"));
    }
}

// =============================================================================
// Globals
// =============================================================================

mod globals {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_and_read_from_script() {
        let mut engine = Engine::new();
        engine.set("limit", 21i64).unwrap();
        let result = engine
            .eval(&program(vec![expr(mul(ident("limit"), int(2)))]))
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn get_and_get_as() {
        let mut engine = Engine::new();
        engine
            .eval(&program(vec![
                var("name", string("kiln")),
                var("items", list(vec![int(1), int(2)])),
                var("nothing", nil()),
            ]))
            .unwrap();
        assert_eq!(engine.get("name"), Some(Value::string("kiln")));
        assert_eq!(engine.get_as::<Vec<i64>>("items").unwrap(), vec![1, 2]);
        assert_eq!(engine.get_as::<Option<i64>>("nothing").unwrap(), None);
        assert_eq!(engine.get("missing"), None);
        assert_eq!(
            engine.get_as::<i64>("missing").unwrap_err(),
            Error::Undefined("missing".into())
        );
    }

    #[test]
    fn wrong_type_is_a_conversion_error() {
        let mut engine = Engine::new();
        engine.set("name", "kiln").unwrap();
        assert_eq!(
            engine.get_as::<i64>("name").unwrap_err(),
            Error::Conversion {
                expected: "int",
                got: "string".into()
            }
        );
    }

    #[test]
    fn host_collections_are_shared_with_scripts() {
        let mut engine = Engine::new();
        let mut config = HashMap::new();
        config.insert("retries".to_string(), 3i64);
        engine.set("config", config).unwrap();
        engine.set("log", Vec::<String>::new()).unwrap();
        engine
            .eval(&program(vec![expr(method(
                ident("log"),
                "append",
                vec![string("started")],
            ))]))
            .unwrap();
        assert_eq!(engine.get_as::<Vec<String>>("log").unwrap(), vec!["started"]);
        let result = engine
            .eval(&program(vec![expr(index(ident("config"), string("retries")))]))
            .unwrap();
        assert_eq!(result, Value::Int(3));
    }
}

// =============================================================================
// Calls & native functions
// =============================================================================

mod functions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn call_script_function() {
        let mut engine = Engine::new();
        engine
            .eval(&program(vec![func(
                "add",
                &["a", "b"],
                vec![ret(add(ident("a"), ident("b")))],
            )]))
            .unwrap();
        let result = engine
            .call("add", vec![2i64.into_value(), 3i64.into_value()])
            .unwrap();
        assert_eq!(result, Value::Int(5));
        assert_eq!(
            engine.call("nope", vec![]).unwrap_err(),
            Error::Undefined("nope".into())
        );
    }

    #[test]
    fn call_with_wrong_argument_count() {
        let mut engine = Engine::new();
        engine
            .eval(&program(vec![func("one", &["a"], vec![ret(ident("a"))])]))
            .unwrap();
        let err = engine.call("one", vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument error: one() takes 1 arguments (0 given)"
        );
    }

    #[test]
    fn native_function() {
        let mut engine = Engine::new();
        engine
            .register_native("shout", |args| {
                let [text] = args else {
                    return Ok(Value::error("shout() takes 1 argument"));
                };
                let text: String = kiln_embed::from_value(text)?;
                Ok(format!("{}!", text.to_uppercase()).into_value())
            })
            .unwrap();
        let result = engine
            .eval(&program(vec![expr(call(ident("shout"), vec![string("hi")]))]))
            .unwrap();
        assert_eq!(result, Value::string("HI!"));
    }

    #[test]
    fn native_errors_abort_as_script_errors() {
        let mut engine = Engine::new();
        engine
            .register_native("need_int", |args| {
                let n: i64 = kiln_embed::from_value(&args[0])?;
                Ok(Value::Int(n))
            })
            .unwrap();
        let err = engine
            .eval(&program(vec![
                expr(call(ident("need_int"), vec![string("x")])),
                expr(int(1)),
            ]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script error: conversion error: expected int, got string"
        );
    }

    #[test]
    fn builtin_calls_back_into_script() {
        let mut engine = Engine::new();
        engine
            .register_builtin("twice", |cx, args| {
                let once = cx.call(&args[0], vec![args[1].clone()])?;
                cx.call(&args[0], vec![once])
            })
            .unwrap();
        let result = engine
            .eval(&program(vec![expr(call(
                ident("twice"),
                vec![
                    lambda(&["n"], vec![ret(add(ident("n"), int(3)))]),
                    int(1),
                ],
            ))]))
            .unwrap();
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn reregistering_replaces_the_function() {
        let mut engine = Engine::new();
        engine.register_native("v", |_| Ok(Value::Int(1))).unwrap();
        engine.register_native("v", |_| Ok(Value::Int(2))).unwrap();
        let result = engine
            .eval(&program(vec![expr(call(ident("v"), vec![]))]))
            .unwrap();
        assert_eq!(result, Value::Int(2));
    }
}

// =============================================================================
// Builder
// =============================================================================

mod builder {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prebuilt_builtins() {
        let mut builtins = Builtins::new();
        builtins.register("seven", |_, _| Ok(Value::Int(7)));
        let mut engine = Engine::builder().builtins(builtins).build().unwrap();
        let result = engine
            .eval(&program(vec![expr(call(ident("seven"), vec![]))]))
            .unwrap();
        assert_eq!(result, Value::Int(7));

        // Natives registered later get the next index.
        engine.register_native("eight", |_| Ok(Value::Int(8))).unwrap();
        let result = engine
            .eval(&program(vec![expr(add(
                call(ident("seven"), vec![]),
                call(ident("eight"), vec![]),
            ))]))
            .unwrap();
        assert_eq!(result, Value::Int(15));
    }

    #[test]
    fn concurrency() {
        let mut engine = Engine::builder().concurrency().build().unwrap();
        let result = engine
            .eval(&program(vec![expr(method(
                call(
                    ident("spawn"),
                    vec![lambda(&["n"], vec![ret(mul(ident("n"), int(2)))]), int(21)],
                ),
                "wait",
                vec![],
            ))]))
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn config_limits_recursion() {
        let mut engine = Engine::builder()
            .config(VmConfig::default().max_frames(16))
            .build()
            .unwrap();
        let err = engine
            .eval(&program(vec![
                func("f", &[], vec![ret(call(ident("f"), vec![]))]),
                expr(call(ident("f"), vec![])),
            ]))
            .unwrap_err();
        assert_eq!(err, Error::Runtime(RuntimeError::StackOverflow));
    }

    #[test]
    fn context_deadline() {
        let mut engine = Engine::builder()
            .context(Context::background().with_timeout(Duration::from_millis(20)))
            .build()
            .unwrap();
        let err = engine.eval(&program(vec![for_loop(vec![])])).unwrap_err();
        assert_eq!(
            err,
            Error::Runtime(RuntimeError::Interrupted(Interrupt::DeadlineExceeded))
        );
    }

    #[test]
    fn replacing_the_context() {
        let (ctx, cancel) = Context::background().with_cancel();
        let mut engine = Engine::new();
        engine.set_context(ctx);
        cancel.cancel();
        let err = engine.eval(&program(vec![for_loop(vec![])])).unwrap_err();
        assert_eq!(
            err,
            Error::Runtime(RuntimeError::Interrupted(Interrupt::Cancelled))
        );
    }
}
