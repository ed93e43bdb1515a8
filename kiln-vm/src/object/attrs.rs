// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Attribute lookup. Methods come back as builtins bound to their receiver.

use std::sync::Arc;

use super::{Builtin, ErrorValue, Value};
use crate::builtins::{CallContext, check_arity};
use crate::vm::Result;

fn method<F>(name: &'static str, f: F) -> Value
where
    F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Value::builtin(Builtin::new(name, f))
}

fn string_arg(method: &str, value: &Value) -> std::result::Result<Arc<str>, Value> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(Value::type_error(format_args!(
            "{method}() expected a string argument (got {})",
            other.type_name()
        ))),
    }
}

impl Value {
    /// Look up `self.name`. `None` means the attribute does not exist.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::List(list) => {
                let list = list.clone();
                match name {
                    "append" => Some(method("append", move |_, args| {
                        for arg in args {
                            list.push(arg.clone());
                        }
                        Ok(Value::List(list.clone()))
                    })),
                    "pop" => Some(method("pop", move |_, args| {
                        check_arity("pop", args, 0)?;
                        Ok(list
                            .pop()
                            .unwrap_or_else(|| Value::error("index error: pop from empty list")))
                    })),
                    "len" => Some(method("len", move |_, args| {
                        check_arity("len", args, 0)?;
                        Ok(Value::Int(list.len() as i64))
                    })),
                    _ => None,
                }
            }
            Value::Map(map) => {
                let map = map.clone();
                match name {
                    "keys" => Some(method("keys", move |_, args| {
                        check_arity("keys", args, 0)?;
                        Ok(Value::list(map.snapshot().keys().cloned().map(Value::String)))
                    })),
                    "values" => Some(method("values", move |_, args| {
                        check_arity("values", args, 0)?;
                        Ok(Value::list(map.snapshot().values().cloned()))
                    })),
                    "get" => Some(method("get", move |_, args| {
                        if args.is_empty() || args.len() > 2 {
                            check_arity("get", args, 2)?;
                        }
                        let key = match string_arg("get", &args[0]) {
                            Ok(key) => key,
                            Err(err) => return Ok(err),
                        };
                        Ok(map
                            .get(&key)
                            .or_else(|| args.get(1).cloned())
                            .unwrap_or_default())
                    })),
                    "delete" => Some(method("delete", move |_, args| {
                        check_arity("delete", args, 1)?;
                        let key = match string_arg("delete", &args[0]) {
                            Ok(key) => key,
                            Err(err) => return Ok(err),
                        };
                        map.remove(&key);
                        Ok(Value::Nil)
                    })),
                    _ => None,
                }
            }
            Value::String(s) => {
                let s = s.clone();
                match name {
                    "upper" => Some(method("upper", move |_, args| {
                        check_arity("upper", args, 0)?;
                        Ok(Value::string(s.to_uppercase()))
                    })),
                    "lower" => Some(method("lower", move |_, args| {
                        check_arity("lower", args, 0)?;
                        Ok(Value::string(s.to_lowercase()))
                    })),
                    "split" => Some(method("split", move |_, args| {
                        check_arity("split", args, 1)?;
                        let sep = match string_arg("split", &args[0]) {
                            Ok(sep) => sep,
                            Err(err) => return Ok(err),
                        };
                        Ok(Value::list(s.split(&*sep).map(Value::string)))
                    })),
                    "contains" => Some(method("contains", move |_, args| {
                        check_arity("contains", args, 1)?;
                        let sub = match string_arg("contains", &args[0]) {
                            Ok(sub) => sub,
                            Err(err) => return Ok(err),
                        };
                        Ok(Value::Bool(s.contains(&*sub)))
                    })),
                    _ => None,
                }
            }
            Value::Error(err) => {
                let err = err.clone();
                match name {
                    "message" => Some(method("message", move |_, args| {
                        check_arity("message", args, 0)?;
                        Ok(Value::string(err.message()))
                    })),
                    _ => None,
                }
            }
            Value::Thread(thread) => {
                let thread = thread.clone();
                match name {
                    "wait" => Some(method("wait", move |cx, args| {
                        check_arity("wait", args, 0)?;
                        thread.wait(cx.ctx())
                    })),
                    _ => None,
                }
            }
            Value::Chan(chan) => {
                let chan = chan.clone();
                match name {
                    "send" => Some(method("send", move |cx, args| {
                        check_arity("send", args, 1)?;
                        chan.send(cx.ctx(), args[0].clone())?;
                        Ok(Value::Nil)
                    })),
                    "recv" => Some(method("recv", move |cx, args| {
                        check_arity("recv", args, 0)?;
                        chan.recv(cx.ctx())
                    })),
                    "close" => Some(method("close", move |_, args| {
                        check_arity("close", args, 0)?;
                        chan.close();
                        Ok(Value::Nil)
                    })),
                    "len" => Some(method("len", move |_, args| {
                        check_arity("len", args, 0)?;
                        Ok(Value::Int(chan.len() as i64))
                    })),
                    _ => None,
                }
            }
            Value::Custom(obj) => obj.get_attr(name),
            _ => None,
        }
    }

    /// Assign `self.name = value`.
    pub fn set_attr(&self, name: &str, value: Value) -> std::result::Result<(), ErrorValue> {
        match self {
            Value::Custom(obj) => obj.set_attr(name, value),
            other => Err(ErrorValue::type_error(format_args!(
                "cannot set attribute {name:?} on {} object",
                other.type_name()
            ))),
        }
    }
}
