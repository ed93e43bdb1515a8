// kiln-ast - Syntax tree contract for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Terse constructors for building syntax trees by hand.

use crate::node::{AssignTarget, Block, Case, Expr, For, Fragment, Func, Param, Program, Statement};
use crate::ops::{AssignOp, InfixOp, PostfixOp, PrefixOp};

// =============================================================================
// Containers
// =============================================================================

pub fn program(statements: Vec<Statement>) -> Program {
    Program::new(statements)
}

pub fn block(statements: Vec<Statement>) -> Block {
    Block::new(statements)
}

// =============================================================================
// Literals & Names
// =============================================================================

pub fn nil() -> Expr {
    Expr::Nil
}

pub fn boolean(value: bool) -> Expr {
    Expr::Bool(value)
}

pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn float(value: f64) -> Expr {
    Expr::Float(value)
}

pub fn string(value: impl Into<String>) -> Expr {
    Expr::Str(value.into())
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn template(fragments: Vec<Fragment>) -> Expr {
    Expr::Template(fragments)
}

pub fn text(value: impl Into<String>) -> Fragment {
    Fragment::Text(value.into())
}

pub fn hole(expr: Expr) -> Fragment {
    Fragment::Expr(Some(expr))
}

pub fn list(items: Vec<Expr>) -> Expr {
    Expr::List(items)
}

pub fn map(entries: Vec<(Expr, Expr)>) -> Expr {
    Expr::Map(entries)
}

pub fn set(items: Vec<Expr>) -> Expr {
    Expr::Set(items)
}

// =============================================================================
// Operators
// =============================================================================

pub fn infix(left: Expr, op: InfixOp, right: Expr) -> Expr {
    Expr::Infix {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn add(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Add, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Sub, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Mul, right)
}

pub fn div(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Div, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Lt, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Eq, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::And, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    infix(left, InfixOp::Or, right)
}

pub fn neg(right: Expr) -> Expr {
    Expr::Prefix {
        op: PrefixOp::Neg,
        right: Box::new(right),
    }
}

pub fn not(right: Expr) -> Expr {
    Expr::Prefix {
        op: PrefixOp::Not,
        right: Box::new(right),
    }
}

pub fn contains(item: Expr, container: Expr) -> Expr {
    Expr::In {
        item: Box::new(item),
        container: Box::new(container),
        negated: false,
    }
}

pub fn pipe(stages: Vec<Expr>) -> Expr {
    Expr::Pipe(stages)
}

// =============================================================================
// Control Expressions
// =============================================================================

pub fn if_else(cond: Expr, consequence: Block, alternative: Option<Block>) -> Expr {
    Expr::If {
        cond: Box::new(cond),
        consequence,
        alternative,
    }
}

pub fn ternary(cond: Expr, if_true: Expr, if_false: Expr) -> Expr {
    Expr::Ternary {
        cond: Box::new(cond),
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
    }
}

pub fn switch(value: Expr, cases: Vec<Case>, default: Option<Block>) -> Expr {
    Expr::Switch {
        value: Box::new(value),
        cases,
        default,
    }
}

pub fn case(exprs: Vec<Expr>, body: Block) -> Case {
    Case {
        exprs,
        body: Some(body),
    }
}

// =============================================================================
// Calls & Access
// =============================================================================

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func: Box::new(func),
        args,
    }
}

pub fn method(object: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::MethodCall {
        object: Box::new(object),
        method: name.into(),
        args,
    }
}

pub fn attr(object: Expr, name: impl Into<String>) -> Expr {
    Expr::GetAttr {
        object: Box::new(object),
        name: name.into(),
    }
}

pub fn index(object: Expr, index: Expr) -> Expr {
    Expr::Index {
        object: Box::new(object),
        index: Box::new(index),
    }
}

pub fn slice(object: Expr, from: Option<Expr>, to: Option<Expr>) -> Expr {
    Expr::Slice {
        object: Box::new(object),
        from: from.map(Box::new),
        to: to.map(Box::new),
    }
}

// =============================================================================
// Functions
// =============================================================================

pub fn param(name: impl Into<String>) -> Param {
    Param {
        name: name.into(),
        default: None,
    }
}

pub fn param_default(name: impl Into<String>, default: Expr) -> Param {
    Param {
        name: name.into(),
        default: Some(default),
    }
}

/// Anonymous function with plain parameters.
pub fn lambda(params: &[&str], body: Vec<Statement>) -> Expr {
    Expr::Func(Box::new(Func {
        name: None,
        params: params.iter().map(|p| param(*p)).collect(),
        body: block(body),
    }))
}

/// Anonymous function with full parameter control.
pub fn lambda_with(params: Vec<Param>, body: Vec<Statement>) -> Expr {
    Expr::Func(Box::new(Func {
        name: None,
        params,
        body: block(body),
    }))
}

/// Named function declaration.
pub fn func(name: impl Into<String>, params: &[&str], body: Vec<Statement>) -> Statement {
    Statement::Func(Func {
        name: Some(name.into()),
        params: params.iter().map(|p| param(*p)).collect(),
        body: block(body),
    })
}

/// Named function declaration with full parameter control.
pub fn func_with(name: impl Into<String>, params: Vec<Param>, body: Vec<Statement>) -> Statement {
    Statement::Func(Func {
        name: Some(name.into()),
        params,
        body: block(body),
    })
}

// =============================================================================
// Statements
// =============================================================================

pub fn expr(expr: Expr) -> Statement {
    Statement::Expr(expr)
}

pub fn var(name: impl Into<String>, value: Expr) -> Statement {
    Statement::Var {
        name: name.into(),
        value,
    }
}

pub fn multi_var(names: &[&str], value: Expr) -> Statement {
    Statement::MultiVar {
        names: names.iter().map(|n| n.to_string()).collect(),
        value,
    }
}

pub fn constant(name: impl Into<String>, value: Expr) -> Statement {
    Statement::Const {
        name: name.into(),
        value,
    }
}

pub fn assign(name: impl Into<String>, value: Expr) -> Statement {
    assign_op(name, AssignOp::Assign, value)
}

pub fn assign_op(name: impl Into<String>, op: AssignOp, value: Expr) -> Statement {
    Statement::Assign {
        target: AssignTarget::Name(name.into()),
        op,
        value,
    }
}

pub fn set_index(object: Expr, index: Expr, value: Expr) -> Statement {
    Statement::Assign {
        target: AssignTarget::Index { object, index },
        op: AssignOp::Assign,
        value,
    }
}

pub fn set_attr(object: Expr, name: impl Into<String>, value: Expr) -> Statement {
    Statement::SetAttr {
        object,
        name: name.into(),
        value,
    }
}

pub fn inc(name: impl Into<String>) -> Statement {
    Statement::Postfix {
        name: name.into(),
        op: PostfixOp::Inc,
    }
}

pub fn dec(name: impl Into<String>) -> Statement {
    Statement::Postfix {
        name: name.into(),
        op: PostfixOp::Dec,
    }
}

pub fn ret(value: Expr) -> Statement {
    Statement::Return(Some(value))
}

pub fn ret_nil() -> Statement {
    Statement::Return(None)
}

pub fn brk() -> Statement {
    Statement::Break
}

pub fn cont() -> Statement {
    Statement::Continue
}

pub fn for_loop(body: Vec<Statement>) -> Statement {
    Statement::For(For::Loop { body: block(body) })
}

pub fn for_cond(cond: Expr, body: Vec<Statement>) -> Statement {
    Statement::For(For::Condition {
        cond,
        body: block(body),
    })
}

pub fn for_classic(
    init: Option<Statement>,
    cond: Option<Expr>,
    post: Option<Statement>,
    body: Vec<Statement>,
) -> Statement {
    Statement::For(For::Classic {
        init: init.map(Box::new),
        cond,
        post: post.map(Box::new),
        body: block(body),
    })
}

pub fn for_range(names: &[&str], iterable: Expr, body: Vec<Statement>) -> Statement {
    Statement::For(For::Range {
        names: names.iter().map(|n| n.to_string()).collect(),
        iterable,
        body: block(body),
    })
}
