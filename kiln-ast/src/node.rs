// kiln-ast - Syntax tree contract for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Statement and expression nodes.

use crate::ops::{AssignOp, InfixOp, PostfixOp, PrefixOp};

/// A whole program: the top-level statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// A braced statement list. Blocks evaluate to their last expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// True if the last statement is a `return`.
    pub fn ends_with_return(&self) -> bool {
        matches!(self.statements.last(), Some(Statement::Return(_)))
    }
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// `x = ...`
    Name(String),
    /// `obj[index] = ...`
    Index { object: Expr, index: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name := value`
    Var { name: String, value: Expr },
    /// `a, b := value`
    MultiVar { names: Vec<String>, value: Expr },
    /// `const name = value`
    Const { name: String, value: Expr },
    /// `target op value`
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
    },
    /// `object.name = value`
    SetAttr {
        object: Expr,
        name: String,
        value: Expr,
    },
    /// `name++` / `name--`
    Postfix { name: String, op: PostfixOp },
    Return(Option<Expr>),
    Break,
    Continue,
    For(For),
    /// `func name(params) { body }`
    Func(Func),
    Expr(Expr),
}

impl Statement {
    /// Whether this statement leaves a value behind when compiled.
    pub fn is_expression(&self) -> bool {
        matches!(self, Statement::Expr(_))
    }
}

/// Loop forms.
#[derive(Debug, Clone, PartialEq)]
pub enum For {
    /// `for { body }`
    Loop { body: Block },
    /// `for cond { body }`
    Condition { cond: Expr, body: Block },
    /// `for init; cond; post { body }`; every clause is optional.
    Classic {
        init: Option<Box<Statement>>,
        cond: Option<Expr>,
        post: Option<Box<Statement>>,
        body: Block,
    },
    /// `for k, v := range iterable { body }` with zero, one, or two names.
    Range {
        names: Vec<String>,
        iterable: Expr,
        body: Block,
    },
}

/// A function literal or declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Block,
}

impl Func {
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// One piece of a string template.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// `{expr}`; an empty placeholder renders as an empty string.
    Expr(Option<Expr>),
}

/// A `case` arm of a switch. Several expressions may share one body.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub exprs: Vec<Expr>,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Template(Vec<Fragment>),
    Ident(String),
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        op: InfixOp,
        right: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Switch {
        value: Box<Expr>,
        cases: Vec<Case>,
        default: Option<Block>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.method(args)`
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    GetAttr {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        object: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),
    /// `item in container`, or `item not in container` when negated.
    In {
        item: Box<Expr>,
        container: Box<Expr>,
        negated: bool,
    },
    /// `a | f | g`
    Pipe(Vec<Expr>),
    Func(Box<Func>),
}
