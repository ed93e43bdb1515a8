// kiln-ast - Syntax tree contract for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Operator tokens.
//!
//! Every operator has a `FromStr` implementation so a front end can map its
//! token text directly. Unknown tokens are rejected here, before they reach
//! the compiler.

use std::fmt;
use std::str::FromStr;

/// A token that does not name a known operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} operator {token:?}")]
pub struct UnknownOperator {
    pub kind: &'static str,
    pub token: String,
}

impl UnknownOperator {
    fn new(kind: &'static str, token: &str) -> Self {
        Self {
            kind,
            token: token.to_string(),
        }
    }
}

/// Binary operators appearing in infix expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Xor,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl InfixOp {
    /// The source token for this operator.
    pub fn token(self) -> &'static str {
        match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Pow => "**",
            InfixOp::Xor => "^",
            InfixOp::Shl => "<<",
            InfixOp::Shr => ">>",
            InfixOp::BitAnd => "&",
            InfixOp::BitOr => "|",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
            InfixOp::Eq => "==",
            InfixOp::Ne => "!=",
            InfixOp::Lt => "<",
            InfixOp::Le => "<=",
            InfixOp::Gt => ">",
            InfixOp::Ge => ">=",
        }
    }

    /// True for `==`, `!=`, `<`, `<=`, `>`, `>=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge
        )
    }
}

impl FromStr for InfixOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "+" => InfixOp::Add,
            "-" => InfixOp::Sub,
            "*" => InfixOp::Mul,
            "/" => InfixOp::Div,
            "%" => InfixOp::Mod,
            "**" => InfixOp::Pow,
            "^" => InfixOp::Xor,
            "<<" => InfixOp::Shl,
            ">>" => InfixOp::Shr,
            "&" => InfixOp::BitAnd,
            "|" => InfixOp::BitOr,
            "&&" => InfixOp::And,
            "||" => InfixOp::Or,
            "==" => InfixOp::Eq,
            "!=" => InfixOp::Ne,
            "<" => InfixOp::Lt,
            "<=" => InfixOp::Le,
            ">" => InfixOp::Gt,
            ">=" => InfixOp::Ge,
            other => return Err(UnknownOperator::new("infix", other)),
        })
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

impl FromStr for PrefixOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(PrefixOp::Neg),
            "!" => Ok(PrefixOp::Not),
            other => Err(UnknownOperator::new("prefix", other)),
        }
    }
}

/// Postfix increment and decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostfixOp {
    Inc,
    Dec,
}

impl FromStr for PostfixOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "++" => Ok(PostfixOp::Inc),
            "--" => Ok(PostfixOp::Dec),
            other => Err(UnknownOperator::new("postfix", other)),
        }
    }
}

/// Assignment operators: plain `=` and the compound forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The infix operator a compound assignment applies, `None` for `=`.
    pub fn infix(self) -> Option<InfixOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(InfixOp::Add),
            AssignOp::Sub => Some(InfixOp::Sub),
            AssignOp::Mul => Some(InfixOp::Mul),
            AssignOp::Div => Some(InfixOp::Div),
        }
    }
}

impl FromStr for AssignOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(AssignOp::Assign),
            "+=" => Ok(AssignOp::Add),
            "-=" => Ok(AssignOp::Sub),
            "*=" => Ok(AssignOp::Mul),
            "/=" => Ok(AssignOp::Div),
            other => Err(UnknownOperator::new("assignment", other)),
        }
    }
}
