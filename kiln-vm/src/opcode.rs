// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction set.
//!
//! Instructions are flat `u16` words: an opcode word followed by its operand
//! words. [`Op::info`] is the static table of names and operand counts that
//! any disassembler or alternate front end has to agree with.
//!
//! Jump operands are deltas measured from the position of the jump's own
//! opcode word.

use std::fmt;

/// One instruction or operand word.
pub type Word = u16;

/// Placeholder operand for jumps that are patched later.
pub const PLACEHOLDER: Word = Word::MAX;

/// Static description of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub name: &'static str,
    pub operand_count: usize,
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $value:literal, $name:literal, $operands:literal;)*) => {
        /// Bytecode opcodes for the Kiln VM.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Op {
            $($(#[$doc])* $variant = $value,)*
        }

        impl Op {
            /// Every opcode, in numeric order.
            pub const ALL: &'static [Op] = &[$(Op::$variant,)*];

            /// Name and operand count for this opcode.
            pub const fn info(self) -> OpInfo {
                match self {
                    $(Op::$variant => OpInfo { name: $name, operand_count: $operands },)*
                }
            }
        }

        impl TryFrom<Word> for Op {
            type Error = Word;

            fn try_from(word: Word) -> Result<Self, Word> {
                match word {
                    $($value => Ok(Op::$variant),)*
                    other => Err(other),
                }
            }
        }
    };
}

opcodes! {
    // =========================================================================
    // Execution
    // =========================================================================
    /// Do nothing. Used as a stable jump target.
    Nop = 1, "NOP", 0;
    /// Stop execution of the current run.
    Halt = 2, "HALT", 0;
    /// Call TOS-argc with argc arguments.
    Call = 3, "CALL", 1;
    /// Return from the current frame. Operand 0 returns nil.
    ReturnValue = 4, "RETURN_VALUE", 1;

    // =========================================================================
    // Jumps
    // =========================================================================
    JumpBackward = 10, "JUMP_BACKWARD", 1;
    JumpForward = 11, "JUMP_FORWARD", 1;
    PopJumpForwardIfFalse = 12, "POP_JUMP_FORWARD_IF_FALSE", 1;
    PopJumpForwardIfTrue = 13, "POP_JUMP_FORWARD_IF_TRUE", 1;

    // =========================================================================
    // Loads
    // =========================================================================
    /// Replace TOS with the named attribute (names table index).
    LoadAttr = 20, "LOAD_ATTR", 1;
    /// Push local slot n of the active frame.
    LoadFast = 21, "LOAD_FAST", 1;
    /// Push the value of captured cell n.
    LoadFree = 22, "LOAD_FREE", 1;
    LoadGlobal = 23, "LOAD_GLOBAL", 1;
    LoadConst = 24, "LOAD_CONST", 1;
    LoadBuiltin = 25, "LOAD_BUILTIN", 1;

    // =========================================================================
    // Stores
    // =========================================================================
    /// TOS.name = TOS1
    StoreAttr = 30, "STORE_ATTR", 1;
    StoreFast = 31, "STORE_FAST", 1;
    StoreFree = 32, "STORE_FREE", 1;
    StoreGlobal = 33, "STORE_GLOBAL", 1;

    // =========================================================================
    // Operators
    // =========================================================================
    /// Operand is a [`BinaryOpType`].
    BinaryOp = 40, "BINARY_OP", 1;
    /// Operand is a [`CompareOpType`].
    CompareOp = 41, "COMPARE_OP", 1;
    UnaryNegative = 42, "UNARY_NEGATIVE", 0;
    UnaryNot = 43, "UNARY_NOT", 0;

    // =========================================================================
    // Builders
    // =========================================================================
    BuildList = 50, "BUILD_LIST", 1;
    /// Operand is the number of key/value pairs.
    BuildMap = 51, "BUILD_MAP", 1;
    BuildSet = 52, "BUILD_SET", 1;
    /// Concatenate n values into one string.
    BuildString = 53, "BUILD_STRING", 1;

    // =========================================================================
    // Containers
    // =========================================================================
    /// TOS1[TOS]
    BinarySubscr = 60, "BINARY_SUBSCR", 0;
    /// TOS1[TOS] = TOS2
    StoreSubscr = 61, "STORE_SUBSCR", 0;
    /// TOS in TOS1; operand 1 inverts the result.
    ContainsOp = 62, "CONTAINS_OP", 1;
    Length = 63, "LENGTH", 0;
    /// TOS2[TOS:TOS1]
    Slice = 64, "SLICE", 0;
    /// Push the n items of the container at TOS.
    Unpack = 65, "UNPACK", 1;

    // =========================================================================
    // Stack
    // =========================================================================
    /// Swap TOS with the item n below it.
    Swap = 70, "SWAP", 1;
    /// Push a copy of the item n below TOS.
    Copy = 71, "COPY", 1;
    PopTop = 72, "POP_TOP", 0;
    Nil = 80, "NIL", 0;
    False = 81, "FALSE", 0;
    True = 82, "TRUE", 0;

    // =========================================================================
    // Iteration
    // =========================================================================
    /// Advance the iterator at TOS. Operands: exit delta, name count.
    ForIter = 90, "FOR_ITER", 2;
    GetIter = 91, "GET_ITER", 0;

    // =========================================================================
    // Closures
    // =========================================================================
    /// Operands: function constant index, cell count.
    LoadClosure = 120, "LOAD_CLOSURE", 2;
    /// Operands: index, source (0 = local slot, 1 = enclosing cell).
    MakeCell = 121, "MAKE_CELL", 2;
    /// Bind argc trailing arguments to the callable below them.
    Partial = 130, "PARTIAL", 1;
}

impl Op {
    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn operand_count(self) -> usize {
        self.info().operand_count
    }

    /// True for instructions whose first operand is a jump delta.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Op::JumpBackward
                | Op::JumpForward
                | Op::PopJumpForwardIfFalse
                | Op::PopJumpForwardIfTrue
                | Op::ForIter
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Op> for Word {
    fn from(op: Op) -> Word {
        op as Word
    }
}

/// Operators dispatched through `BinaryOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BinaryOpType {
    Add = 1,
    Subtract = 2,
    Multiply = 3,
    Divide = 4,
    Modulo = 5,
    And = 6,
    Or = 7,
    Xor = 8,
    Power = 9,
    LShift = 10,
    RShift = 11,
    BitwiseAnd = 12,
    BitwiseOr = 13,
}

impl BinaryOpType {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOpType::Add => "+",
            BinaryOpType::Subtract => "-",
            BinaryOpType::Multiply => "*",
            BinaryOpType::Divide => "/",
            BinaryOpType::Modulo => "%",
            BinaryOpType::And => "&&",
            BinaryOpType::Or => "||",
            BinaryOpType::Xor => "^",
            BinaryOpType::Power => "**",
            BinaryOpType::LShift => "<<",
            BinaryOpType::RShift => ">>",
            BinaryOpType::BitwiseAnd => "&",
            BinaryOpType::BitwiseOr => "|",
        }
    }
}

impl TryFrom<Word> for BinaryOpType {
    type Error = Word;

    fn try_from(word: Word) -> Result<Self, Word> {
        Ok(match word {
            1 => BinaryOpType::Add,
            2 => BinaryOpType::Subtract,
            3 => BinaryOpType::Multiply,
            4 => BinaryOpType::Divide,
            5 => BinaryOpType::Modulo,
            6 => BinaryOpType::And,
            7 => BinaryOpType::Or,
            8 => BinaryOpType::Xor,
            9 => BinaryOpType::Power,
            10 => BinaryOpType::LShift,
            11 => BinaryOpType::RShift,
            12 => BinaryOpType::BitwiseAnd,
            13 => BinaryOpType::BitwiseOr,
            other => return Err(other),
        })
    }
}

/// Comparisons dispatched through `CompareOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CompareOpType {
    LessThan = 1,
    LessThanOrEqual = 2,
    Equal = 3,
    NotEqual = 4,
    GreaterThan = 5,
    GreaterThanOrEqual = 6,
}

impl CompareOpType {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOpType::LessThan => "<",
            CompareOpType::LessThanOrEqual => "<=",
            CompareOpType::Equal => "==",
            CompareOpType::NotEqual => "!=",
            CompareOpType::GreaterThan => ">",
            CompareOpType::GreaterThanOrEqual => ">=",
        }
    }
}

impl TryFrom<Word> for CompareOpType {
    type Error = Word;

    fn try_from(word: Word) -> Result<Self, Word> {
        Ok(match word {
            1 => CompareOpType::LessThan,
            2 => CompareOpType::LessThanOrEqual,
            3 => CompareOpType::Equal,
            4 => CompareOpType::NotEqual,
            5 => CompareOpType::GreaterThan,
            6 => CompareOpType::GreaterThanOrEqual,
            other => return Err(other),
        })
    }
}
