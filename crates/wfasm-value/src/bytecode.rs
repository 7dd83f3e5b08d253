//! Bytecode data types (spec §3, §6): the closed opcode set, a `Function`
//! as (instructions, constants), and the `ObjectFile` package container.
//!
//! These types are shared by the interpreter (`wfasm-vm`, which only reads
//! them through `Config`) and the assembler (`wfasm-codegen`, which
//! produces them). Neither crate owns the wire codec for them — that is an
//! external collaborator (spec §6) — but both need the in-memory shape, so
//! it lives here alongside the value model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The closed core opcode set (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Noop,
    PushNull,
    PushInt,
    PushDepth,
    PushK,
    Dup,
    Pop,
    Roll,
    Test,
    Jmp,
    Call,
    Return,
    Throw,
    Unop,
    Binop,
    /// Pops a STRING key, pops a value, writes `frame.locals[key] = value`.
    /// Backs the compiler's SETVAR IL op (spec §4.4); not part of the
    /// closed arithmetic/control set in §4.1, but required to give the
    /// persisted `locals` map (§6) any producer.
    SetLocal,
    /// Pops a STRING key, pushes `frame.locals[key]`; OUT_OF_RANGE if
    /// absent. Backs the compiler's GETVAR IL op.
    GetLocal,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Opcode::Noop => "NOOP",
            Opcode::PushNull => "PUSHNULL",
            Opcode::PushInt => "PUSHINT",
            Opcode::PushDepth => "PUSHDEPTH",
            Opcode::PushK => "PUSHK",
            Opcode::Dup => "DUP",
            Opcode::Pop => "POP",
            Opcode::Roll => "ROLL",
            Opcode::Test => "TEST",
            Opcode::Jmp => "JMP",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Throw => "THROW",
            Opcode::Unop => "UNOP",
            Opcode::Binop => "BINOP",
            Opcode::SetLocal => "SETLOCAL",
            Opcode::GetLocal => "GETLOCAL",
        };
        f.write_str(s)
    }
}

/// An instruction: `(opcode, arg)` where `arg`'s meaning is opcode-specific
/// (spec §3). Branching opcodes (JMP/TEST/CALL/RETURN/THROW) set `ip`
/// explicitly; every other opcode advances `ip` by one after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg: i32,
}

impl Instruction {
    pub const fn new(opcode: Opcode, arg: i32) -> Self {
        Self { opcode, arg }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.opcode, self.arg)
    }
}

/// Binary operator ids carried in a BINOP instruction's `arg` (spec §4.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Eq,
    Lt,
    Le,
}

impl BinaryOp {
    pub fn to_arg(self) -> i32 {
        self as i32
    }

    pub fn from_arg(arg: i32) -> Option<Self> {
        Some(match arg {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            4 => Self::Mod,
            5 => Self::Pow,
            6 => Self::And,
            7 => Self::Or,
            8 => Self::Eq,
            9 => Self::Lt,
            10 => Self::Le,
            _ => return None,
        })
    }
}

/// Unary operator ids carried in a UNOP instruction's `arg` (spec §4.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Not,
}

impl UnaryOp {
    pub fn to_arg(self) -> i32 {
        self as i32
    }

    pub fn from_arg(arg: i32) -> Option<Self> {
        Some(match arg {
            0 => Self::Minus,
            1 => Self::Not,
            _ => return None,
        })
    }
}

/// A compiled function: an ordered instruction vector plus its own constant
/// table (spec §3 "A Function is a pair (instruction vector, constant
/// vector)").
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub instructions: Vec<Instruction>,
    pub constants: Vec<Value>,
}

impl Function {
    pub fn new(instructions: Vec<Instruction>, constants: Vec<Value>) -> Self {
        Self { instructions, constants }
    }
}

/// A package of compiled functions addressed by id (spec §6).
#[derive(Debug, Clone, Default)]
pub struct ObjectFile {
    pub package: String,
    pub functions: HashMap<String, Function>,
}

impl ObjectFile {
    pub fn new(package: impl Into<String>) -> Self {
        Self { package: package.into(), functions: HashMap::new() }
    }
}
