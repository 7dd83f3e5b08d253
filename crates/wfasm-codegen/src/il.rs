//! The intermediate language the lowering pass emits and the assembler
//! consumes (spec §4.4): a superset of bytecode carrying symbolic labels,
//! literal pushes, and function-reference pushes that the assembler
//! resolves into concrete `Instruction`s and a constant table.

use wfasm_value::bytecode::Opcode;
use wfasm_value::Value;

/// One IL instruction.
#[derive(Debug, Clone)]
pub enum Il {
    /// Placeholder; the assembler still advances past it.
    Noop,
    /// Emit exactly one bytecode instruction as-is.
    Asm(Opcode, i32),
    /// Emit a push of the given literal, through PUSHNULL/PUSHINT's fast
    /// paths when possible, otherwise via the constant table.
    PushLiteral(Value),
    /// Emit a push of a CALLABLE referring to a function, local
    /// (`package: None`) or imported.
    PushFn { package: Option<String>, name: String },
    /// Labels the next bytecode address.
    Label(String),
    /// Emits a JMP to the labeled address, resolved in the assembler's
    /// second pass.
    Goto(String),
    /// Reserved for variable-lifetime hooks (spec §4.4); the assembler
    /// consumes these structurally but emits no bytecode for them.
    OpenScope(String),
    CloseScope(String),
    /// Paired with a preceding string-literal push: writes the frame's
    /// named-local map. See `wfasm_value::REST_COLLECTOR_NATIVE_ID` for the
    /// one other place this crate reaches past the closed §4.1 opcode set.
    SetVar,
    /// Paired with a preceding string-literal push: reads the frame's
    /// named-local map.
    GetVar,
    /// At function entry: adjust the stack to exactly `params` values
    /// (padding missing args with NULL, discarding excess), collecting any
    /// excess into a LIST on top when `rest` is set.
    NormalizeArgs { params: usize, rest: bool },
}

/// One function's lowered IL body.
#[derive(Debug, Clone)]
pub struct IlFunction {
    pub name: String,
    pub body: Vec<Il>,
}

/// A whole compiled unit: one IL body per top-level function declaration.
#[derive(Debug, Clone, Default)]
pub struct IlModule {
    pub functions: Vec<IlFunction>,
}
