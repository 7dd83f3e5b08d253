//! `Config`: the VM's sole dependency for program content (spec §4.2).

use std::collections::HashMap;

use wfasm_value::bytecode::Instruction;
use wfasm_value::Value;

/// Outcome of invoking a native function (spec §4.1.6: "returns either
/// `{result}` or `{error}`").
#[derive(Debug, Clone)]
pub enum NativeOutcome {
    Result(Value),
    Error(Value),
}

/// A synchronous native function. Modeled as a plain function pointer,
/// mirroring the teacher's `type NativeFn = fn(&mut Vm, &[Value]) ->
/// VmResult<Value>` — natives here don't need mutable VM access (spec §4.1.3
/// forbids them from re-entering the interpreter), only their arguments.
pub type NativeFn = fn(args: &[Value]) -> NativeOutcome;

/// The VM's sole dependency for program content: instructions, constants,
/// and native-function lookup (spec §4.2).
///
/// Between state construction and HALT, `get_instruction` and
/// `get_constant` must be stable for every `(fp, ip)` the execution might
/// query — the VM does not cache them.
pub trait Config {
    fn get_instruction(&self, fp: &str, ip: usize) -> Option<Instruction>;

    fn get_constant(&self, fp: &str, k: usize) -> Option<Value>;

    fn get_native_function(&self, id: &str) -> Option<NativeFn>;

    /// Observer hook for errors lost in deferred-cleanup contexts (spec
    /// §4.1.4: IGNORE-typed frames never propagate their error upward).
    fn on_ignored_error(&self, error: &Value) {
        tracing::warn!(%error, "ignored error from deferred callable");
    }

    /// Positive integer; call-stack overflow past this depth raises
    /// INTERNAL (spec §4.1.3).
    fn max_call_stack_depth(&self) -> usize {
        1024
    }

    /// Invoked when the outer loop observes an ASYNC/SUSPEND status and must
    /// await an external signal before stepping again (spec §5). This crate
    /// does not produce either status by itself (no native-async producer
    /// is registered by `StaticConfig`), so the default is a no-op.
    fn on_request_resume(&self) {}
}

/// A map-backed reference `Config`, suitable for tests and for embedding
/// without a real object-file loader (spec §4.2, ambient per SPEC_FULL §3).
#[derive(Default)]
pub struct StaticConfig {
    instructions: HashMap<String, Vec<Instruction>>,
    constants: HashMap<String, Vec<Value>>,
    natives: HashMap<String, NativeFn>,
    max_call_stack_depth: usize,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self { max_call_stack_depth: 1024, ..Default::default() }
    }

    pub fn with_function(
        mut self,
        fp: impl Into<String>,
        instructions: Vec<Instruction>,
        constants: Vec<Value>,
    ) -> Self {
        let fp = fp.into();
        self.instructions.insert(fp.clone(), instructions);
        self.constants.insert(fp, constants);
        self
    }

    pub fn with_native(mut self, id: impl Into<String>, f: NativeFn) -> Self {
        self.natives.insert(id.into(), f);
        self
    }

    pub fn with_max_call_stack_depth(mut self, n: usize) -> Self {
        self.max_call_stack_depth = n;
        self
    }

    /// Registers the spec §4.1.6 built-ins (`int64`, `uint64`, `double`,
    /// `bool`, `string`, `len`).
    pub fn with_builtin_natives(mut self) -> Self {
        for (name, f) in crate::natives::BUILTINS {
            self.natives.insert((*name).to_string(), *f);
        }
        self
    }

    /// Registers the natives the compiler's own lowering relies on (rest-arg
    /// collection) but that aren't part of the closed §4.1.6 built-in set.
    /// Needed only by embedders running compiled code that uses rest
    /// parameters.
    pub fn with_compiler_support_natives(mut self) -> Self {
        for (name, f) in crate::natives::COMPILER_SUPPORT {
            self.natives.insert((*name).to_string(), *f);
        }
        self
    }
}

impl Config for StaticConfig {
    fn get_instruction(&self, fp: &str, ip: usize) -> Option<Instruction> {
        self.instructions.get(fp).and_then(|v| v.get(ip)).copied()
    }

    fn get_constant(&self, fp: &str, k: usize) -> Option<Value> {
        self.constants.get(fp).and_then(|v| v.get(k)).cloned()
    }

    fn get_native_function(&self, id: &str) -> Option<NativeFn> {
        self.natives.get(id).copied()
    }

    fn max_call_stack_depth(&self) -> usize {
        self.max_call_stack_depth
    }
}
