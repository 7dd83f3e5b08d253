//! Instruction dispatch: `step(state)` (spec §4.1) plus the call/return
//! protocol (§4.1.3, §4.1.4) and running-status computation (§4.1).

use wfasm_value::bytecode::{BinaryOp, Instruction, Opcode, UnaryOp};
use wfasm_value::{Callable, Status, Value};

use crate::config::NativeOutcome;
use crate::frame::{Frame, FrameType};
use crate::ops::{eval_binop, eval_unop};
use crate::state::State;

/// A fatal implementation bug: not a script-visible fault, never
/// recoverable through script (spec §7 "Fatal invariants").
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VmFault {
    #[error("stepped a state whose MAIN frame was already terminated")]
    SteppedHaltedState,
    #[error("encountered an UNKNOWN frame type at pop time")]
    UnknownFrameType,
}

/// Computed from the MAIN frame (spec §4.1). ASYNC/SUSPEND are reserved for
/// future native-async integration; this interpreter never produces them
/// since no native registered by `StaticConfig` suspends (SPEC_FULL §10.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStatus {
    Run,
    Halt,
    Async,
    Suspend,
}

pub fn running_status(state: &State) -> RunningStatus {
    if state.main_frame().is_terminated() {
        RunningStatus::Halt
    } else {
        RunningStatus::Run
    }
}

/// Runs `state` to completion, looping `step` while `running_status` is
/// RUN. This is the "containing supervisor" spec §5 describes; the
/// interpreter itself only ever advances one step at a time.
pub fn run_to_halt(state: &mut State) -> Result<(), VmFault> {
    while running_status(state) == RunningStatus::Run {
        step(state)?;
    }
    Ok(())
}

/// Advances the VM by one observable transition (spec §4.1).
pub fn step(state: &mut State) -> Result<(), VmFault> {
    if state.top_frame().is_terminated() {
        return handle_terminated_top(state);
    }

    let fp = state.top_frame().fp.clone();
    let ip = state.top_frame().ip;
    let Some(instr) = state.config().get_instruction(&fp, ip) else {
        tracing::debug!(%fp, ip, "instruction pointer out of range");
        fault(state, Status::out_of_range("instruction pointer out of range"));
        return Ok(());
    };
    dispatch(state, instr)
}

fn handle_terminated_top(state: &mut State) -> Result<(), VmFault> {
    if let Some(callable) = state.top_frame_mut().deferred.pop() {
        tracing::debug!(callable = %callable, "running deferred callable");
        invoke_deferred(state, callable);
        return Ok(());
    }
    if state.top_frame().frame_type == FrameType::Main {
        return Err(VmFault::SteppedHaltedState);
    }
    let popped = state.pop_frame();
    tracing::debug!(frame_type = ?popped.frame_type, fp = %popped.fp, "popped frame");
    propagate(state, popped)
}

fn invoke_deferred(state: &mut State, callable: Callable) {
    match callable {
        Callable::Native(id) => match state.config().get_native_function(&id) {
            Some(f) => {
                if let NativeOutcome::Error(e) = call_native_caught(f, &[]) {
                    state.config().on_ignored_error(&e);
                }
            }
            None => {
                let status = Status::internal(format!("unknown native function: {id}"));
                state.config().on_ignored_error(&status.into_value());
            }
        },
        Callable::Function(id) => {
            state.push_frame(Frame::new_control(FrameType::Ignore, id.as_ref(), Vec::new()));
        }
        Callable::Closure { id, bound_args, .. } => {
            state.push_frame(Frame::new_control(FrameType::Ignore, id.as_ref(), bound_args.to_vec()));
        }
    }
}

fn propagate(state: &mut State, popped: Frame) -> Result<(), VmFault> {
    let frame_type = popped.frame_type;
    let (value, error) = popped.into_outcome();
    match frame_type {
        FrameType::Call => {
            if let Some(v) = value {
                push_to_caller(state, v);
            } else if let Some(e) = error {
                state.top_frame_mut().terminate_with_error(e);
            }
            Ok(())
        }
        FrameType::Try => {
            let (val, err) = match (value, error) {
                (Some(v), None) => (v, Value::Null),
                (None, Some(e)) => (Value::Null, e),
                _ => unreachable!("a terminated frame has exactly one outcome"),
            };
            push_to_caller(state, val);
            push_to_caller(state, err);
            Ok(())
        }
        FrameType::Ignore => {
            if let Some(e) = error {
                state.config().on_ignored_error(&e);
            }
            Ok(())
        }
        FrameType::Passthrough => {
            if let Some(v) = value {
                state.top_frame_mut().terminate_with_value(v);
            } else if let Some(e) = error {
                state.top_frame_mut().terminate_with_error(e);
            }
            Ok(())
        }
        FrameType::Main => unreachable!("MAIN is never popped"),
        FrameType::Unknown => Err(VmFault::UnknownFrameType),
    }
}

fn push_to_caller(state: &mut State, v: Value) {
    state
        .top_frame_mut()
        .stack_mut()
        .expect("every frame in this interpreter owns a value stack")
        .push(v);
}

fn push(state: &mut State, v: Value) {
    state
        .control_frame_mut()
        .stack_mut()
        .expect("every frame in this interpreter owns a value stack")
        .push(v);
}

fn pop(state: &mut State) -> Option<Value> {
    state.control_frame_mut().stack_mut().expect("control frame has a stack").pop()
}

fn advance(state: &mut State) {
    state.top_frame_mut().ip += 1;
}

fn fault(state: &mut State, status: Status) {
    state.top_frame_mut().terminate_with_error(status.into_value());
}

/// Stack indexing (spec §4.1.1): index 0 selects the top; positive indices
/// count from the bottom; negative indices count down from the top. Any
/// index whose absolute value is >= the current depth is OUT_OF_RANGE.
fn resolve_index(depth: usize, i: i64) -> Result<usize, Status> {
    if i == 0 {
        return if depth == 0 {
            Err(Status::out_of_range("stack is empty"))
        } else {
            Ok(depth - 1)
        };
    }
    let abs = i.unsigned_abs() as usize;
    if abs >= depth {
        return Err(Status::out_of_range(format!("stack index {i} out of range for depth {depth}")));
    }
    if i > 0 {
        Ok(abs)
    } else {
        Ok(depth - 1 - abs)
    }
}

fn dispatch(state: &mut State, instr: Instruction) -> Result<(), VmFault> {
    tracing::trace!(opcode = %instr.opcode, arg = instr.arg, "step");
    match instr.opcode {
        Opcode::Noop => {
            advance(state);
        }
        Opcode::PushNull => {
            push(state, Value::Null);
            advance(state);
        }
        Opcode::PushInt => {
            push(state, Value::Int64(instr.arg as i64));
            advance(state);
        }
        Opcode::PushDepth => {
            let depth = state.control_frame().depth() as i64;
            push(state, Value::Int64(depth));
            advance(state);
        }
        Opcode::PushK => op_pushk(state, instr.arg),
        Opcode::Dup => op_dup(state, instr.arg),
        Opcode::Pop => op_pop(state, instr.arg),
        Opcode::Roll => op_roll(state, instr.arg),
        Opcode::Test => op_test(state, instr.arg),
        Opcode::Jmp => {
            if instr.arg < 0 {
                fault(state, Status::invalid_argument("JMP target must be non-negative"));
            } else {
                state.top_frame_mut().ip = instr.arg as usize;
            }
        }
        Opcode::Call => return op_call(state, instr.arg),
        Opcode::Return => op_return(state),
        Opcode::Throw => op_throw(state),
        Opcode::Unop => op_unop(state, instr.arg),
        Opcode::Binop => op_binop(state, instr.arg),
        Opcode::SetLocal => op_set_local(state),
        Opcode::GetLocal => op_get_local(state),
    }
    Ok(())
}

fn op_set_local(state: &mut State) {
    let Some(key) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    let Value::String(key) = key else {
        fault(state, Status::invalid_argument(format!("SETLOCAL key must be STRING, got {}", key.tag())));
        return;
    };
    let Some(value) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    state.control_frame_mut().locals.insert(key.to_string(), value);
    advance(state);
}

fn op_get_local(state: &mut State) {
    let Some(key) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    let Value::String(key) = key else {
        fault(state, Status::invalid_argument(format!("GETLOCAL key must be STRING, got {}", key.tag())));
        return;
    };
    match state.control_frame().locals.get(key.as_ref()) {
        Some(v) => {
            let v = v.clone();
            push(state, v);
            advance(state);
        }
        None => fault(state, Status::out_of_range(format!("no local named {key}"))),
    }
}

fn op_pushk(state: &mut State, k: i32) {
    if k < 0 {
        fault(state, Status::invalid_argument("constant index must be non-negative"));
        return;
    }
    let fp = state.top_frame().fp.clone();
    match state.config().get_constant(&fp, k as usize) {
        Some(v) => {
            push(state, v);
            advance(state);
        }
        None => fault(state, Status::out_of_range(format!("no constant {k} in function {fp}"))),
    }
}

fn op_dup(state: &mut State, i: i32) {
    let depth = state.control_frame().depth();
    match resolve_index(depth, i as i64) {
        Ok(idx) => {
            let v = state.control_frame().stack().unwrap()[idx].clone();
            push(state, v);
            advance(state);
        }
        Err(status) => fault(state, status),
    }
}

fn op_pop(state: &mut State, n: i32) {
    if n < 0 {
        fault(state, Status::invalid_argument("POP count must be non-negative"));
        return;
    }
    let n = n as usize;
    let depth = state.control_frame().depth();
    if n > depth {
        fault(state, Status::out_of_range(format!("POP {n} exceeds stack depth {depth}")));
        return;
    }
    state.control_frame_mut().stack_mut().unwrap().truncate(depth - n);
    advance(state);
}

fn op_roll(state: &mut State, n: i32) {
    if n < 0 {
        fault(state, Status::invalid_argument("ROLL position must be non-negative"));
        return;
    }
    let n = n as usize;
    let depth = state.control_frame().depth();
    if n >= depth {
        fault(state, Status::out_of_range(format!("ROLL {n} exceeds stack depth {depth}")));
        return;
    }
    let stack = state.control_frame_mut().stack_mut().unwrap();
    let idx = depth - 1 - n;
    let v = stack.remove(idx);
    stack.push(v);
    advance(state);
}

fn op_test(state: &mut State, i1: i32) {
    let Some(v) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    let main_branch = v.truthy() == (i1 == 0);
    state.top_frame_mut().ip += if main_branch { 1 } else { 2 };
}

fn op_unop(state: &mut State, arg: i32) {
    let Some(op) = UnaryOp::from_arg(arg) else {
        fault(state, Status::invalid_argument(format!("unknown unary operator id {arg}")));
        return;
    };
    let Some(v) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    match eval_unop(op, v) {
        Ok(r) => {
            push(state, r);
            advance(state);
        }
        Err(status) => fault(state, status),
    }
}

fn op_binop(state: &mut State, arg: i32) {
    let Some(op) = BinaryOp::from_arg(arg) else {
        fault(state, Status::invalid_argument(format!("unknown binary operator id {arg}")));
        return;
    };
    let Some(b) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    let Some(a) = pop(state) else {
        fault(state, Status::out_of_range("stack is empty"));
        return;
    };
    match eval_binop(op, a, b) {
        Ok(r) => {
            push(state, r);
            advance(state);
        }
        Err(status) => fault(state, status),
    }
}

fn op_return(state: &mut State) {
    match pop(state) {
        Some(v) => state.top_frame_mut().terminate_with_value(v),
        None => fault(state, Status::out_of_range("stack is empty")),
    }
}

fn op_throw(state: &mut State) {
    match pop(state) {
        Some(v) => state.top_frame_mut().terminate_with_error(v),
        None => fault(state, Status::out_of_range("stack is empty")),
    }
}

/// The two `CALL` modes an instruction's `arg` selects between (spec
/// §4.1.3: "the new frame's type is set by the caller according to the CALL
/// mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMode {
    Call,
    Try,
}

impl CallMode {
    fn from_arg(arg: i32) -> Option<Self> {
        match arg {
            0 => Some(CallMode::Call),
            1 => Some(CallMode::Try),
            _ => None,
        }
    }
}

fn coerce_argcount(v: &Value) -> Result<u32, Status> {
    match v {
        Value::Int64(n) if *n >= 0 && *n <= u32::MAX as i64 => Ok(*n as u32),
        Value::Uint64(n) if *n <= u32::MAX as u64 => Ok(*n as u32),
        Value::Double(n) => Ok(n.clamp(0.0, u32::MAX as f64) as u32),
        other => Err(Status::invalid_argument(format!(
            "CALL argument count must coerce to a non-negative 32-bit integer, got {other:?}"
        ))),
    }
}

fn call_native_caught(f: crate::config::NativeFn, args: &[Value]) -> NativeOutcome {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(args))) {
        Ok(outcome) => outcome,
        Err(_) => NativeOutcome::Error(Status::internal("native function panicked").into_value()),
    }
}

fn op_call(state: &mut State, mode_arg: i32) -> Result<(), VmFault> {
    let Some(mode) = CallMode::from_arg(mode_arg) else {
        fault(state, Status::invalid_argument(format!("unknown CALL mode {mode_arg}")));
        return Ok(());
    };

    let Some(callable_val) = pop(state) else {
        fault(state, Status::invalid_argument("CALL requires a callable on top of the stack"));
        return Ok(());
    };
    let Value::Callable(callable) = callable_val else {
        fault(state, Status::invalid_argument(format!("CALL target must be CALLABLE, got {}", callable_val.tag())));
        return Ok(());
    };

    let Some(argcount_val) = pop(state) else {
        fault(state, Status::invalid_argument("CALL requires an argument count under the callable"));
        return Ok(());
    };
    let argcount = match coerce_argcount(&argcount_val) {
        Ok(n) => n,
        Err(status) => {
            fault(state, status);
            return Ok(());
        }
    };

    let depth = state.control_frame().depth();
    if argcount as usize > depth {
        fault(state, Status::invalid_argument("not enough arguments on the stack for CALL"));
        return Ok(());
    }
    let mut args = Vec::with_capacity(argcount as usize);
    for _ in 0..argcount {
        args.push(pop(state).expect("depth checked above"));
    }
    args.reverse();

    advance(state);

    match callable {
        Callable::Native(id) => {
            let Some(f) = state.config().get_native_function(&id) else {
                fault(state, Status::internal(format!("unknown native function: {id}")));
                return Ok(());
            };
            match call_native_caught(f, &args) {
                NativeOutcome::Result(v) => push(state, v),
                NativeOutcome::Error(e) => state.top_frame_mut().terminate_with_error(e),
            }
        }
        Callable::Function(id) => spawn_call_frame(state, mode, &id, args),
        Callable::Closure { id, bound_args, .. } => {
            let mut full_args = args;
            full_args.extend(bound_args.iter().cloned());
            spawn_call_frame(state, mode, &id, full_args);
        }
    }
    Ok(())
}

fn spawn_call_frame(state: &mut State, mode: CallMode, id: &str, initial_stack: Vec<Value>) {
    let max_depth = state.config().max_call_stack_depth();
    if state.call_depth() + 1 > max_depth {
        fault(state, Status::internal("call stack overflow"));
        return;
    }
    let frame_type = match mode {
        CallMode::Call => FrameType::Call,
        CallMode::Try => FrameType::Try,
    };
    state.push_frame(Frame::new_control(frame_type, id, initial_stack));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_index_top_is_zero() {
        assert_eq!(resolve_index(3, 0).unwrap(), 2);
    }

    #[test]
    fn resolve_index_positive_counts_from_bottom() {
        assert_eq!(resolve_index(3, 1).unwrap(), 1);
        assert_eq!(resolve_index(3, 2).unwrap(), 2);
    }

    #[test]
    fn resolve_index_negative_counts_from_top() {
        assert_eq!(resolve_index(3, -1).unwrap(), 1);
        assert_eq!(resolve_index(3, -2).unwrap(), 0);
    }

    #[test]
    fn resolve_index_out_of_range() {
        assert!(resolve_index(3, 3).is_err());
        assert!(resolve_index(3, -3).is_err());
        assert!(resolve_index(0, 0).is_err());
    }
}
