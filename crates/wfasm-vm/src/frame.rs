//! Call-stack frames (spec §3).

use std::collections::HashMap;

use wfasm_value::{Callable, Value};

/// Governs how a popped frame's return value/error moves to its caller
/// (spec §4.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameType {
    /// The single root frame. Never popped by normal flow.
    Main,
    /// An ordinary call: return value is pushed onto the caller's stack,
    /// a return error sets the caller's `returnError`.
    Call,
    /// A `try`-call: both outcomes land on the caller's stack as a
    /// `(value, error)` pair, one of which is NULL.
    Try,
    /// A deferred callable's subframe: its outcome is never propagated, only
    /// reported through `Config::onIgnoredError` when it errors.
    Ignore,
    /// Forwards its outcome straight to the caller's own `returnValue` /
    /// `returnError`, without an intervening stack push.
    Passthrough,
    /// Never produced by this interpreter; encountering one at pop time is a
    /// fatal implementation bug.
    Unknown,
}

/// A call-stack frame (spec §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    pub frame_type: FrameType,
    /// `Some` iff this frame owns a value stack ("control frame").
    stack: Option<Vec<Value>>,
    pub fp: String,
    pub ip: usize,
    pub locals: HashMap<String, Value>,
    return_value: Option<Value>,
    return_error: Option<Value>,
    /// Stack of callables to invoke, LIFO, when this frame terminates.
    pub deferred: Vec<Callable>,
}

impl Frame {
    /// Creates a new control frame (owns a value stack) ready to execute
    /// `fp` starting at `ip = 0` with the given initial stack contents.
    pub fn new_control(frame_type: FrameType, fp: impl Into<String>, initial_stack: Vec<Value>) -> Self {
        Self {
            frame_type,
            stack: Some(initial_stack),
            fp: fp.into(),
            ip: 0,
            locals: HashMap::new(),
            return_value: None,
            return_error: None,
            deferred: Vec::new(),
        }
    }

    pub fn main(fp: impl Into<String>) -> Self {
        Self::new_control(FrameType::Main, fp, Vec::new())
    }

    pub fn is_control(&self) -> bool {
        self.stack.is_some()
    }

    pub fn stack(&self) -> Option<&[Value]> {
        self.stack.as_deref()
    }

    pub fn stack_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.stack.as_mut()
    }

    pub fn depth(&self) -> usize {
        self.stack.as_ref().map_or(0, Vec::len)
    }

    /// Exactly one of `returnValue`/`returnError` may ever be set; once set,
    /// the frame is terminated (spec §3 frame invariants).
    pub fn is_terminated(&self) -> bool {
        self.return_value.is_some() || self.return_error.is_some()
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    pub fn return_error(&self) -> Option<&Value> {
        self.return_error.as_ref()
    }

    /// Terminates the frame with a return value. Panics if already
    /// terminated: the interpreter never calls this twice on the same
    /// frame, and a caller that does has a bug of its own.
    pub fn terminate_with_value(&mut self, value: Value) {
        debug_assert!(!self.is_terminated(), "frame already terminated");
        self.return_value = Some(value);
    }

    pub fn terminate_with_error(&mut self, error: Value) {
        debug_assert!(!self.is_terminated(), "frame already terminated");
        self.return_error = Some(error);
    }

    /// Splits the terminal outcome out of the frame, consuming it. Used by
    /// the propagation table once the frame has been popped.
    pub fn into_outcome(self) -> (Option<Value>, Option<Value>) {
        (self.return_value, self.return_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_frame_is_control_and_untermindated() {
        let f = Frame::main("main");
        assert!(f.is_control());
        assert!(!f.is_terminated());
        assert_eq!(f.depth(), 0);
    }

    #[test]
    fn terminating_sets_exactly_one_field() {
        let mut f = Frame::main("main");
        f.terminate_with_value(Value::Int64(1));
        assert!(f.is_terminated());
        assert!(f.return_value().is_some());
        assert!(f.return_error().is_none());
    }
}
