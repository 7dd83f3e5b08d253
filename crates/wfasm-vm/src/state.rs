//! `State` (spec §3): heap, call stack, and a reference to a `Config`.

use wfasm_value::Heap;

use crate::config::Config;
#[cfg(test)]
use crate::frame::FrameType;
use crate::frame::Frame;

/// The function id the reference loop treats as the program's entry point.
pub const MAIN_FUNCTION_ID: &str = "main";

/// The full VM state: heap, call stack, and the `Config` supplying program
/// content. A cached pointer to the nearest control frame is maintained
/// alongside the call stack (spec §3 state invariants).
pub struct State {
    pub heap: Heap,
    call_stack: Vec<Frame>,
    config: Box<dyn Config>,
    control_frame_idx: usize,
}

impl State {
    /// Constructs a fresh state with a single MAIN frame (spec §3: "MAIN is
    /// the root; there is exactly one per State").
    pub fn new(config: impl Config + 'static) -> Self {
        let main = Frame::main(MAIN_FUNCTION_ID);
        Self {
            heap: Heap::new(),
            call_stack: vec![main],
            config: Box::new(config),
            control_frame_idx: 0,
        }
    }

    pub fn config(&self) -> &dyn Config {
        self.config.as_ref()
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// The top of the call stack: the frame whose `(fp, ip)` the next
    /// dispatch will read.
    pub fn top_frame(&self) -> &Frame {
        self.call_stack.last().expect("call stack always has MAIN")
    }

    pub fn top_frame_mut(&mut self) -> &mut Frame {
        self.call_stack.last_mut().expect("call stack always has MAIN")
    }

    /// The topmost control frame on the stack — the one opcodes that touch
    /// the value stack (PUSH*, DUP, POP, ROLL, TEST, CALL's operand
    /// gathering, RETURN, THROW) actually operate on.
    pub fn control_frame(&self) -> &Frame {
        &self.call_stack[self.control_frame_idx]
    }

    pub fn control_frame_mut(&mut self) -> &mut Frame {
        &mut self.call_stack[self.control_frame_idx]
    }

    pub fn main_frame(&self) -> &Frame {
        &self.call_stack[0]
    }

    pub fn main_frame_mut(&mut self) -> &mut Frame {
        &mut self.call_stack[0]
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.call_stack.push(frame);
        self.recompute_control_frame();
    }

    /// Pops the top frame. Callers must never pop MAIN (spec §3: "MAIN is
    /// never popped by `popFrame`"); that invariant is enforced by the
    /// interpreter's dispatch logic before this is called, not here.
    pub fn pop_frame(&mut self) -> Frame {
        debug_assert!(self.call_stack.len() > 1, "must never pop the MAIN frame");
        let frame = self.call_stack.pop().expect("checked above");
        self.recompute_control_frame();
        frame
    }

    fn recompute_control_frame(&mut self) {
        self.control_frame_idx = self
            .call_stack
            .iter()
            .rposition(Frame::is_control)
            .expect("MAIN is always a control frame");
    }

    /// Spec §8 invariant: "the cached control frame is the topmost control
    /// frame" — exposed for tests.
    pub fn control_frame_is_consistent(&self) -> bool {
        let expected = self.call_stack.iter().rposition(Frame::is_control);
        expected == Some(self.control_frame_idx)
    }

    pub fn push_deferred(&mut self, callable: wfasm_value::Callable) {
        self.control_frame_mut().deferred.push(callable);
    }
}

/// The persistable slice of a `State`: everything a suspend/checkpoint/
/// resume round-trip needs to carry, and nothing else.
///
/// `Config` is deliberately excluded. It is a `Box<dyn Config>` — a host
/// dependency supplying program content and native callbacks, not state the
/// VM accumulates — and a trait object can't derive `Serialize` in general.
/// A resumed run pairs a deserialized `StateSnapshot` with whatever `Config`
/// the host supplies at that point, which may or may not be the same value
/// that was in effect when the snapshot was taken.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StateSnapshot {
    pub heap: Heap,
    pub call_stack: Vec<Frame>,
    pub control_frame_idx: usize,
}

impl State {
    /// Captures the persistable part of this state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            heap: self.heap.clone(),
            call_stack: self.call_stack.clone(),
            control_frame_idx: self.control_frame_idx,
        }
    }

    /// Rehydrates a state from a snapshot, pairing it with a freshly
    /// supplied `Config`.
    pub fn restore(snapshot: StateSnapshot, config: impl Config + 'static) -> Self {
        Self {
            heap: snapshot.heap,
            call_stack: snapshot.call_stack,
            config: Box::new(config),
            control_frame_idx: snapshot.control_frame_idx,
        }
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("call_depth", &self.call_stack.len())
            .field("control_frame_idx", &self.control_frame_idx)
            .field("heap_len", &self.heap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;

    #[test]
    fn new_state_has_one_main_frame() {
        let state = State::new(StaticConfig::new());
        assert_eq!(state.call_depth(), 1);
        assert_eq!(state.top_frame().frame_type, FrameType::Main);
        assert!(state.control_frame_is_consistent());
    }

    #[test]
    fn snapshot_round_trips_through_json_and_restores() {
        let mut state = State::new(StaticConfig::new());
        state.main_frame_mut().stack_mut().unwrap().push(wfasm_value::Value::Int64(7));
        state.heap.alloc(wfasm_value::Value::Int64(9));

        let snapshot = state.snapshot();
        let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
        let restored: StateSnapshot = serde_json::from_str(&json).expect("snapshot deserializes");

        let resumed = State::restore(restored, StaticConfig::new());
        assert_eq!(resumed.call_depth(), 1);
        assert_eq!(resumed.heap.len(), 1);
        assert_eq!(resumed.main_frame().stack(), Some(&[wfasm_value::Value::Int64(7)][..]));
    }
}
